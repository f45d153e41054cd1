//! Observed state reported by the cluster backend

use crate::manifest::Protocol;
use crate::resources::ResourceUnits;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed state of one service within a lease
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,

    /// Replicas currently serving
    pub available: u32,

    /// Replicas requested
    pub total: u32,

    /// URIs routed to the service
    #[serde(default)]
    pub uris: Vec<String>,

    // Rollout metadata, only present for backends that track it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<u32>,
}

impl ServiceStatus {
    pub fn new(name: impl Into<String>, available: u32, total: u32) -> Self {
        Self {
            name: name.into(),
            available,
            total,
            ..Default::default()
        }
    }

    /// All requested replicas are serving
    pub fn is_ready(&self) -> bool {
        self.total > 0 && self.available >= self.total
    }
}

/// An external port forwarded to a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedPortStatus {
    pub host: String,
    pub port: u16,
    pub external_port: u16,
    pub proto: Protocol,

    /// Service name
    pub name: String,
    pub available: u32,
}

/// Observed state of a whole lease
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseStatus {
    /// Keyed by service name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceStatus>,

    /// Keyed by service name
    #[serde(default)]
    pub forwarded_ports: BTreeMap<String, Vec<ForwardedPortStatus>>,
}

impl LeaseStatus {
    pub fn with_service(mut self, status: ServiceStatus) -> Self {
        self.services.insert(status.name.clone(), status);
        self
    }
}

/// Capacity of one cluster node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInventory {
    pub name: String,

    /// Total units the node offers to leases
    pub allocatable: ResourceUnits,

    /// Units not yet claimed by deployed leases
    pub available: ResourceUnits,
}

impl NodeInventory {
    pub fn new(name: impl Into<String>, allocatable: ResourceUnits) -> Self {
        Self {
            name: name.into(),
            allocatable,
            available: allocatable,
        }
    }
}

/// Snapshot of cluster capacity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub nodes: Vec<NodeInventory>,
}

impl Inventory {
    pub fn total_allocatable(&self) -> ResourceUnits {
        self.nodes
            .iter()
            .fold(ResourceUnits::default(), |acc, n| acc.saturating_add(&n.allocatable))
    }

    pub fn total_available(&self) -> ResourceUnits {
        self.nodes
            .iter()
            .fold(ResourceUnits::default(), |acc, n| acc.saturating_add(&n.available))
    }
}

/// A backend event concerning a lease (scheduling, image pulls, restarts)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseEvent {
    /// "Normal" or "Warning"
    pub event_type: String,
    pub reason: String,
    pub note: String,
    pub object_kind: String,
    pub object_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
