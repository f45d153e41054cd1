//! Event types published on the provider event bus
//!
//! Events are immutable facts. Each travels inside an [`EventEnvelope`] that
//! carries identity, time, origin and severity.

use crate::cluster::ForwardedPortStatus;
use crate::coin::Coin;
use crate::ids::LeaseId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Envelope wrapping all provider events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Event source
    pub source: EventSource,

    /// Event severity
    pub severity: EventSeverity,

    /// The actual event
    pub event: ProviderEvent,
}

/// Event sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Deployment monitor
    Monitor,
    /// Escrow balance checker
    BalanceChecker,
    /// Bid engine
    BidEngine,
    /// Daemon wiring
    Daemon,
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Lifecycle state of a deployed lease as derived by its monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterDeploymentStatus {
    Pending,
    Deployed,
    Failed,
}

impl std::fmt::Display for ClusterDeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Deployed => write!(f, "deployed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Deployment status change for a lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDeployment {
    pub lease_id: LeaseId,

    /// Manifest group name
    pub group: String,
    pub status: ClusterDeploymentStatus,

    /// Available replicas summed over the manifest's services
    pub available: u32,

    /// Requested replicas summed over the manifest's services
    pub total: u32,

    #[serde(default)]
    pub forwarded_ports: BTreeMap<String, Vec<ForwardedPortStatus>>,
}

/// Provider events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderEvent {
    /// A lease's derived deployment status changed
    ClusterDeployment(ClusterDeployment),

    /// Escrow balance fell below the configured threshold
    BalanceBelowThreshold { balance: Coin, threshold: u64 },

    /// Periodic withdrawal was triggered
    WithdrawalTriggered { balance: Option<Coin> },
}

impl EventEnvelope {
    /// Create a new event envelope
    pub fn new(event: ProviderEvent, source: EventSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source,
            severity: Self::infer_severity(&event),
            event,
        }
    }

    /// Lease the event concerns, if any
    pub fn lease_id(&self) -> Option<&LeaseId> {
        match &self.event {
            ProviderEvent::ClusterDeployment(d) => Some(&d.lease_id),
            _ => None,
        }
    }

    fn infer_severity(event: &ProviderEvent) -> EventSeverity {
        match event {
            ProviderEvent::ClusterDeployment(ClusterDeployment {
                status: ClusterDeploymentStatus::Failed,
                ..
            }) => EventSeverity::Error,

            ProviderEvent::BalanceBelowThreshold { .. } => EventSeverity::Warning,

            _ => EventSeverity::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(status: ClusterDeploymentStatus) -> ProviderEvent {
        ProviderEvent::ClusterDeployment(ClusterDeployment {
            lease_id: LeaseId::new("tenant", 1, 1, "provider"),
            group: "web".into(),
            status,
            available: 0,
            total: 1,
            forwarded_ports: BTreeMap::new(),
        })
    }

    #[test]
    fn test_severity_inference() {
        let failed = EventEnvelope::new(
            deployment(ClusterDeploymentStatus::Failed),
            EventSource::Monitor,
        );
        assert_eq!(failed.severity, EventSeverity::Error);

        let pending = EventEnvelope::new(
            deployment(ClusterDeploymentStatus::Pending),
            EventSource::Monitor,
        );
        assert_eq!(pending.severity, EventSeverity::Info);
        assert!(pending.lease_id().is_some());

        let low = EventEnvelope::new(
            ProviderEvent::BalanceBelowThreshold {
                balance: Coin::new("uakt", 10),
                threshold: 100,
            },
            EventSource::BalanceChecker,
        );
        assert_eq!(low.severity, EventSeverity::Warning);
        assert!(low.lease_id().is_none());
    }

    #[test]
    fn test_envelope_ids_unique() {
        let a = EventEnvelope::new(
            ProviderEvent::WithdrawalTriggered { balance: None },
            EventSource::BalanceChecker,
        );
        let b = EventEnvelope::new(
            ProviderEvent::WithdrawalTriggered { balance: None },
            EventSource::BalanceChecker,
        );
        assert_ne!(a.id, b.id);
    }
}
