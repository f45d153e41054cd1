//! Desired state of a lease as supplied by the manifest collaborator

use crate::resources::{ResourceOverflow, ResourceUnits};
use serde::{Deserialize, Serialize};

/// Transport protocol of an exposed port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// A port a service wants reachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceExpose {
    /// Container port
    pub port: u16,

    /// Requested external port; 0 lets the backend choose. Backends reject
    /// the deploy when a nonzero port is unavailable.
    #[serde(default)]
    pub external_port: u16,

    #[serde(default)]
    pub proto: Protocol,

    /// Reachable from outside the cluster
    #[serde(default)]
    pub global: bool,

    /// Hostnames routed to this port
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl ServiceExpose {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            external_port: 0,
            proto: Protocol::Tcp,
            global: false,
            hosts: Vec::new(),
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_external_port(mut self, external_port: u16) -> Self {
        self.external_port = external_port;
        self
    }

    pub fn with_proto(mut self, proto: Protocol) -> Self {
        self.proto = proto;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }
}

/// One replicated service within a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub image: String,

    /// Desired replica count
    pub count: u32,

    /// Per-replica resources
    #[serde(default)]
    pub resources: ResourceUnits,

    #[serde(default)]
    pub expose: Vec<ServiceExpose>,
}

impl Service {
    pub fn new(name: impl Into<String>, image: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            count,
            resources: ResourceUnits::default(),
            expose: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceUnits) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_expose(mut self, expose: ServiceExpose) -> Self {
        self.expose.push(expose);
        self
    }
}

/// Desired state for one lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestGroup {
    pub name: String,

    #[serde(default)]
    pub services: Vec<Service>,
}

impl ManifestGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Sum of replica count times per-replica units over all services
    pub fn total_resources(&self) -> Result<ResourceUnits, ResourceOverflow> {
        self.services
            .iter()
            .try_fold(ResourceUnits::default(), |acc, svc| {
                acc.checked_add(&svc.resources.checked_mul(svc.count)?)
            })
    }

    /// All hostnames requested across service exposes
    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.services
            .iter()
            .flat_map(|s| s.expose.iter())
            .flat_map(|e| e.hosts.iter().map(String::as_str))
    }
}
