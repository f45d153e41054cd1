//! Resource requests of open orders, the input to bid pricing

use crate::coin::DecCoin;
use crate::resources::ResourceUnits;
use serde::{Deserialize, Serialize};

/// A homogeneous set of replicas within a group request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    /// Per-replica units
    pub units: ResourceUnits,
    pub count: u32,
}

impl ResourceGroup {
    pub fn new(units: ResourceUnits, count: u32) -> Self {
        Self { units, count }
    }
}

/// The resource request of an order the provider may bid on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,

    #[serde(default)]
    pub resources: Vec<ResourceGroup>,

    /// Hostnames the tenant wants routed to the group
    #[serde(default)]
    pub hostnames: Vec<String>,

    /// Highest price the tenant accepts
    #[serde(default)]
    pub max_price: Option<DecCoin>,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            hostnames: Vec::new(),
            max_price: None,
        }
    }

    pub fn with_resources(mut self, units: ResourceUnits, count: u32) -> Self {
        self.resources.push(ResourceGroup::new(units, count));
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.push(hostname.into());
        self
    }

    pub fn with_max_price(mut self, max_price: DecCoin) -> Self {
        self.max_price = Some(max_price);
        self
    }
}
