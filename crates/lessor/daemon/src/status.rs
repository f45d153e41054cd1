//! Provider status aggregation

use crate::inventory::InventoryHandle;
use lessor_bidengine::BidEngine;
use lessor_monitor::LeaseManager;
use lessor_types::{ClusterStatus, ManifestStatus, Status};
use std::sync::Arc;

/// Composes the sub-status of every component into one [`Status`]
///
/// Nothing is cached; each call reads the components' current state.
#[derive(Clone)]
pub struct StatusAggregator {
    leases: Arc<LeaseManager>,
    bidengine: Arc<BidEngine>,
    inventory: Option<Arc<InventoryHandle>>,
    public_hostname: Option<String>,
}

impl StatusAggregator {
    pub fn new(
        leases: Arc<LeaseManager>,
        bidengine: Arc<BidEngine>,
        inventory: Option<Arc<InventoryHandle>>,
        public_hostname: Option<String>,
    ) -> Self {
        Self {
            leases,
            bidengine,
            inventory,
            public_hostname,
        }
    }

    pub fn status(&self) -> Status {
        let monitors = self.leases.monitor_counts();
        let monitored = u32::try_from(self.leases.monitored_leases()).unwrap_or(u32::MAX);
        let awaiting = u32::try_from(self.leases.awaiting_manifest()).unwrap_or(u32::MAX);

        Status {
            cluster: ClusterStatus {
                leases: monitored,
                monitors,
                inventory: self.inventory.as_ref().and_then(|i| i.snapshot()),
            },
            bidengine: self.bidengine.status(),
            manifest: ManifestStatus {
                awaiting_manifest: awaiting,
                deployed: monitored,
            },
            public_hostname: self.public_hostname.clone(),
        }
    }
}
