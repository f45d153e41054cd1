//! Aggregate provider status served to external queries

use crate::cluster::Inventory;
use serde::{Deserialize, Serialize};

/// Provider status, recomputed on demand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub cluster: ClusterStatus,
    pub bidengine: BidEngineStatus,
    pub manifest: ManifestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_hostname: Option<String>,
}

/// Number of monitors per derived state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorCounts {
    pub pending: u32,
    pub deployed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Leases with a live monitor
    pub leases: u32,
    pub monitors: MonitorCounts,

    /// Latest inventory snapshot, absent until the first poll succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEngineStatus {
    pub orders_considered: u64,
    pub bids_priced: u64,
    pub bids_declined: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStatus {
    /// Leases won but not yet given a manifest
    pub awaiting_manifest: u32,

    /// Leases whose manifest has been deployed
    pub deployed: u32,
}
