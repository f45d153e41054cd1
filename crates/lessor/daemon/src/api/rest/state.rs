//! Application state for API handlers

use crate::status::StatusAggregator;
use lessor_bidengine::BidEngine;
use lessor_monitor::LeaseManager;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub leases: Arc<LeaseManager>,

    pub bidengine: Arc<BidEngine>,

    pub status: StatusAggregator,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        leases: Arc<LeaseManager>,
        bidengine: Arc<BidEngine>,
        status: StatusAggregator,
    ) -> Self {
        Self {
            leases,
            bidengine,
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}
