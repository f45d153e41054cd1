//! Monitor error types

use lessor_cluster::ClusterError;
use lessor_types::LeaseId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Lease not monitored: {0}")]
    NotMonitored(LeaseId),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
