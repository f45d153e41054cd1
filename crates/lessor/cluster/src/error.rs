//! Cluster client error types

use lessor_types::LeaseId;
use thiserror::Error;

/// Failures of a command run inside a lease's replica
///
/// These are caused by the tenant's own request and are safe to report back
/// to them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("no such service: {0}")]
    NoSuchService(String),

    #[error("service {0} is not running")]
    ServiceNotRunning(String),

    #[error("command execution failed: {0}")]
    CommandExecutionFailed(String),

    #[error("command does not exist: {0}")]
    CommandDoesNotExist(String),

    #[error("deployment is not yet running")]
    DeploymentNotYetRunning,

    #[error("service {service} runs {pods} pods, a pod index is required")]
    MultiplePods { service: String, pods: u32 },

    #[error("pod index {index} out of range, service {service} runs {pods} pods")]
    PodIndexOutOfRange {
        service: String,
        index: u32,
        pods: u32,
    },
}

/// Cluster client errors
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Lease not found: {0}")]
    LeaseNotFound(LeaseId),

    #[error("Service {service} not found in lease {lease_id}")]
    NoSuchService { lease_id: LeaseId, service: String },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("Insufficient capacity: {0}")]
    InsufficientCapacity(String),

    #[error("Cluster unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClusterError {
    /// Whether the error may be shown to a tenant unchanged
    pub fn is_tenant_safe(&self) -> bool {
        matches!(self, ClusterError::Exec(_))
    }

    /// Message suitable for a tenant-facing response
    pub fn tenant_message(&self) -> String {
        if self.is_tenant_safe() {
            self.to_string()
        } else {
            "internal cluster error".to_string()
        }
    }
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_message_redacts_internal_errors() {
        let exec: ClusterError = ExecError::CommandDoesNotExist("vim".into()).into();
        assert!(exec.is_tenant_safe());
        assert_eq!(exec.tenant_message(), "command does not exist: vim");

        let backend = ClusterError::Backend("etcd leader lost at 10.0.0.3".into());
        assert!(!backend.is_tenant_safe());
        assert!(!backend.tenant_message().contains("10.0.0.3"));
    }
}
