//! Error types for lessord

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lessor_bidengine::BidError;
use lessor_cluster::ClusterError;
use lessor_monitor::MonitorError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Cluster not ready after {0:?}")]
    ClusterNotReady(Duration),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Bid engine error: {0}")]
    BidEngine(#[from] BidError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// The order was declined; carries the engine's reason
    #[error(transparent)]
    Bid(#[from] BidError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn cluster_response(error: &ClusterError) -> (StatusCode, &'static str, String) {
    match error {
        // Backend names stay out of the body
        ClusterError::LeaseNotFound(_) | ClusterError::NoSuchService { .. } => {
            tracing::debug!(error = %error, "Cluster lookup missed");
            (StatusCode::NOT_FOUND, "NOT_FOUND", "not found".to_string())
        }
        ClusterError::Exec(_) => (StatusCode::BAD_REQUEST, "EXEC_FAILED", error.tenant_message()),
        ClusterError::InsufficientCapacity(_) => {
            (StatusCode::CONFLICT, "INSUFFICIENT_CAPACITY", error.tenant_message())
        }
        ClusterError::Unavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "CLUSTER_UNAVAILABLE", error.tenant_message())
        }
        ClusterError::Backend(_) | ClusterError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "CLUSTER_ERROR", error.tenant_message())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Bid(BidError::Inventory(e)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "INVENTORY_UNAVAILABLE", e.tenant_message())
            }
            ApiError::Bid(e @ (BidError::Strategy(_) | BidError::InvalidConfig(_))) => {
                tracing::error!(error = %e, "Bid engine failure");
                (StatusCode::INTERNAL_SERVER_ERROR, e.code(), "internal pricing error".to_string())
            }
            ApiError::Bid(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.code(), e.to_string()),
            ApiError::Cluster(e) | ApiError::Monitor(MonitorError::Cluster(e)) => {
                let not_found = matches!(
                    e,
                    ClusterError::LeaseNotFound(_) | ClusterError::NoSuchService { .. }
                );
                if !e.is_tenant_safe() && !not_found {
                    tracing::warn!(error = %e, "Cluster error redacted from response");
                }
                cluster_response(e)
            }
            ApiError::Monitor(e @ MonitorError::NotMonitored(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lessor_cluster::ExecError;
    use lessor_types::LeaseId;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::Bid(BidError::QuantityInvalid("zero count".into()))
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Monitor(MonitorError::NotMonitored(LeaseId::new("o", 1, 1, "p")))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_cluster_errors_map_by_kind() {
        let exec = ApiError::Cluster(ExecError::DeploymentNotYetRunning.into());
        assert_eq!(exec.into_response().status(), StatusCode::BAD_REQUEST);

        let backend = ApiError::Monitor(MonitorError::Cluster(ClusterError::Backend(
            "node 10.1.2.3 unreachable".into(),
        )));
        assert_eq!(backend.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_cluster_lookup_misses_hide_backend_names() {
        let lease_id = LeaseId::new("o", 1, 1, "p");
        let errors = [
            ApiError::Cluster(ClusterError::NoSuchService {
                lease_id: lease_id.clone(),
                service: "secret-svc".into(),
            }),
            ApiError::Monitor(MonitorError::Cluster(ClusterError::LeaseNotFound(lease_id))),
        ];

        for error in errors {
            let (status, body) = body_of(error).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["code"], "NOT_FOUND");
            assert_eq!(body["error"], "not found");
            let text = body.to_string();
            assert!(!text.contains("secret-svc"), "{text}");
            assert!(!text.contains("o/1/1/p"), "{text}");
        }
    }

    #[tokio::test]
    async fn test_exec_errors_pass_through() {
        let (status, body) = body_of(ApiError::Cluster(ExecError::DeploymentNotYetRunning.into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], ExecError::DeploymentNotYetRunning.to_string());
    }
}
