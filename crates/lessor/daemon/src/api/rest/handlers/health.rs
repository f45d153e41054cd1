//! Health and status handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use lessor_types::Status;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Aggregate provider status
pub async fn provider_status(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.status())
}
