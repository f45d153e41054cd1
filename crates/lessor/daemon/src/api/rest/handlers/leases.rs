//! Lease lifecycle handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lessor_monitor::MonitorState;
use lessor_types::{LeaseId, ManifestGroup};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub lease_id: LeaseId,
}

#[derive(Debug, Deserialize)]
pub struct ManifestRequest {
    pub lease_id: LeaseId,
    pub group: ManifestGroup,
}

#[derive(Debug, Serialize)]
pub struct AwardResponse {
    pub lease_id: LeaseId,
    pub awaiting_manifest: bool,
}

#[derive(Debug, Serialize)]
pub struct MonitoredLease {
    pub lease_id: LeaseId,
    pub group: String,
    pub state: MonitorState,
}

fn lease_from_path((owner, dseq, gseq, provider): (String, u64, u32, String)) -> LeaseId {
    LeaseId::new(owner, dseq, gseq, provider)
}

/// Record a won lease; its manifest must follow within the manifest timeout
///
/// Awards for a lease that is already deployed are accepted but change
/// nothing, and report `awaiting_manifest: false`.
pub async fn award_lease(
    State(state): State<AppState>,
    Json(request): Json<AwardRequest>,
) -> (StatusCode, Json<AwardResponse>) {
    let awaiting_manifest = state.leases.award(request.lease_id.clone());
    (
        StatusCode::ACCEPTED,
        Json(AwardResponse {
            lease_id: request.lease_id,
            awaiting_manifest,
        }),
    )
}

/// Deploy the manifest of a lease and start monitoring it
pub async fn submit_manifest(
    State(state): State<AppState>,
    Json(request): Json<ManifestRequest>,
) -> ApiResult<(StatusCode, Json<MonitoredLease>)> {
    state
        .leases
        .submit_manifest(request.lease_id.clone(), request.group)
        .await?;

    let handle = state.leases.monitor(&request.lease_id)?;
    Ok((
        StatusCode::CREATED,
        Json(MonitoredLease {
            group: handle.group().to_string(),
            state: handle.state(),
            lease_id: request.lease_id,
        }),
    ))
}

pub async fn list_leases(State(state): State<AppState>) -> Json<Vec<MonitoredLease>> {
    let leases = state
        .leases
        .monitor_states()
        .into_iter()
        .filter_map(|(lease_id, current)| {
            let handle = state.leases.monitor(&lease_id).ok()?;
            Some(MonitoredLease {
                group: handle.group().to_string(),
                lease_id,
                state: current,
            })
        })
        .collect();
    Json(leases)
}

pub async fn get_lease(
    State(state): State<AppState>,
    Path(path): Path<(String, u64, u32, String)>,
) -> ApiResult<Json<MonitoredLease>> {
    let lease_id = lease_from_path(path);
    let handle = state.leases.monitor(&lease_id)?;
    Ok(Json(MonitoredLease {
        group: handle.group().to_string(),
        state: handle.state(),
        lease_id,
    }))
}

/// Tear a lease down; succeeds for unknown leases too
pub async fn teardown_lease(
    State(state): State<AppState>,
    Path(path): Path<(String, u64, u32, String)>,
) -> ApiResult<StatusCode> {
    let lease_id = lease_from_path(path);
    state.leases.teardown(&lease_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
