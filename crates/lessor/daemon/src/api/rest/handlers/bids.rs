//! Bid pricing handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use lessor_types::{DecCoin, GroupSpec};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub price: DecCoin,
    pub strategy: String,
}

/// Price an open order
///
/// A declined order answers 422 with the decline reason as `code`.
pub async fn price_bid(
    State(state): State<AppState>,
    Json(spec): Json<GroupSpec>,
) -> ApiResult<Json<PriceResponse>> {
    let price = state.bidengine.calculate_price(&spec).await?;
    Ok(Json(PriceResponse {
        price,
        strategy: state.bidengine.strategy_name().to_string(),
    }))
}
