//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::provider_status))
        // Bidding
        .route("/bids/price", post(handlers::price_bid))
        // Leases
        .route("/leases", get(handlers::list_leases))
        .route("/leases/award", post(handlers::award_lease))
        .route("/leases/manifest", post(handlers::submit_manifest))
        .route(
            "/leases/:owner/:dseq/:gseq/:provider",
            get(handlers::get_lease).delete(handlers::teardown_lease),
        )
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
