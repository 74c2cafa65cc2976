//! Router configuration for the order service.

use super::orders::place_order;
use super::state::AppState;
use axum::{
    Router,
    extract::State,
    response::Response,
    routing::{get, post},
};
use bookbazaar_web::handlers::{health_check, render_metrics};
use bookbazaar_web::middleware::correlation_id_layer;

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/orders", post(place_order))
        .layer(correlation_id_layer())
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn metrics(State(state): State<AppState>) -> Response {
    render_metrics(&state.metrics)
}
