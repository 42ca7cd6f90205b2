//! Route definitions for the API.

use axum::{extract::State, routing::get, Router};

use super::handlers;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Health endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/healthz", get(handlers::health::health_check))
        // Prometheus metrics
        .route("/metrics", get(render_metrics))
        // API v1 routes
        .nest("/api/v1/quality", handlers::quality::router())
        .nest("/api/v1/history", handlers::history::router())
        .nest("/api/v1/aggregation", handlers::aggregation::router())
        .with_state(state)
}

/// Render the Prometheus metrics exposition.
async fn render_metrics(State(state): State<SharedState>) -> String {
    match &state.metrics_handle {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}
