use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Sync routes
        .route("/api/sync", post(handlers::sync::trigger_full_sync))
        .route("/api/sync/status", get(handlers::sync::get_status))
        .route("/api/sync/probe", post(handlers::sync::probe))
        .route("/api/sync/reset", post(handlers::sync::reset_flags))
        // Cluster routes
        .route("/api/clusters", get(handlers::clusters::list_clusters))
        .route("/api/clusters/:id/topology", get(handlers::clusters::get_topology))
        .route("/api/clusters/:id/sync", post(handlers::clusters::trigger_sync))
        .route("/api/clusters/:id/status", get(handlers::clusters::get_sync_status))
        // Device routes
        .route("/api/devices/:id/position", put(handlers::clusters::update_device_position))
        .route("/api/device-roles", get(handlers::clusters::list_device_roles))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
