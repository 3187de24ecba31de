use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::*;
use crate::sync::ClusterSyncOutcome;
use crate::AppState;

use super::ApiError;

/// List all synced clusters
pub async fn list_clusters(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Cluster>>, ApiError> {
    let clusters = state.store.list_clusters().await?;
    Ok(Json(clusters))
}

/// Graph view of one cluster, by inventory id
pub async fn get_topology(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TopologyGraph>, ApiError> {
    let graph = state
        .store
        .cluster_topology(id)
        .await?
        .ok_or_else(|| ApiError::not_found("cluster"))?;
    Ok(Json(graph))
}

#[derive(Serialize)]
pub struct ClusterSyncResponse {
    pub success: bool,
    pub message: String,
    pub result: ClusterSyncOutcome,
}

/// Sync one cluster now. A run already in progress is reported, not queued.
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ClusterSyncResponse>), ApiError> {
    if !state.config.inventory.is_configured() {
        return Err(ApiError::bad_request("Inventory URL and token are not configured"));
    }

    let outcome = state.coordinator.trigger_cluster_sync(id).await;
    let (status, success) = match &outcome {
        ClusterSyncOutcome::Completed(_) => (StatusCode::OK, true),
        ClusterSyncOutcome::AlreadyInProgress { .. } => (StatusCode::OK, false),
        ClusterSyncOutcome::Failed { .. } => (StatusCode::BAD_GATEWAY, false),
    };

    Ok((
        status,
        Json(ClusterSyncResponse {
            success,
            message: outcome.message(),
            result: outcome,
        }),
    ))
}

pub async fn get_sync_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ClusterSyncStatus>, ApiError> {
    let status = state
        .coordinator
        .get_status(id)
        .await?
        .ok_or_else(|| ApiError::not_found("cluster"))?;
    Ok(Json(status))
}

/// Save a node's canvas position
pub async fn update_device_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(position): Json<Position>,
) -> Result<Json<Device>, ApiError> {
    if !position.x.is_finite() || !position.y.is_finite() {
        return Err(ApiError::bad_request("position must be finite"));
    }
    let device = state.store.update_device_position(id, position).await?;
    Ok(Json(device))
}

pub async fn list_device_roles(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DeviceRole>>, ApiError> {
    Ok(Json(state.store.list_device_roles().await?))
}
