use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::models::GlobalSyncStatus;
use crate::sync::FullSyncReport;
use crate::AppState;

use super::{ApiError, MessageResponse};

/// Run a full sync of every inventory cluster
pub async fn trigger_full_sync(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<FullSyncReport>), ApiError> {
    if !state.config.inventory.is_configured() {
        return Err(ApiError::bad_request("Inventory URL and token are not configured"));
    }

    let report = state.coordinator.trigger_full_sync().await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(report)))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<GlobalSyncStatus>, ApiError> {
    Ok(Json(state.coordinator.global_status().await?))
}

#[derive(Serialize)]
pub struct ProbeResponse {
    pub success: bool,
    pub connected: bool,
}

/// Check inventory reachability without syncing
pub async fn probe(State(state): State<Arc<AppState>>) -> Json<ProbeResponse> {
    let connected = state.coordinator.probe().await;
    Json(ProbeResponse {
        success: connected,
        connected,
    })
}

/// Clear stuck in-progress flags
pub async fn reset_flags(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>, ApiError> {
    let cleared = state.coordinator.reset_stuck_flags().await?;
    Ok(MessageResponse::new(true, format!("Cleared {} sync flags", cleared)))
}
