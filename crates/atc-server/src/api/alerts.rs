//! Safety-net alert endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;
use atc_core::Alert;

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub by: String,
}

/// Active alerts, oldest first.
pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.active_alerts())
}

/// Run all safety nets now. Returns only newly raised alerts.
pub async fn check_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.check_safety_nets())
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> Result<Json<Alert>, StatusCode> {
    state
        .acknowledge_alert(&id, &req.by)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, StatusCode> {
    state.resolve_alert(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}
