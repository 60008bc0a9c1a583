//! Flight strip endpoints: records, clearances and annotations.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;
use atc_core::{Annotation, Clearance, ClearanceType, FlightRecord};

#[derive(Debug, Deserialize)]
pub struct IssueClearanceRequest {
    #[serde(rename = "type")]
    pub clearance_type: ClearanceType,
    pub value: String,
    pub issued_by: String,
    /// Clearance lapses this many seconds after issue.
    #[serde(default)]
    pub expires_in_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddAnnotationRequest {
    pub content: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub created_by: String,
}

/// Traffic snapshot.
pub async fn list_flights(State(state): State<Arc<AppState>>) -> Json<Vec<FlightRecord>> {
    Json(state.flights())
}

pub async fn get_flight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FlightRecord>, StatusCode> {
    state.flight(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

pub async fn issue_clearance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<IssueClearanceRequest>,
) -> Result<(StatusCode, Json<Clearance>), StatusCode> {
    let now = state.now();
    let mut clearance = Clearance::new(req.clearance_type, req.value, req.issued_by, now);
    if let Some(secs) = req.expires_in_secs.filter(|s| *s > 0) {
        let expires_at = Duration::try_seconds(secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(StatusCode::BAD_REQUEST)?;
        clearance = clearance.with_expiry(expires_at);
    }

    state
        .issue_clearance(&id, clearance)
        .map(|issued| (StatusCode::CREATED, Json(issued)))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn confirm_readback(
    State(state): State<Arc<AppState>>,
    Path((id, clearance_id)): Path<(String, String)>,
) -> Result<Json<Clearance>, StatusCode> {
    state
        .confirm_readback(&id, &clearance_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn add_annotation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddAnnotationRequest>,
) -> Result<(StatusCode, Json<Annotation>), StatusCode> {
    let mut annotation = Annotation::new(req.content, req.created_by, state.now());
    annotation.symbol = req.symbol;

    state
        .add_annotation(&id, annotation)
        .map(|added| (StatusCode::CREATED, Json(added)))
        .ok_or(StatusCode::NOT_FOUND)
}
