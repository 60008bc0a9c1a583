//! REST API routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::api::{alerts, flights};
use crate::state::{AppState, IngestError, IngestResult, ScenarioSummary};
use atc_core::fpl::{self, FlightPlanMessage, ValidationDefect};
use atc_core::{
    MessageOutcome, Position, SequenceSnapshot, StatusChange, StripOptions, SurfacePosition,
    TrafficScenario,
};

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/messages", post(submit_message))
        .route("/v1/messages/validate", post(validate_message))
        .route("/v1/flights", get(flights::list_flights))
        .route("/v1/flights/:id", get(flights::get_flight))
        .route("/v1/flights/:id/clearances", post(flights::issue_clearance))
        .route(
            "/v1/flights/:id/clearances/:clearance_id/readback",
            post(flights::confirm_readback),
        )
        .route("/v1/flights/:id/annotations", post(flights::add_annotation))
        .route("/v1/surface", post(update_surface))
        .route("/v1/sequences", get(get_sequences))
        .route("/v1/sequences/recompute", post(recompute_sequences))
        .route("/v1/alerts", get(alerts::list_alerts))
        .route("/v1/alerts/check", post(alerts::check_alerts))
        .route("/v1/alerts/:id/acknowledge", post(alerts::acknowledge_alert))
        .route("/v1/alerts/:id/resolve", post(alerts::resolve_alert))
        .route("/v1/simulation/tick", post(simulation_tick))
        .route("/v1/scenario", post(load_scenario))
}

pub(crate) type ApiError = (StatusCode, Json<serde_json::Value>);

pub(crate) fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

// === Request/Response types ===

#[derive(Debug, Deserialize)]
pub struct SubmitMessageRequest {
    pub message: String,
    /// Runway, gate and procedure assignments for a new strip.
    #[serde(flatten)]
    pub options: StripOptions,
}

#[derive(Debug, Deserialize)]
pub struct ValidateMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateMessageResponse {
    pub valid: bool,
    pub message: FlightPlanMessage,
    pub defects: Vec<ValidationDefect>,
}

/// Surface report. `flight_id` may be omitted when the callsign is known.
#[derive(Debug, Deserialize)]
pub struct SurfaceReport {
    #[serde(default)]
    pub flight_id: Option<String>,
    pub callsign: String,
    pub position: Position,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub ground_speed_kt: f64,
    #[serde(default)]
    pub taxiway: Option<String>,
    #[serde(default)]
    pub runway: Option<String>,
    #[serde(default)]
    pub on_runway: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SurfaceUpdateResponse {
    pub accepted: usize,
    pub unknown: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub sim_time: DateTime<Utc>,
    pub changes: Vec<StatusChange>,
}

// === Handlers ===

async fn submit_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitMessageRequest>,
) -> Result<(StatusCode, Json<IngestResult>), ApiError> {
    match state.ingest_message(&req.message, req.options) {
        Ok(result) => {
            let status = match result.outcome {
                MessageOutcome::Inserted { .. } => StatusCode::CREATED,
                _ => StatusCode::OK,
            };
            Ok((status, Json(result)))
        }
        Err(e @ IngestError::Parse(_)) => Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, e)),
        Err(e @ IngestError::Transition(_)) => Err(api_error(StatusCode::CONFLICT, e)),
    }
}

async fn validate_message(
    Json(req): Json<ValidateMessageRequest>,
) -> Result<Json<ValidateMessageResponse>, ApiError> {
    let message =
        fpl::parse(&req.message).map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let defects = fpl::validate(&message);
    Ok(Json(ValidateMessageResponse {
        valid: defects.is_empty(),
        message,
        defects,
    }))
}

async fn update_surface(
    State(state): State<Arc<AppState>>,
    Json(reports): Json<Vec<SurfaceReport>>,
) -> Json<SurfaceUpdateResponse> {
    let mut accepted = 0;
    let mut unknown = Vec::new();

    for report in reports {
        let flight = match report.flight_id.as_deref() {
            Some(id) => state.flight(id),
            None => state.flight_by_callsign(&report.callsign),
        };
        let Some(flight) = flight else {
            unknown.push(report.callsign);
            continue;
        };

        let on_runway = report.on_runway.unwrap_or(report.runway.is_some());
        state.upsert_surface_position(SurfacePosition {
            flight_id: flight.id,
            callsign: flight.callsign,
            position: report.position,
            heading_deg: report.heading_deg,
            ground_speed_kt: report.ground_speed_kt,
            taxiway: report.taxiway,
            runway: report.runway,
            on_runway,
        });
        accepted += 1;
    }

    if !unknown.is_empty() {
        tracing::debug!("Surface reports for unknown flights: {:?}", unknown);
    }
    Json(SurfaceUpdateResponse { accepted, unknown })
}

async fn get_sequences(State(state): State<Arc<AppState>>) -> Json<SequenceSnapshot> {
    Json(state.sequences())
}

async fn recompute_sequences(State(state): State<Arc<AppState>>) -> Json<SequenceSnapshot> {
    Json(state.recompute_sequences().0)
}

async fn simulation_tick(State(state): State<Arc<AppState>>) -> Json<TickResponse> {
    let changes = state.tick();
    Json(TickResponse {
        sim_time: state.now(),
        changes,
    })
}

async fn load_scenario(
    State(state): State<Arc<AppState>>,
    Json(scenario): Json<TrafficScenario>,
) -> Result<(StatusCode, Json<ScenarioSummary>), ApiError> {
    let summary = state
        .load_scenario(&scenario)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    tracing::info!(
        "Scenario {} loaded: {} active, {} pending",
        summary.id,
        summary.immediate,
        summary.pending
    );
    Ok((StatusCode::CREATED, Json(summary)))
}
