//! Intervention routes used by the simulation client.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::{get, post},
};
use intervention_core::{ActiveIntervention, ClientCommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/process_events", post(process_events))
        .route("/get_interventions", get(get_interventions))
        .route("/force_intervention/{kind}", get(force_intervention))
}

#[derive(Debug, Serialize)]
pub struct InterventionsResponse<T> {
    pub interventions: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ForceResponse {
    pub success: bool,
    pub intervention: ActiveIntervention,
}

#[derive(Debug, Deserialize)]
pub struct ForceParams {
    pub duration: Option<String>,
}

/// POST /process_events - Feed a batch of events to the decision engine
pub async fn process_events(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InterventionsResponse<ActiveIntervention>>, ApiError> {
    let Json(payload) = body.map_err(|e| {
        warn!("Invalid event payload: {}", e);
        ApiError::malformed_body()
    })?;

    let interventions = state
        .interventions
        .submit_events(&payload)
        .map_err(ApiError::interventions)?;

    debug!("Processed event batch, {} activated", interventions.len());

    Ok(Json(InterventionsResponse { interventions }))
}

/// GET /get_interventions - What the client should be doing right now
pub async fn get_interventions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InterventionsResponse<ClientCommand>>, ApiError> {
    let interventions = state
        .interventions
        .poll_interventions()
        .map_err(ApiError::interventions)?;

    if interventions.is_empty() {
        debug!("No active interventions");
    }

    Ok(Json(InterventionsResponse { interventions }))
}

/// GET /force_intervention/{kind}?duration=ms - Administrative override
pub async fn force_intervention(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(params): Query<ForceParams>,
) -> Result<Json<ForceResponse>, ApiError> {
    let duration = params.duration.as_deref().and_then(parse_duration);
    let intervention = state.interventions.force_intervention(&kind, duration)?;

    debug!("Force request for {} served ({})", kind, intervention.id);

    Ok(Json(ForceResponse {
        success: true,
        intervention,
    }))
}

/// Parse the leading digits of a duration query value; anything without
/// leading digits falls back to the configured default.
fn parse_duration(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw[..end].parse().ok()
}
