//! Debug endpoint exposing intervention history and cooldown status.

use axum::{Json, Router, extract::State, routing::get};
use intervention_core::LifecycleSnapshot;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/debug/history", get(history))
}

/// GET /debug/history - Current intervention, history and cooldown
pub async fn history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LifecycleSnapshot>, ApiError> {
    debug!("Debug endpoint accessed - returning intervention history");
    Ok(Json(state.interventions.debug_snapshot()?))
}
