//! Health check endpoint.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub intervention_active: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    // A poisoned state lock is the only way the service can be unhealthy
    let (status, intervention_active) = match state.interventions.lifecycle().context() {
        Ok(context) => ("healthy", context.is_active),
        Err(_) => ("degraded", false),
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        intervention_active,
    })
}
