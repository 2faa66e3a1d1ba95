//! Application state.

use intervention_core::InterventionService;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Decision engine + intervention lifecycle
    pub interventions: InterventionService,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Arc<Self> {
        let interventions =
            InterventionService::new(config.decision.clone(), config.lifecycle.clone());
        Arc::new(Self {
            config: Arc::new(config),
            interventions,
            start_time: Instant::now(),
        })
    }
}
