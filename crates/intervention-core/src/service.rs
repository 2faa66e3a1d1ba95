//! InterventionService - the operations exposed to the transport layer.
//!
//! Wires the decision engine to the lifecycle manager:
//! - `submit_events`: decide on a batch of events, activate the proposal
//! - `poll_interventions`: what the client should be doing now
//! - `force_intervention`: administrative override
//! - `debug_snapshot`: read-only view for observability

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::decision::{DecisionConfig, DecisionEngine};
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleConfig, LifecycleManager, LifecycleSnapshot};
use crate::types::{ActiveIntervention, ClientCommand, Event, InterventionKind, parse_events};

pub struct InterventionService<C: Clock = SystemClock> {
    engine: DecisionEngine,
    lifecycle: LifecycleManager<C>,
    rng: Mutex<StdRng>,
}

impl InterventionService<SystemClock> {
    pub fn new(decision: DecisionConfig, lifecycle: LifecycleConfig) -> Self {
        Self::with_parts(
            DecisionEngine::new(decision),
            LifecycleManager::new(lifecycle),
            StdRng::from_entropy(),
        )
    }
}

impl<C: Clock> InterventionService<C> {
    /// Build from explicit parts, e.g. a manual clock and a seeded rng
    pub fn with_parts(engine: DecisionEngine, lifecycle: LifecycleManager<C>, rng: StdRng) -> Self {
        Self {
            engine,
            lifecycle,
            rng: Mutex::new(rng),
        }
    }

    pub fn lifecycle(&self) -> &LifecycleManager<C> {
        &self.lifecycle
    }

    /// Handle a raw submission payload (`{"events": [...]}`).
    ///
    /// Malformed payloads are rejected with [`Error::InvalidInput`] before
    /// any state is read or written.
    pub fn submit_events(&self, payload: &Value) -> Result<Vec<ActiveIntervention>> {
        let events = parse_events(payload)?;
        self.process_events(&events)
    }

    /// Run the decision engine over `events` and activate its proposal.
    ///
    /// The lifecycle re-checks its preconditions on activation, so a
    /// proposal that lost a race to another activation yields nothing.
    pub fn process_events(&self, events: &[Event]) -> Result<Vec<ActiveIntervention>> {
        let context = self.lifecycle.context()?;
        let proposal = {
            let mut rng = self.rng.lock().map_err(|_| Error::LockPoisoned)?;
            self.engine.decide(events, context, &mut *rng)
        };

        let Some(proposal) = proposal else {
            debug!("No intervention triggered at this time");
            return Ok(Vec::new());
        };

        info!(
            "Intervention proposed: {} {} ({})",
            proposal.kind, proposal.action, proposal.reason
        );
        Ok(self.lifecycle.activate(proposal)?.into_iter().collect())
    }

    /// Zero or one command for the polling client
    pub fn poll_interventions(&self) -> Result<Vec<ClientCommand>> {
        Ok(self.lifecycle.poll()?.into_command().into_iter().collect())
    }

    /// Force an intervention by its short name (`hand`, `ball`,
    /// `collision`), bypassing the cooldown and any active intervention.
    pub fn force_intervention(
        &self,
        kind: &str,
        duration_ms: Option<u64>,
    ) -> Result<ActiveIntervention> {
        let kind = InterventionKind::from_alias(kind)?;
        self.lifecycle.force_activate(kind, duration_ms)
    }

    pub fn debug_snapshot(&self) -> Result<LifecycleSnapshot> {
        self.lifecycle.inspect()
    }
}
