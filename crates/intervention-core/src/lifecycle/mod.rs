//! Intervention lifecycle - the single global intervention slot.
//!
//! ```text
//!            activate (Empty + cooldown elapsed)
//!   ┌───────┐ ──────────────────────────────────▶ ┌────────┐
//!   │ Empty │                                     │ Active │
//!   └───────┘ ◀────────────────────────────────── └────────┘
//!      ▲        timer fires (same id)  │  poll sees expiresAt <= now
//!      │                               │  (records + returns restore)
//!      └───── forceActivate overwrites either state ──────┘
//! ```
//!
//! [`LifecycleState`] is the plain state machine: every transition takes
//! `now` explicitly and nothing in it blocks or spawns. [`LifecycleManager`]
//! puts it behind the lock and owns the expiry timers.

mod manager;

pub use manager::LifecycleManager;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::DecisionContext;
use crate::history::{History, HistoryRecord};
use crate::types::{ActiveIntervention, ClientCommand, InterventionProposal, RestoreCommand};

/// Lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Quiet period between the end of one intervention and the next
    /// organic one, in ms (default: 5000)
    pub cooldown_ms: u64,

    /// How long after an intervention ends polls still get a restore, in ms
    /// (default: 2000)
    pub grace_window_ms: u64,

    /// Duration used by forced interventions when none is given, in ms
    /// (default: 5000)
    pub default_duration_ms: u64,

    /// Maximum history records kept, 0 for unbounded (default: 1000)
    pub history_limit: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 5000,
            grace_window_ms: 2000,
            default_duration_ms: 5000,
            history_limit: 1000,
        }
    }
}

/// Result of a poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// An unexpired intervention is in the slot
    Active(ActiveIntervention),
    /// The intervention in the slot just expired; this poll ended it
    Expired(RestoreCommand),
    /// The slot is empty but an intervention ended within the grace window
    Reinforce(RestoreCommand),
    /// Nothing to do
    Idle,
}

impl PollOutcome {
    pub fn into_command(self) -> Option<ClientCommand> {
        match self {
            Self::Active(intervention) => Some(ClientCommand::Intervention(intervention)),
            Self::Expired(restore) | Self::Reinforce(restore) => {
                Some(ClientCommand::Restore(restore))
            }
            Self::Idle => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    pub active: bool,
    pub remaining_ms: u64,
    pub remaining_sec: u64,
}

impl CooldownStatus {
    fn from_remaining(remaining_ms: u64) -> Self {
        Self {
            active: remaining_ms > 0,
            remaining_ms,
            remaining_sec: (remaining_ms + 500) / 1000,
        }
    }
}

/// Read-only view of the lifecycle for observability
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleSnapshot {
    pub current: Option<ActiveIntervention>,
    pub history: Vec<HistoryRecord>,
    /// Records evicted by the history retention limit
    pub history_dropped: u64,
    pub cooldown: CooldownStatus,
}

/// The slot, the cooldown clock and the history.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    config: LifecycleConfig,
    current: Option<ActiveIntervention>,
    /// When the last intervention ended, epoch ms. `None` until one has.
    last_end: Option<i64>,
    history: History,
}

impl LifecycleState {
    pub fn new(config: LifecycleConfig) -> Self {
        let history = History::new(config.history_limit);
        Self {
            config,
            current: None,
            last_end: None,
            history,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn current(&self) -> Option<&ActiveIntervention> {
        self.current.as_ref()
    }

    pub fn last_end(&self) -> Option<i64> {
        self.last_end
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|c| c.active)
    }

    /// Milliseconds of cooldown left at `now_ms`
    pub fn cooldown_remaining(&self, now_ms: i64) -> u64 {
        let Some(last_end) = self.last_end else {
            return 0;
        };
        let elapsed = now_ms.saturating_sub(last_end).max(0) as u64;
        self.config.cooldown_ms.saturating_sub(elapsed)
    }

    pub fn in_cooldown(&self, now_ms: i64) -> bool {
        self.cooldown_remaining(now_ms) > 0
    }

    pub fn decision_context(&self, now_ms: i64) -> DecisionContext {
        DecisionContext {
            is_active: self.is_active(),
            in_cooldown: self.in_cooldown(now_ms),
        }
    }

    /// Activate `proposal` if the slot is empty and the cooldown has
    /// elapsed. Returns `None` without touching anything otherwise.
    pub fn activate(
        &mut self,
        proposal: InterventionProposal,
        now_ms: i64,
    ) -> Option<ActiveIntervention> {
        if self.is_active() || self.in_cooldown(now_ms) {
            return None;
        }
        Some(self.install(proposal, now_ms))
    }

    /// Activate `proposal` regardless of the current slot or cooldown
    pub fn force(&mut self, proposal: InterventionProposal, now_ms: i64) -> ActiveIntervention {
        self.install(proposal, now_ms)
    }

    fn install(&mut self, proposal: InterventionProposal, now_ms: i64) -> ActiveIntervention {
        if let Some(previous) = self.current.take() {
            self.history.mark_ended(previous.id);
        }
        let intervention = ActiveIntervention::start(proposal, now_ms);
        self.history.record_intervention(&intervention);
        self.current = Some(intervention.clone());
        intervention
    }

    /// Timer-driven expiry. Only clears the slot if it still holds the
    /// intervention identified by `id`; returns whether it did.
    pub fn expire(&mut self, id: Uuid, now_ms: i64) -> bool {
        match &self.current {
            Some(current) if current.id == id => {
                self.current = None;
                self.last_end = Some(now_ms);
                self.history.mark_ended(id);
                true
            }
            _ => false,
        }
    }

    /// Read path with lazy expiry detection.
    pub fn poll(&mut self, now_ms: i64) -> PollOutcome {
        if let Some(current) = self.current.as_ref().filter(|c| c.active) {
            if !current.is_expired_at(now_ms) {
                return PollOutcome::Active(current.clone());
            }

            let id = current.id;
            let restore = RestoreCommand::after(current.kind());
            self.current = None;
            self.last_end = Some(now_ms);
            self.history.mark_ended(id);
            self.history.record_restore(&restore, now_ms);
            return PollOutcome::Expired(restore);
        }

        if self.within_grace_window(now_ms) {
            return PollOutcome::Reinforce(RestoreCommand::reinforce());
        }

        PollOutcome::Idle
    }

    fn within_grace_window(&self, now_ms: i64) -> bool {
        self.last_end
            .is_some_and(|end| now_ms.saturating_sub(end) < self.config.grace_window_ms as i64)
    }

    pub fn snapshot(&self, now_ms: i64) -> LifecycleSnapshot {
        LifecycleSnapshot {
            current: self.current.clone(),
            history: self.history.to_vec(),
            history_dropped: self.history.dropped(),
            cooldown: CooldownStatus::from_remaining(self.cooldown_remaining(now_ms)),
        }
    }
}
