//! Lock-guarded lifecycle with expiry timers.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{LifecycleConfig, LifecycleSnapshot, LifecycleState, PollOutcome};
use crate::clock::{Clock, SystemClock};
use crate::decision::DecisionContext;
use crate::error::{Error, Result};
use crate::types::{ActiveIntervention, InterventionKind, InterventionProposal};

/// Everything behind the lock: the state machine and the timer armed for
/// the intervention currently in the slot.
struct Guarded {
    state: LifecycleState,
    timer: Option<AbortHandle>,
}

struct Shared<C> {
    guarded: Mutex<Guarded>,
    clock: C,
}

impl<C: Clock> Shared<C> {
    fn lock(&self) -> Result<MutexGuard<'_, Guarded>> {
        self.guarded.lock().map_err(|_| Error::LockPoisoned)
    }

    fn expire_from_timer(&self, id: Uuid) {
        let Ok(mut guarded) = self.lock() else {
            warn!("Expiry timer for {} found the state lock poisoned", id);
            return;
        };
        let now = self.clock.now_millis();
        let kind = guarded.state.current().map(ActiveIntervention::kind);

        if guarded.state.expire(id, now) {
            guarded.timer = None;
            if let Some(kind) = kind {
                info!("Intervention expired: {} ({})", kind, id);
            }
        } else {
            debug!("Stale expiry timer for {} ignored", id);
        }
    }
}

/// Owns the global intervention slot.
///
/// Every read and write of the slot, the cooldown clock and the history
/// goes through one mutex. Cloning the manager shares the same slot.
pub struct LifecycleManager<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for LifecycleManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl LifecycleManager<SystemClock> {
    pub fn new(config: LifecycleConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> LifecycleManager<C> {
    pub fn with_clock(config: LifecycleConfig, clock: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                guarded: Mutex::new(Guarded {
                    state: LifecycleState::new(config),
                    timer: None,
                }),
                clock,
            }),
        }
    }

    pub fn clock(&self) -> &C {
        &self.shared.clock
    }

    /// Whether an intervention is running and whether the cooldown holds
    pub fn context(&self) -> Result<DecisionContext> {
        let guarded = self.shared.lock()?;
        Ok(guarded.state.decision_context(self.shared.clock.now_millis()))
    }

    /// Activate `proposal` if the slot is empty and the cooldown has
    /// elapsed, arming its expiry timer. Returns `None` if the
    /// preconditions no longer hold.
    pub fn activate(&self, proposal: InterventionProposal) -> Result<Option<ActiveIntervention>> {
        let mut guarded = self.shared.lock()?;
        let now = self.shared.clock.now_millis();

        let Some(intervention) = guarded.state.activate(proposal, now) else {
            debug!("Activation rejected: intervention active or cooldown running");
            return Ok(None);
        };

        self.arm_timer(&mut guarded, &intervention);
        info!(
            "Intervention activated: {} {} for {}ms",
            intervention.kind(),
            intervention.proposal.action,
            intervention.proposal.duration_ms
        );
        Ok(Some(intervention))
    }

    /// Install a preset intervention of `kind`, replacing whatever is in
    /// the slot and ignoring the cooldown.
    pub fn force_activate(
        &self,
        kind: InterventionKind,
        duration_ms: Option<u64>,
    ) -> Result<ActiveIntervention> {
        let mut guarded = self.shared.lock()?;
        let now = self.shared.clock.now_millis();
        let duration_ms = duration_ms.unwrap_or(guarded.state.config().default_duration_ms);

        if let Some(previous) = guarded.state.current() {
            info!("Forced intervention replaces {} ({})", previous.kind(), previous.id);
        }
        let intervention = guarded
            .state
            .force(InterventionProposal::manual(kind, duration_ms), now);

        self.arm_timer(&mut guarded, &intervention);
        info!("Forced intervention created: {} for {}ms", kind, duration_ms);
        Ok(intervention)
    }

    /// What a polling client should be doing right now. Ends the current
    /// intervention if its deadline has passed.
    pub fn poll(&self) -> Result<PollOutcome> {
        let mut guarded = self.shared.lock()?;
        let now = self.shared.clock.now_millis();
        let outcome = guarded.state.poll(now);

        match &outcome {
            PollOutcome::Active(intervention) => {
                debug!("Sending active intervention: {}", intervention.kind());
            }
            PollOutcome::Expired(restore) => {
                if let Some(timer) = guarded.timer.take() {
                    timer.abort();
                }
                info!(
                    "Expired intervention detected, sending restore for {:?}",
                    restore.original_type
                );
            }
            PollOutcome::Reinforce(_) => {
                debug!("Recently concluded intervention, reinforcing restore command");
            }
            PollOutcome::Idle => {}
        }

        Ok(outcome)
    }

    pub fn inspect(&self) -> Result<LifecycleSnapshot> {
        let guarded = self.shared.lock()?;
        Ok(guarded.state.snapshot(self.shared.clock.now_millis()))
    }

    /// Arm the expiry timer for `intervention`, cancelling any previous one.
    ///
    /// Without a tokio runtime no timer is armed; the intervention then
    /// ends on the first poll past its deadline.
    fn arm_timer(&self, guarded: &mut Guarded, intervention: &ActiveIntervention) {
        if let Some(previous) = guarded.timer.take() {
            previous.abort();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, {} will expire on poll only", intervention.id);
            return;
        };

        let shared = Arc::clone(&self.shared);
        let id = intervention.id;
        let duration = Duration::from_millis(intervention.proposal.duration_ms);
        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            shared.expire_from_timer(id);
        });
        guarded.timer = Some(task.abort_handle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::history::HistoryRecord;
    use crate::types::{ClientCommand, RestoreCommand};

    fn manager() -> (LifecycleManager<ManualClock>, ManualClock) {
        let clock = ManualClock::at_millis(1_000_000);
        (
            LifecycleManager::with_clock(LifecycleConfig::default(), clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_works_without_runtime() {
        let (manager, clock) = manager();
        let active = manager
            .force_activate(InterventionKind::HandPosition, Some(1000))
            .unwrap();

        assert_eq!(manager.poll().unwrap(), PollOutcome::Active(active));

        clock.advance(Duration::from_millis(1000));
        assert_eq!(
            manager.poll().unwrap(),
            PollOutcome::Expired(RestoreCommand::after(InterventionKind::HandPosition))
        );
    }

    #[tokio::test]
    async fn test_timer_expires_intervention() {
        let (manager, clock) = manager();
        let proposal = InterventionProposal::manual(InterventionKind::Collision, 20);
        manager.activate(proposal).unwrap().unwrap();

        clock.advance(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let snapshot = manager.inspect().unwrap();
        assert!(snapshot.current.is_none());
        assert!(snapshot.cooldown.active);
        // Timer expiry leaves restore delivery to the polling path
        assert!(!snapshot.history.iter().any(HistoryRecord::is_restore));
        assert_eq!(
            manager.poll().unwrap(),
            PollOutcome::Reinforce(RestoreCommand::reinforce())
        );
    }

    #[tokio::test]
    async fn test_superseded_timer_is_noop() {
        let (manager, _clock) = manager();
        manager
            .force_activate(InterventionKind::HandPosition, Some(20))
            .unwrap();
        let second = manager
            .force_activate(InterventionKind::BallPosition, Some(60_000))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let snapshot = manager.inspect().unwrap();
        assert_eq!(snapshot.current.map(|c| c.id), Some(second.id));
        assert!(!snapshot.cooldown.active);
    }

    #[tokio::test]
    async fn test_lazy_expiry_beats_timer() {
        let (manager, clock) = manager();
        manager
            .force_activate(InterventionKind::BallPosition, Some(50))
            .unwrap();

        clock.advance(Duration::from_millis(50));
        let restore = manager.poll().unwrap().into_command();
        assert_eq!(
            restore,
            Some(ClientCommand::Restore(RestoreCommand::after(
                InterventionKind::BallPosition
            )))
        );
        let ended_at = clock.now_millis();

        // Whatever the timer does afterwards must not move the cooldown clock
        clock.advance(Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let snapshot = manager.inspect().unwrap();
        assert!(snapshot.current.is_none());
        let restores = snapshot.history.iter().filter(|r| r.is_restore()).count();
        assert_eq!(restores, 1);
        assert_eq!(
            snapshot.cooldown.remaining_ms,
            5000 - (clock.now_millis() - ended_at) as u64
        );
    }

    #[tokio::test]
    async fn test_concurrent_activation_admits_one() {
        let (manager, _clock) = manager();
        let mut tasks = Vec::new();

        for i in 0..16 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                let kind = InterventionKind::ALL[i % 3];
                manager
                    .activate(InterventionProposal::manual(kind, 60_000))
                    .unwrap()
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(manager.inspect().unwrap().history.len(), 1);
    }

    #[test]
    fn test_force_uses_default_duration() {
        let (manager, clock) = manager();
        let active = manager
            .force_activate(InterventionKind::Collision, None)
            .unwrap();
        assert_eq!(active.expires_at - clock.now_millis(), 5000);
    }
}
