//! Decision engine - decides whether a batch of observations triggers an
//! intervention.
//!
//! The engine is a pure function of its inputs: the events, the lifecycle
//! context, and the random source it is handed. It never touches shared
//! state; committing a proposal is the lifecycle manager's job.
//!
//! Trigger procedure (after the active/cooldown short-circuits):
//! 1. An unconditional roll with `random_trigger_probability`. On success a
//!    kind is drawn uniformly and a proposal is synthesized for it.
//! 2. Otherwise, if any of the last `recent_window` events moves faster
//!    than `movement_threshold`, a second roll with
//!    `movement_trigger_probability` may propose a hand fix.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Event, InterventionKind, InterventionProposal, Position};

const HAND_BASE: Position = Position { x: 200.0, y: 150.0 };
const BALL_BASE: Position = Position { x: 100.0, y: 100.0 };

/// Decision engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Chance of the unconditional trigger (default: 0.5)
    pub random_trigger_probability: f64,

    /// Chance of the movement trigger once movement is seen (default: 0.3)
    pub movement_trigger_probability: f64,

    /// Velocity magnitude that counts as movement (default: 1.0)
    pub movement_threshold: f64,

    /// Number of trailing events inspected for movement (default: 3)
    pub recent_window: usize,

    /// Duration of organically triggered interventions in ms (default: 5000)
    pub duration_ms: u64,

    /// Half-width of the uniform jitter applied to target coordinates (default: 50)
    pub position_jitter: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            random_trigger_probability: 0.5,
            movement_trigger_probability: 0.3,
            movement_threshold: 1.0,
            recent_window: 3,
            duration_ms: 5000,
            position_jitter: 50.0,
        }
    }
}

/// Lifecycle facts the engine needs to honor its short-circuits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionContext {
    pub is_active: bool,
    pub in_cooldown: bool,
}

/// Produces at most one proposal per batch of events
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Decide whether `events` should trigger an intervention.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        events: &[Event],
        context: DecisionContext,
        rng: &mut R,
    ) -> Option<InterventionProposal> {
        if context.is_active {
            debug!("Intervention already active, not proposing");
            return None;
        }
        if context.in_cooldown {
            debug!("In cooldown period, not proposing");
            return None;
        }

        debug!("Processing {} events for potential interventions", events.len());

        if rng.gen_bool(probability(self.config.random_trigger_probability)) {
            let kind = InterventionKind::ALL[rng.gen_range(0..InterventionKind::ALL.len())];
            debug!("Random trigger fired for {}", kind);
            return Some(self.random_proposal(kind, rng));
        }

        if self.movement_detected(events)
            && rng.gen_bool(probability(self.config.movement_trigger_probability))
        {
            debug!("Movement trigger fired");
            return Some(InterventionProposal::new(
                InterventionKind::HandPosition,
                Some(HAND_BASE),
                self.config.duration_ms,
                "Movement-triggered intervention",
            ));
        }

        None
    }

    /// Whether any of the trailing events moves faster than the threshold
    pub fn movement_detected(&self, events: &[Event]) -> bool {
        let start = events.len().saturating_sub(self.config.recent_window);
        events[start..]
            .iter()
            .any(|event| event.exceeds(self.config.movement_threshold))
    }

    fn random_proposal<R: Rng + ?Sized>(
        &self,
        kind: InterventionKind,
        rng: &mut R,
    ) -> InterventionProposal {
        let (target, reason) = match kind {
            InterventionKind::HandPosition => (
                Some(self.jittered(HAND_BASE, rng)),
                "Testing causal effect of fixed hand position",
            ),
            InterventionKind::BallPosition => (
                Some(self.jittered(BALL_BASE, rng)),
                "Testing causal effect of fixed ball position",
            ),
            InterventionKind::Collision => (None, "Testing causal effect of prevented collisions"),
        };
        InterventionProposal::new(kind, target, self.config.duration_ms, reason)
    }

    fn jittered<R: Rng + ?Sized>(&self, base: Position, rng: &mut R) -> Position {
        let jitter = self.config.position_jitter;
        if jitter <= 0.0 || !jitter.is_finite() {
            return base;
        }
        Position::new(
            base.x + rng.gen_range(-jitter..jitter),
            base.y + rng.gen_range(-jitter..jitter),
        )
    }
}

/// Clamp a configured probability into the range `gen_bool` accepts
fn probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InterventionAction;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn engine(random: f64, movement: f64) -> DecisionEngine {
        DecisionEngine::new(DecisionConfig {
            random_trigger_probability: random,
            movement_trigger_probability: movement,
            ..Default::default()
        })
    }

    fn moving(vx: f64) -> Event {
        Event {
            hand_vx: Some(vx),
            ..Default::default()
        }
    }

    fn idle() -> DecisionContext {
        DecisionContext::default()
    }

    #[test]
    fn test_no_proposal_while_active() {
        let mut rng = StdRng::seed_from_u64(1);
        let ctx = DecisionContext {
            is_active: true,
            in_cooldown: false,
        };
        assert!(engine(1.0, 1.0).decide(&[moving(5.0)], ctx, &mut rng).is_none());
    }

    #[test]
    fn test_no_proposal_during_cooldown() {
        let mut rng = StdRng::seed_from_u64(1);
        let ctx = DecisionContext {
            is_active: false,
            in_cooldown: true,
        };
        assert!(engine(1.0, 1.0).decide(&[moving(5.0)], ctx, &mut rng).is_none());
    }

    #[test]
    fn test_random_trigger_builds_complete_proposals() {
        let engine = engine(1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let proposal = engine.decide(&[], idle(), &mut rng).unwrap();
            assert_eq!(proposal.kind, proposal.node);
            assert_eq!(proposal.duration_ms, 5000);
            assert!(!proposal.reason.is_empty());

            match proposal.kind {
                InterventionKind::HandPosition => {
                    let target = proposal.target.unwrap();
                    assert_eq!(proposal.action, InterventionAction::Fix);
                    assert!((150.0..250.0).contains(&target.x));
                    assert!((100.0..200.0).contains(&target.y));
                }
                InterventionKind::BallPosition => {
                    let target = proposal.target.unwrap();
                    assert_eq!(proposal.action, InterventionAction::Fix);
                    assert!((50.0..150.0).contains(&target.x));
                    assert!((50.0..150.0).contains(&target.y));
                }
                InterventionKind::Collision => {
                    assert_eq!(proposal.action, InterventionAction::Prevent);
                    assert!(proposal.target.is_none());
                }
            }
        }
    }

    #[test]
    fn test_random_trigger_covers_all_kinds() {
        let engine = engine(1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..100 {
            seen.insert(engine.decide(&[], idle(), &mut rng).unwrap().kind);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_movement_trigger_proposes_hand_fix() {
        let engine = engine(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);

        let proposal = engine.decide(&[moving(2.0)], idle(), &mut rng).unwrap();
        assert_eq!(proposal.kind, InterventionKind::HandPosition);
        assert_eq!(proposal.action, InterventionAction::Fix);
        assert_eq!(proposal.target, Some(Position::new(200.0, 150.0)));
        assert_eq!(proposal.reason, "Movement-triggered intervention");
    }

    #[test]
    fn test_no_movement_no_proposal() {
        let engine = engine(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let still = Event {
            hand_vx: Some(0.5),
            ball_vy: Some(-1.0),
            ..Default::default()
        };
        assert!(engine.decide(&[still.clone(), still], idle(), &mut rng).is_none());
    }

    #[test]
    fn test_only_recent_events_count_as_movement() {
        let engine = engine(0.0, 1.0);
        let events = vec![moving(10.0), moving(0.0), moving(0.0), moving(0.0)];
        assert!(!engine.movement_detected(&events));

        let events = vec![moving(0.0), moving(10.0), moving(0.0), moving(0.0)];
        assert!(engine.movement_detected(&events));
    }

    #[test]
    fn test_random_trigger_is_roughly_half() {
        let engine = DecisionEngine::default();
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 2000;

        let proposed = (0..trials)
            .filter(|_| engine.decide(&[Event::default()], idle(), &mut rng).is_some())
            .count();

        assert!(
            (850..1150).contains(&proposed),
            "expected roughly half of {trials} trials to propose, got {proposed}"
        );
    }

    #[test]
    fn test_out_of_range_probabilities_are_clamped() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(engine(2.0, 0.0).decide(&[], idle(), &mut rng).is_some());
        assert!(engine(-1.0, 0.0).decide(&[], idle(), &mut rng).is_none());
        assert!(engine(f64::NAN, 0.0).decide(&[], idle(), &mut rng).is_none());
    }

    #[test]
    fn test_zero_jitter_uses_base_positions() {
        let engine = DecisionEngine::new(DecisionConfig {
            random_trigger_probability: 1.0,
            position_jitter: 0.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..50 {
            let proposal = engine.decide(&[], idle(), &mut rng).unwrap();
            match proposal.kind {
                InterventionKind::HandPosition => {
                    assert_eq!(proposal.target, Some(HAND_BASE))
                }
                InterventionKind::BallPosition => {
                    assert_eq!(proposal.target, Some(BALL_BASE))
                }
                InterventionKind::Collision => assert!(proposal.target.is_none()),
            }
        }
    }
}
