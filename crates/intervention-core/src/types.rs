//! Shared types for intervention-core.
//!
//! These types are used by both the lifecycle manager and the REST layer.
//! Field names follow the wire format expected by the simulation client
//! (camelCase, `type`/`node` tags, epoch-millisecond timestamps).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Observation Types
// ─────────────────────────────────────────────────────────────────────────────

/// One observation sample reported by the simulation client.
///
/// Only the velocity components are read. Anything else the client sends
/// along is ignored, and a component that is missing or not a number
/// counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hand_vx: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hand_vy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ball_vx: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ball_vy: Option<f64>,
}

impl Event {
    /// Whether any velocity component's magnitude is strictly above `threshold`
    pub fn exceeds(&self, threshold: f64) -> bool {
        [self.hand_vx, self.hand_vy, self.ball_vx, self.ball_vy]
            .into_iter()
            .flatten()
            .any(|v| v.abs() > threshold)
    }

    /// Read a single event, treating anything that is not an object as empty
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

/// Extract the `events` list from a submission payload.
///
/// The payload must be an object whose `events` member is an array;
/// anything else is rejected before any state is touched.
pub fn parse_events(payload: &serde_json::Value) -> Result<Vec<Event>> {
    let events = payload
        .get("events")
        .ok_or_else(|| Error::invalid_input("missing `events`"))?
        .as_array()
        .ok_or_else(|| Error::invalid_input("`events` must be a list"))?;

    Ok(events.iter().map(Event::from_value).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Intervention Types
// ─────────────────────────────────────────────────────────────────────────────

/// What an intervention overrides in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterventionKind {
    HandPosition,
    BallPosition,
    Collision,
}

impl InterventionKind {
    pub const ALL: [InterventionKind; 3] = [
        InterventionKind::HandPosition,
        InterventionKind::BallPosition,
        InterventionKind::Collision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandPosition => "handPosition",
            Self::BallPosition => "ballPosition",
            Self::Collision => "collision",
        }
    }

    /// Resolve the short names used by the force endpoint (`hand`, `ball`,
    /// `collision`). Canonical names are accepted as well.
    pub fn from_alias(alias: &str) -> Result<Self> {
        match alias {
            "hand" | "handPosition" => Ok(Self::HandPosition),
            "ball" | "ballPosition" => Ok(Self::BallPosition),
            "collision" => Ok(Self::Collision),
            other => Err(Error::InvalidKind(other.to_string())),
        }
    }

    /// Action applied by this kind of intervention
    pub fn action(&self) -> InterventionAction {
        match self {
            Self::HandPosition | Self::BallPosition => InterventionAction::Fix,
            Self::Collision => InterventionAction::Prevent,
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionAction {
    Fix,
    Prevent,
}

impl fmt::Display for InterventionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fix => f.write_str("fix"),
            Self::Prevent => f.write_str("prevent"),
        }
    }
}

/// Target coordinates for position-fixing interventions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Candidate intervention, not yet committed to the lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterventionProposal {
    #[serde(rename = "type")]
    pub kind: InterventionKind,
    /// Always equal to `kind`; kept separately for the client protocol
    pub node: InterventionKind,
    pub action: InterventionAction,
    #[serde(flatten)]
    pub target: Option<Position>,
    /// Milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub reason: String,
}

impl InterventionProposal {
    pub fn new(
        kind: InterventionKind,
        target: Option<Position>,
        duration_ms: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            node: kind,
            action: kind.action(),
            target,
            duration_ms,
            reason: reason.into(),
        }
    }

    /// Preset used by the administrative force path
    pub fn manual(kind: InterventionKind, duration_ms: u64) -> Self {
        let target = match kind {
            InterventionKind::HandPosition => Some(Position::new(200.0, 150.0)),
            InterventionKind::BallPosition => Some(Position::new(150.0, 100.0)),
            InterventionKind::Collision => None,
        };
        Self::new(kind, target, duration_ms, "Manual test intervention")
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// The intervention currently occupying the global slot.
///
/// `id` identifies this particular activation so that a stale expiry
/// timer can tell it is no longer looking at its own intervention.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIntervention {
    pub id: Uuid,
    #[serde(flatten)]
    pub proposal: InterventionProposal,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
    pub active: bool,
    /// Epoch milliseconds
    pub expires_at: i64,
}

impl ActiveIntervention {
    pub fn start(proposal: InterventionProposal, now_ms: i64) -> Self {
        let expires_at = now_ms.saturating_add(proposal.duration_ms.min(i64::MAX as u64) as i64);
        Self {
            id: Uuid::new_v4(),
            proposal,
            timestamp: now_ms,
            active: true,
            expires_at,
        }
    }

    pub fn kind(&self) -> InterventionKind {
        self.proposal.kind
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreTag {
    Restore,
}

/// Tells the client to drop any override it applied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreCommand {
    #[serde(rename = "type")]
    pub tag: RestoreTag,
    pub node: RestoreTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_type: Option<InterventionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_node: Option<InterventionKind>,
    pub force_restore: bool,
}

impl RestoreCommand {
    /// Restore issued when an intervention of `kind` has just ended
    pub fn after(kind: InterventionKind) -> Self {
        Self {
            tag: RestoreTag::Restore,
            node: RestoreTag::Restore,
            original_type: Some(kind),
            original_node: Some(kind),
            force_restore: true,
        }
    }

    /// Repeated restore sent during the grace window
    pub fn reinforce() -> Self {
        Self {
            tag: RestoreTag::Restore,
            node: RestoreTag::Restore,
            original_type: None,
            original_node: None,
            force_restore: true,
        }
    }
}

/// What a polling client should be doing right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientCommand {
    Intervention(ActiveIntervention),
    Restore(RestoreCommand),
}
