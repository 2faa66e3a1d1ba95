//! intervention-core - Core library for the causal intervention server
//!
//! This crate decides when a synthetic intervention is injected into a
//! running simulation and tracks its lifecycle:
//!
//! - **types**: events, proposals, active interventions, restore commands
//! - **decision**: the randomized trigger procedure
//! - **lifecycle**: the single intervention slot, expiry timers, cooldown
//! - **history**: log of activations and restores
//! - **service**: the operations the REST layer calls
//! - **clock**: injectable time source

pub mod clock;
pub mod decision;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{DecisionConfig, DecisionContext, DecisionEngine};
pub use error::{Error, Result};
pub use history::{History, HistoryRecord, RestoreRecord};
pub use lifecycle::{
    CooldownStatus, LifecycleConfig, LifecycleManager, LifecycleSnapshot, LifecycleState,
    PollOutcome,
};
pub use service::InterventionService;
pub use types::{
    ActiveIntervention, ClientCommand, Event, InterventionAction, InterventionKind,
    InterventionProposal, Position, RestoreCommand,
};
