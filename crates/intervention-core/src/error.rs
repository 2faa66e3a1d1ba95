//! Error types for intervention-core.

use thiserror::Error;

/// Result type alias using intervention-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for intervention operations
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Invalid event data format: {0}")]
    InvalidInput(String),

    #[error("Invalid intervention type: {0}")]
    InvalidKind(String),

    // Internal faults
    #[error("Intervention state lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Create an input error for a malformed event submission
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Whether the error was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidKind(_))
    }
}
