//! Error handling - one hierarchy for the whole trading loop

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Trading loop error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Quote or balance lookup failed (network, auth, unknown symbol)
    #[error("Gateway: {0}")]
    Gateway(String),

    /// Order rejected or not acknowledged by the broker
    #[error("Order: {0}")]
    Order(String),

    /// Journal or store persistence failed
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    /// Position book disagrees with what the engine expected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration errors
    #[error("Config: {0}")]
    Config(String),

    /// Serialization
    #[error("Serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Per-symbol failures the loop logs and moves past.
    ///
    /// Everything else stops the loop: a fill that could not be journaled
    /// must never be silently forgotten.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Gateway(_) | Error::Order(_) | Error::InvariantViolation(_)
        )
    }
}
