//! Error types for coordination and reconciliation.

use thiserror::Error;

/// Errors produced by the sync core and its collaborators.
///
/// Lock contention is deliberately absent: losing a lock race is a normal
/// outcome reported through [`crate::core::Acquisition`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The caller-supplied channel id does not match the stored one.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The unit or its event no longer exists.
    #[error("not found: {0}")]
    NotFound(String),
    /// Lock store I/O failure.
    #[error("lock store error: {0}")]
    LockStore(String),
    /// Persistent store I/O failure.
    #[error("datastore error: {0}")]
    Datastore(String),
    /// Calendar provider API failure.
    #[error("calendar provider error: {0}")]
    Provider(String),
    /// The policy evaluator callback failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(anyhow::Error),
    /// Invalid configuration.
    #[error("config invalid: {0}")]
    Config(String),
    /// Runtime failure (task dropped, join error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the error means the unit vanished and can be treated as resolved.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether a drain pass must stop instead of moving on to the next unit.
    ///
    /// Everything except a vanished unit or a failed policy evaluation is
    /// systemic (provider outage, store I/O) and would fail the next unit too.
    pub const fn trips_circuit_breaker(&self) -> bool {
        !matches!(
            self,
            Self::NotFound(_) | Self::Evaluation(_) | Self::Unauthorized(_)
        )
    }
}

/// Result type for externally owned callbacks (policy evaluation).
pub type AppResult<T> = Result<T, anyhow::Error>;
