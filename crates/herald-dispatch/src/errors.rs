//! Dispatch error types.

use herald_core::ValidationError;
use herald_store::RegistryError;
use thiserror::Error;

/// Errors surfaced by [`crate::Dispatcher`] and [`crate::Outbox`].
///
/// Per-device delivery failures never appear here; they are tallied in
/// [`crate::DispatchSummary`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed user id.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Outbox persistence failed.
    #[error("outbox write failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Convenience type alias for dispatch results.
pub type Result<T> = std::result::Result<T, DispatchError>;
