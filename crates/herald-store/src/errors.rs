//! Error types for the storage layer.

use herald_core::ValidationError;
use thiserror::Error;

/// Errors that can occur while persisting or reading registrations and
/// outbox events.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Input rejected before any write was attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Upsert hit a uniqueness violation the fallback key could not resolve.
    #[error("registration conflict for user {user_id}: {message}")]
    Conflict {
        /// User whose registration could not be stored.
        user_id: String,
        /// Underlying constraint failure.
        message: String,
    },

    /// Blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Join(String),
}

impl RegistryError {
    /// Whether this is a `UNIQUE` / `PRIMARY KEY` constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, RegistryError>;
