//! Validation errors raised before any storage or network I/O.

use thiserror::Error;

/// Input rejected synchronously at the edge of the subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Push token is not a hex string of the accepted length.
    #[error("invalid push token: {0}")]
    InvalidToken(String),

    /// User id is empty, too long, or contains unsupported characters.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// Environment value is not one of the recognized names.
    #[error("invalid environment: {0:?}")]
    InvalidEnvironment(String),

    /// Platform value is not a tracked push channel.
    #[error("unsupported platform: {0:?}")]
    InvalidPlatform(String),
}
