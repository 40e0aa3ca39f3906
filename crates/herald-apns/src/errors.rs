//! APNs error types.

use thiserror::Error;

/// Failure to load signing material or mint an assertion.
///
/// Raised at startup by [`crate::CredentialProvider::from_config`]; during
/// delivery the transport folds it into a soft failure.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A required setting is empty or absent.
    #[error("APNs credential not configured: {field}")]
    Missing {
        /// Setting that was missing.
        field: &'static str,
    },

    /// Key file could not be read.
    #[error("failed to read APNs key at {path}: {reason}")]
    KeyRead {
        /// Key file path.
        path: String,
        /// Error description.
        reason: String,
    },

    /// Key material is not a PEM-encoded EC private key.
    #[error("failed to parse APNs key: {reason}")]
    KeyParse {
        /// Error description.
        reason: String,
    },

    /// Signing the assertion failed.
    #[error("failed to sign APNs assertion: {reason}")]
    Sign {
        /// Error description.
        reason: String,
    },
}

/// Failure to construct the push transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Error description.
        reason: String,
    },

    /// No default topic: `bundle_id` is empty.
    #[error("APNs bundle id not configured")]
    MissingTopic,
}
