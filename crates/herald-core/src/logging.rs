//! Tracing subscriber setup and log redaction helpers.

use tracing_subscriber::EnvFilter;

/// Characters of a push token that may appear in logs.
pub const TOKEN_LOG_PREFIX: usize = 8;

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Initialize the global subscriber with newline-delimited JSON output.
pub fn init_json_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .try_init();
}

/// Leading slice of a token that is safe to log.
#[must_use]
pub fn redact_token(token: &str) -> &str {
    let mut end = TOKEN_LOG_PREFIX.min(token.len());
    while end > 0 && !token.is_char_boundary(end) {
        end -= 1;
    }
    &token[..end]
}
