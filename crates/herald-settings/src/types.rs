//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file only needs the keys it changes.

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeraldSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// `SQLite` storage.
    pub database: DatabaseSettings,
    /// Push gateway credentials and transport.
    pub apns: ApnsSettings,
    /// Alert presentation for outbox-triggered notifications.
    pub dispatch: DispatchSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// `SQLite` storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file. Relative paths resolve against `~/.herald`.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "herald.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 30_000,
        }
    }
}

/// Push gateway settings.
///
/// Key material comes from `keyPem` (inline PEM) or `keyPath` (file);
/// inline material wins when both are set.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApnsSettings {
    /// Signing key id (10-char alphanumeric).
    pub key_id: String,
    /// Developer team id, used as the assertion issuer.
    pub team_id: String,
    /// Default topic (app bundle id).
    pub bundle_id: String,
    /// Inline PEM private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pem: Option<String>,
    /// Path to a `.p8` private key file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Production gateway base URL.
    pub production_url: String,
    /// Sandbox gateway base URL.
    pub sandbox_url: String,
    /// Speak HTTP/2 without ALPN negotiation.
    pub http2_prior_knowledge: bool,
}

impl Default for ApnsSettings {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            team_id: String::new(),
            bundle_id: String::new(),
            key_pem: None,
            key_path: None,
            timeout_secs: 8,
            production_url: "https://api.push.apple.com".to_string(),
            sandbox_url: "https://api.sandbox.push.apple.com".to_string(),
            http2_prior_knowledge: true,
        }
    }
}

/// Presentation of outbox-triggered ("bump") notifications.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchSettings {
    /// Alert title shown on the device.
    pub alert_title: String,
    /// Message used when the caller sends an empty one.
    pub default_message: String,
    /// Thread id grouping these notifications.
    pub thread_id: String,
    /// Notification category.
    pub category: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            alert_title: "Breathr".to_string(),
            default_message: "🔔 Bump!".to_string(),
            thread_id: "bump".to_string(),
            category: "BUMP".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
