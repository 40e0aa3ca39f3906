//! Persisted record types.

use std::str::FromStr;

use herald_core::{DeliveryTarget, Environment, Platform, PushToken, RecordId, UserId};
use serde::Serialize;

/// Current push registration for one (user, platform, environment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Registration id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Push channel.
    pub platform: Platform,
    /// Current device token.
    #[serde(skip)]
    pub push_token: PushToken,
    /// Gateway network the token belongs to.
    pub environment: Environment,
    /// App identifier override.
    pub topic: Option<String>,
    /// First registration timestamp (RFC 3339).
    pub created_at: String,
    /// Last registration timestamp (RFC 3339).
    pub updated_at: String,
}

impl DeviceRegistration {
    /// Address for a delivery attempt.
    #[must_use]
    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget {
            token: self.push_token.clone(),
            environment: self.environment,
            topic: self.topic.clone(),
        }
    }
}

/// Validated input for an upsert.
#[derive(Clone, Debug)]
pub struct NewRegistration {
    /// Owning user.
    pub user_id: UserId,
    /// Push channel.
    pub platform: Platform,
    /// Device token.
    pub push_token: PushToken,
    /// Resolved environment.
    pub environment: Environment,
    /// App identifier override.
    pub topic: Option<String>,
}

/// Result of an upsert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// Registration id.
    pub id: RecordId,
    /// Whether a new row was created (vs. updated in place).
    pub created: bool,
    /// Rows of other owners that held the same token and were removed.
    pub reassigned: usize,
}

/// Write-once record of a notification-worthy event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Event id.
    pub id: RecordId,
    /// Sender.
    pub from_user_id: UserId,
    /// Recipient.
    pub to_user_id: UserId,
    /// Message text.
    pub message: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// Read column `idx` as text and parse it into a domain type.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Current time in the fixed-width RFC 3339 form used for every timestamp
/// column, so lexical and chronological order agree.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
