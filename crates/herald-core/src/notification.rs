//! Notification payload, per-device outcome, and the transport seam.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::device::{Environment, PushToken};

/// Delivery priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Deliver immediately (`apns-priority: 10`).
    #[default]
    High,
    /// Deliver at a time that conserves power (`apns-priority: 5`).
    Normal,
}

/// One logical notification, fanned out to every device of a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    /// Alert title.
    pub title: String,
    /// Alert body.
    pub body: String,
    /// Sound name (e.g. `"default"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// App icon badge count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    /// Grouping id for notification threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Notification category (actionable notification type).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Delivery priority.
    #[serde(default)]
    pub priority: Priority,
    /// Custom key/value pairs placed at the payload root.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

impl PushNotification {
    /// Alert with a title, body, and the default sound.
    pub fn alert(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            sound: Some("default".to_string()),
            badge: None,
            thread_id: None,
            category: None,
            priority: Priority::High,
            data: HashMap::new(),
        }
    }
}

/// Where a single delivery attempt goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Device token.
    pub token: PushToken,
    /// Gateway network the token belongs to.
    pub environment: Environment,
    /// App identifier override; the transport falls back to its configured topic.
    pub topic: Option<String>,
}

/// Classified result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DeliveryOutcome {
    /// Gateway accepted the notification.
    Delivered,
    /// Transient or ambiguous failure; the registration is kept.
    SoftFailure {
        /// HTTP status, absent for timeouts and connection errors.
        status_code: Option<u16>,
        /// Gateway reason or transport error description.
        reason: String,
    },
    /// Gateway confirmed the token will never work again.
    HardFailure {
        /// HTTP status returned by the gateway.
        status_code: u16,
        /// Gateway reason (e.g. `Unregistered`).
        reason: String,
    },
}

impl DeliveryOutcome {
    /// Whether the gateway accepted the notification.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether the registration should be pruned.
    #[must_use]
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, Self::HardFailure { .. })
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("delivered"),
            Self::SoftFailure {
                status_code: Some(code),
                reason,
            } => write!(f, "soft failure ({code}): {reason}"),
            Self::SoftFailure {
                status_code: None,
                reason,
            } => write!(f, "soft failure: {reason}"),
            Self::HardFailure {
                status_code,
                reason,
            } => write!(f, "hard failure ({status_code}): {reason}"),
        }
    }
}

/// Performs exactly one delivery attempt to one device.
///
/// Implementations never retry and never return an error: every failure mode
/// is folded into a [`DeliveryOutcome`].
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `notification` to `target`.
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        notification: &PushNotification,
    ) -> DeliveryOutcome;
}
