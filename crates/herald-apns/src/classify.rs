//! Mapping from gateway responses to [`DeliveryOutcome`].

use herald_core::DeliveryOutcome;
use serde::Deserialize;

/// Gateway reasons that mean the token will never be deliverable again.
pub const PERMANENT_REASONS: [&str; 4] = [
    "BadDeviceToken",
    "Unregistered",
    "DeviceTokenNotForTopic",
    "ExpiredToken",
];

#[derive(Deserialize)]
struct ErrorBody {
    reason: Option<String>,
}

/// Extract the `reason` field from an APNs error body, if any.
pub fn error_reason(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.reason)
        .filter(|r| !r.is_empty())
}

/// Classify one gateway response.
///
/// 410 always means the token is gone. Other client errors are permanent only
/// when the reason names the token itself; throttling, auth, and payload
/// errors keep the registration.
pub fn classify(status: u16, body: &str) -> DeliveryOutcome {
    if (200..300).contains(&status) {
        return DeliveryOutcome::Delivered;
    }

    let reason = error_reason(body);
    let permanent = status == 410
        || ((400..500).contains(&status)
            && reason
                .as_deref()
                .is_some_and(|r| PERMANENT_REASONS.contains(&r)));
    let reason = reason.unwrap_or_else(|| format!("HTTP {status}"));

    if permanent {
        DeliveryOutcome::HardFailure {
            status_code: status,
            reason,
        }
    } else {
        DeliveryOutcome::SoftFailure {
            status_code: Some(status),
            reason,
        }
    }
}
