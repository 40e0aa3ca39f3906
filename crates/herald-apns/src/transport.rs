//! APNs HTTP/2 transport.
//!
//! One `POST /3/device/{token}` per call, no retries. Every failure mode is
//! classified into a [`DeliveryOutcome`]; nothing here returns an error once
//! the transport is built.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_core::{
    DeliveryOutcome, DeliveryTarget, Environment, Priority, PushNotification, PushTransport,
};
use herald_settings::ApnsSettings;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::credential::CredentialProvider;
use crate::errors::TransportError;

/// Push transport backed by the APNs provider API.
pub struct ApnsTransport {
    credentials: Arc<CredentialProvider>,
    client: reqwest::Client,
    default_topic: String,
    production_url: String,
    sandbox_url: String,
}

impl std::fmt::Debug for ApnsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApnsTransport")
            .field("default_topic", &self.default_topic)
            .field("production_url", &self.production_url)
            .field("sandbox_url", &self.sandbox_url)
            .finish_non_exhaustive()
    }
}

impl ApnsTransport {
    /// Build the HTTP client from settings.
    pub fn new(
        settings: &ApnsSettings,
        credentials: Arc<CredentialProvider>,
    ) -> Result<Self, TransportError> {
        Self::build(
            settings,
            credentials,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn build(
        settings: &ApnsSettings,
        credentials: Arc<CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        // Registrations without a topic fall back to it; an empty header is
        // rejected by the gateway on every send.
        let default_topic = settings.bundle_id.trim();
        if default_topic.is_empty() {
            return Err(TransportError::MissingTopic);
        }

        let mut builder = reqwest::Client::builder().timeout(timeout);
        // APNs only speaks HTTP/2; ALPN alone leaves reqwest on HTTP/1.1.
        if settings.http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        let client = builder.build().map_err(|e| TransportError::ClientBuild {
            reason: e.to_string(),
        })?;

        Ok(Self {
            credentials,
            client,
            default_topic: default_topic.to_string(),
            production_url: settings.production_url.trim_end_matches('/').to_string(),
            sandbox_url: settings.sandbox_url.trim_end_matches('/').to_string(),
        })
    }

    /// Gateway base URL for an environment.
    pub fn endpoint(&self, environment: Environment) -> &str {
        match environment {
            Environment::Production => &self.production_url,
            Environment::Sandbox => &self.sandbox_url,
        }
    }
}

/// Build the APNs JSON payload. Custom data sits next to `aps`.
pub fn build_payload(notification: &PushNotification) -> serde_json::Value {
    let mut aps = serde_json::json!({
        "alert": {
            "title": notification.title,
            "body": notification.body,
        },
    });

    if let Some(ref sound) = notification.sound {
        aps["sound"] = serde_json::json!(sound);
    }
    if let Some(badge) = notification.badge {
        aps["badge"] = serde_json::json!(badge);
    }
    if let Some(ref thread_id) = notification.thread_id {
        aps["thread-id"] = serde_json::json!(thread_id);
    }
    if let Some(ref category) = notification.category {
        aps["category"] = serde_json::json!(category);
    }

    let mut payload = serde_json::json!({ "aps": aps });
    if let Some(obj) = payload.as_object_mut() {
        for (key, value) in &notification.data {
            if key != "aps" {
                let _ = obj.insert(key.clone(), serde_json::json!(value));
            }
        }
    }
    payload
}

#[async_trait]
impl PushTransport for ApnsTransport {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        notification: &PushNotification,
    ) -> DeliveryOutcome {
        let token_prefix = target.token.prefix();

        let assertion = match self.credentials.assertion() {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, token = token_prefix, "APNs assertion unavailable");
                return DeliveryOutcome::SoftFailure {
                    status_code: None,
                    reason: e.to_string(),
                };
            }
        };

        let url = format!(
            "{}/3/device/{}",
            self.endpoint(target.environment),
            target.token.as_str()
        );
        let topic = target.topic.as_deref().unwrap_or(&self.default_topic);
        let priority = match notification.priority {
            Priority::High => "10",
            Priority::Normal => "5",
        };

        let result = self
            .client
            .post(&url)
            .header("authorization", format!("bearer {}", assertion.token()))
            .header("apns-topic", topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", priority)
            .header("apns-expiration", "0")
            .json(&build_payload(notification))
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let apns_id = response
                    .headers()
                    .get("apns-id")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let body = response.text().await.unwrap_or_default();
                let outcome = classify(status, &body);

                if outcome.is_delivered() {
                    debug!(
                        status,
                        token = token_prefix,
                        environment = %target.environment,
                        apns_id = ?apns_id,
                        "APNs accepted notification"
                    );
                } else {
                    warn!(
                        status,
                        token = token_prefix,
                        environment = %target.environment,
                        %outcome,
                        "APNs rejected notification"
                    );
                }
                outcome
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                warn!(
                    error = %e,
                    token = token_prefix,
                    environment = %target.environment,
                    "APNs request failed"
                );
                DeliveryOutcome::SoftFailure {
                    status_code: None,
                    reason,
                }
            }
        }
    }
}
