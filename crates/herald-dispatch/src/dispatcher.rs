//! Fan-out of one notification to every device of a user.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use herald_core::{DeliveryOutcome, Priority, PushNotification, PushTransport, UserId};
use herald_store::{DeviceRegistration, DeviceRegistry};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// Optional presentation fields for [`Dispatcher::send_to_user`].
#[derive(Clone, Debug, Default)]
pub struct NotifyOptions {
    /// App icon badge count.
    pub badge: Option<u32>,
    /// Sound name; `"default"` when unset.
    pub sound: Option<String>,
    /// Notification grouping id.
    pub thread_id: Option<String>,
    /// Actionable notification category.
    pub category: Option<String>,
    /// Delivery priority.
    pub priority: Priority,
    /// Custom key/value pairs.
    pub data: HashMap<String, String>,
}

/// Tally of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    /// Registrations a delivery was attempted for.
    pub attempted: usize,
    /// Deliveries the gateway accepted.
    pub delivered: usize,
    /// Transient failures; registrations kept.
    pub soft_failed: usize,
    /// Permanent failures.
    pub hard_failed: usize,
    /// Registrations actually removed after a hard failure.
    pub pruned: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        self.attempted += 1;
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::SoftFailure { .. } => self.soft_failed += 1,
            DeliveryOutcome::HardFailure { .. } => self.hard_failed += 1,
        }
    }
}

/// Sends a notification to every current registration of a user.
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    transport: Arc<dyn PushTransport>,
}

impl Dispatcher {
    /// Create a dispatcher over a registry and a transport.
    pub fn new(registry: Arc<DeviceRegistry>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Deliver to all of `user_id`'s devices and prune dead registrations.
    ///
    /// Only a malformed user id is an error. A registry read failure is
    /// logged and reported as an empty tally.
    pub async fn send_to_user(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        options: NotifyOptions,
    ) -> Result<DispatchSummary> {
        let user_id = UserId::parse(user_id)?;

        let registrations = match self.registry.lookup_all(&user_id).await {
            Ok(r) => r,
            Err(e) => {
                warn!(%user_id, error = %e, "device lookup failed, nothing sent");
                return Ok(DispatchSummary::default());
            }
        };
        if registrations.is_empty() {
            debug!(%user_id, "no registered devices");
            return Ok(DispatchSummary::default());
        }

        let notification = build_notification(title, body, options);
        let outcomes = self.deliver_all(&registrations, &notification).await;

        let mut summary = DispatchSummary::default();
        for (registration, outcome) in registrations.iter().zip(&outcomes) {
            summary.record(outcome);
            if outcome.is_hard_failure() && self.prune(registration, outcome).await {
                summary.pruned += 1;
            }
        }

        info!(
            %user_id,
            attempted = summary.attempted,
            delivered = summary.delivered,
            soft_failed = summary.soft_failed,
            hard_failed = summary.hard_failed,
            pruned = summary.pruned,
            "dispatch complete"
        );
        Ok(summary)
    }

    async fn deliver_all(
        &self,
        registrations: &[DeviceRegistration],
        notification: &PushNotification,
    ) -> Vec<DeliveryOutcome> {
        let targets: Vec<_> = registrations.iter().map(DeviceRegistration::target).collect();
        let sends = targets
            .iter()
            .map(|target| self.transport.deliver(target, notification));
        join_all(sends).await
    }

    /// Only the token that failed is removed; a registration rotated to a new
    /// token while the delivery was in flight survives.
    async fn prune(&self, registration: &DeviceRegistration, outcome: &DeliveryOutcome) -> bool {
        let removed = self
            .registry
            .remove_if_token(&registration.id, &registration.push_token)
            .await;
        match removed {
            Ok(removed) => {
                if removed {
                    info!(
                        user_id = %registration.user_id,
                        environment = %registration.environment,
                        token = registration.push_token.prefix(),
                        %outcome,
                        "pruned dead registration"
                    );
                }
                removed
            }
            Err(e) => {
                warn!(
                    registration_id = %registration.id,
                    error = %e,
                    "failed to prune registration"
                );
                false
            }
        }
    }
}

fn build_notification(title: &str, body: &str, options: NotifyOptions) -> PushNotification {
    let mut notification = PushNotification::alert(title, body);
    if options.sound.is_some() {
        notification.sound = options.sound;
    }
    notification.badge = options.badge;
    notification.thread_id = options.thread_id;
    notification.category = options.category;
    notification.priority = options.priority;
    notification.data = options.data;
    notification
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::errors::DispatchError;
    use crate::testing::{ScriptedTransport, gone, register, registry, throttled, token};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use herald_core::{DeliveryTarget, Environment, Platform, ValidationError};

    /// Re-registers the user with a fresh token mid-delivery, then reports the
    /// old token as gone.
    struct RotatingTransport {
        registry: Arc<DeviceRegistry>,
    }

    #[async_trait]
    impl PushTransport for RotatingTransport {
        async fn deliver(&self, target: &DeliveryTarget, _: &PushNotification) -> DeliveryOutcome {
            register(&self.registry, "u1", &token('b'), "production").await;
            assert_eq!(target.token.as_str(), token('a'));
            gone()
        }
    }

    fn dispatcher(registry: &Arc<DeviceRegistry>, transport: &Arc<ScriptedTransport>) -> Dispatcher {
        let transport: Arc<dyn PushTransport> = transport.clone();
        Dispatcher::new(Arc::clone(registry), transport)
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn no_registrations_means_no_calls() {
        let registry = registry();
        let transport = Arc::new(ScriptedTransport::default());
        let summary = dispatcher(&registry, &transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_user_id_is_rejected() {
        let registry = registry();
        let transport = Arc::new(ScriptedTransport::default());
        let err = dispatcher(&registry, &transport)
            .send_to_user("bad id!", "T", "B", NotifyOptions::default())
            .await
            .unwrap_err();
        assert_matches!(err, DispatchError::Validation(ValidationError::InvalidUserId(_)));
    }

    #[tokio::test]
    async fn one_ok_one_gone() {
        let registry = registry();
        register(&registry, "u1", &token('a'), "production").await;
        register(&registry, "u1", &token('b'), "sandbox").await;
        let transport = Arc::new(ScriptedTransport::default().with(&token('b'), gone()));

        let summary = dispatcher(&registry, &transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(
            summary,
            DispatchSummary {
                attempted: 2,
                delivered: 1,
                soft_failed: 0,
                hard_failed: 1,
                pruned: 1,
            }
        );

        let left = registry.lookup(&uid("u1"), Platform::Ios).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].environment, Environment::Production);
    }

    #[tokio::test]
    async fn soft_failures_never_prune() {
        let registry = registry();
        register(&registry, "u1", &token('a'), "production").await;
        register(&registry, "u1", &token('b'), "sandbox").await;
        let transport = Arc::new(
            ScriptedTransport::default()
                .with(&token('a'), throttled())
                .with(
                    &token('b'),
                    DeliveryOutcome::SoftFailure {
                        status_code: None,
                        reason: "request timed out".into(),
                    },
                ),
        );

        let summary = dispatcher(&registry, &transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.soft_failed, 2);
        assert_eq!(summary.pruned, 0);
        assert_eq!(registry.lookup_all(&uid("u1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn every_hard_failure_is_pruned() {
        let registry = registry();
        register(&registry, "u1", &token('a'), "production").await;
        register(&registry, "u1", &token('b'), "sandbox").await;
        let transport = Arc::new(
            ScriptedTransport::default()
                .with(&token('a'), gone())
                .with(
                    &token('b'),
                    DeliveryOutcome::HardFailure {
                        status_code: 400,
                        reason: "BadDeviceToken".into(),
                    },
                ),
        );

        let summary = dispatcher(&registry, &transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.hard_failed, 2);
        assert_eq!(summary.pruned, 2);
        assert!(registry.lookup_all(&uid("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_rotated_during_delivery_is_not_pruned() {
        let registry = registry();
        register(&registry, "u1", &token('a'), "production").await;
        let transport: Arc<dyn PushTransport> = Arc::new(RotatingTransport {
            registry: Arc::clone(&registry),
        });

        let summary = Dispatcher::new(Arc::clone(&registry), transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.hard_failed, 1);
        assert_eq!(summary.pruned, 0);

        let left = registry.lookup(&uid("u1"), Platform::Ios).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].push_token.as_str(), token('b'));
    }

    #[tokio::test]
    async fn registry_read_failure_yields_empty_tally() {
        let registry = registry();
        registry.bootstrap().await.unwrap();
        registry
            .pool()
            .get()
            .unwrap()
            .execute_batch("DROP TABLE device_registrations;")
            .unwrap();
        let transport = Arc::new(ScriptedTransport::default());

        let summary = dispatcher(&registry, &transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn other_users_are_untouched() {
        let registry = registry();
        register(&registry, "u1", &token('a'), "production").await;
        register(&registry, "u2", &token('c'), "production").await;
        let transport = Arc::new(ScriptedTransport::default());

        let summary = dispatcher(&registry, &transport)
            .send_to_user("u1", "T", "B", NotifyOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.attempted, 1);
        let calls = transport.calls.lock();
        assert_eq!(calls[0].0.token.as_str(), token('a'));
    }

    #[tokio::test]
    async fn options_reach_the_transport() {
        let registry = registry();
        register(&registry, "u1", &token('a'), "production").await;
        let transport = Arc::new(ScriptedTransport::default());
        let options = NotifyOptions {
            badge: Some(2),
            thread_id: Some("bump".into()),
            category: Some("BUMP".into()),
            priority: Priority::Normal,
            data: HashMap::from([("from".to_string(), "u2".to_string())]),
            ..NotifyOptions::default()
        };

        dispatcher(&registry, &transport)
            .send_to_user("u1", "Breathr", "hi", options)
            .await
            .unwrap();

        let calls = transport.calls.lock();
        let (target, n) = &calls[0];
        assert_eq!(target.environment, Environment::Production);
        assert_eq!(n.title, "Breathr");
        assert_eq!(n.body, "hi");
        assert_eq!(n.sound.as_deref(), Some("default"));
        assert_eq!(n.badge, Some(2));
        assert_eq!(n.thread_id.as_deref(), Some("bump"));
        assert_eq!(n.category.as_deref(), Some("BUMP"));
        assert_eq!(n.priority, Priority::Normal);
        assert_eq!(n.data.get("from").map(String::as_str), Some("u2"));
    }
}
