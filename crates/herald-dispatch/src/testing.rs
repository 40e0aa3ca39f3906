//! Scripted transport for dispatcher and outbox tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{DeliveryOutcome, DeliveryTarget, PushNotification, PushTransport};
use herald_store::connection::new_in_memory;
use herald_store::{DeviceRegistry, RegisterDevice};
use parking_lot::Mutex;

/// Answers each token with a preset outcome (default: delivered) and
/// records every call.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    outcomes: HashMap<String, DeliveryOutcome>,
    pub(crate) calls: Mutex<Vec<(DeliveryTarget, PushNotification)>>,
}

impl ScriptedTransport {
    pub(crate) fn with(mut self, token: &str, outcome: DeliveryOutcome) -> Self {
        let _ = self.outcomes.insert(token.to_string(), outcome);
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        notification: &PushNotification,
    ) -> DeliveryOutcome {
        self.calls
            .lock()
            .push((target.clone(), notification.clone()));
        self.outcomes
            .get(target.token.as_str())
            .cloned()
            .unwrap_or(DeliveryOutcome::Delivered)
    }
}

pub(crate) fn token(c: char) -> String {
    c.to_string().repeat(64)
}

pub(crate) fn gone() -> DeliveryOutcome {
    DeliveryOutcome::HardFailure {
        status_code: 410,
        reason: "Unregistered".into(),
    }
}

pub(crate) fn throttled() -> DeliveryOutcome {
    DeliveryOutcome::SoftFailure {
        status_code: Some(429),
        reason: "TooManyRequests".into(),
    }
}

pub(crate) fn registry() -> Arc<DeviceRegistry> {
    Arc::new(DeviceRegistry::new(new_in_memory().unwrap()))
}

/// Register `token` for `user` under `environment`.
pub(crate) async fn register(registry: &DeviceRegistry, user: &str, token: &str, environment: &str) {
    let _ = registry
        .register(
            RegisterDevice {
                user_id: user.into(),
                token: token.into(),
                environment: Some(environment.into()),
                ..RegisterDevice::default()
            },
            None,
        )
        .await
        .unwrap();
}
