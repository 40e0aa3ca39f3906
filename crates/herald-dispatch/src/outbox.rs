//! Persist-then-notify for user-to-user events ("bumps").
//!
//! The event row is written before any delivery is attempted and never
//! updated afterwards, so a recipient with no reachable device still finds
//! it in their history.

use std::collections::HashMap;
use std::sync::Arc;

use herald_core::{RecordId, UserId};
use herald_settings::DispatchSettings;
use herald_store::{EventLog, NotificationEvent};
use serde::Serialize;
use tracing::info;

use crate::dispatcher::{DispatchSummary, Dispatcher, NotifyOptions};
use crate::errors::Result;

/// What [`Outbox::record_and_notify`] did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxReceipt {
    /// Id of the persisted event.
    pub record_id: RecordId,
    /// Delivery tally for the recipient's devices.
    #[serde(flatten)]
    pub dispatch: DispatchSummary,
}

/// Records notification events and fans them out to the recipient.
pub struct Outbox {
    events: EventLog,
    dispatcher: Arc<Dispatcher>,
    settings: DispatchSettings,
}

impl Outbox {
    /// Create an outbox with the given presentation settings.
    pub fn new(events: EventLog, dispatcher: Arc<Dispatcher>, settings: DispatchSettings) -> Self {
        Self {
            events,
            dispatcher,
            settings,
        }
    }

    /// Persist an event from `from_user_id` to `to_user_id`, then notify the
    /// recipient. An empty message uses the configured default.
    pub async fn record_and_notify(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        message: Option<&str>,
    ) -> Result<OutboxReceipt> {
        let from = UserId::parse(from_user_id)?;
        let to = UserId::parse(to_user_id)?;
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.settings.default_message);

        let event = self.events.append(&from, &to, message).await?;
        info!(record_id = %event.id, from = %from, to = %to, "notification event recorded");

        let options = NotifyOptions {
            thread_id: Some(self.settings.thread_id.clone()),
            category: Some(self.settings.category.clone()),
            data: HashMap::from([
                ("type".to_string(), "bump".to_string()),
                ("from".to_string(), from.to_string()),
                ("bumpId".to_string(), event.id.to_string()),
            ]),
            ..NotifyOptions::default()
        };
        let dispatch = self
            .dispatcher
            .send_to_user(to.as_str(), &self.settings.alert_title, &event.message, options)
            .await?;

        Ok(OutboxReceipt {
            record_id: event.id,
            dispatch,
        })
    }

    /// Events addressed to `to_user_id`, newest first.
    pub async fn history(&self, to_user_id: &str, limit: u32) -> Result<Vec<NotificationEvent>> {
        let to = UserId::parse(to_user_id)?;
        Ok(self.events.history(&to, limit).await?)
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::errors::DispatchError;
    use crate::testing::{ScriptedTransport, gone, register, registry, token};
    use assert_matches::assert_matches;
    use herald_core::{PushTransport, ValidationError};
    use herald_store::DeviceRegistry;

    async fn outbox(transport: &Arc<ScriptedTransport>) -> (Arc<DeviceRegistry>, Outbox) {
        let registry = registry();
        let _ = registry.bootstrap().await.unwrap();
        let dyn_transport: Arc<dyn PushTransport> = transport.clone();
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), dyn_transport));
        let events = EventLog::new(registry.pool().clone());
        (registry, Outbox::new(events, dispatcher, DispatchSettings::default()))
    }

    #[tokio::test]
    async fn records_then_notifies_with_bump_presentation() {
        let transport = Arc::new(ScriptedTransport::default());
        let (registry, outbox) = outbox(&transport).await;
        register(&registry, "bob", &token('a'), "production").await;

        let receipt = outbox.record_and_notify("alice", "bob", Some("hey")).await.unwrap();
        assert_eq!(receipt.dispatch.attempted, 1);
        assert_eq!(receipt.dispatch.delivered, 1);

        let calls = transport.calls.lock();
        let n = &calls[0].1;
        assert_eq!(n.title, "Breathr");
        assert_eq!(n.body, "hey");
        assert_eq!(n.thread_id.as_deref(), Some("bump"));
        assert_eq!(n.category.as_deref(), Some("BUMP"));
        assert_eq!(n.data.get("from").map(String::as_str), Some("alice"));
        assert_eq!(
            n.data.get("bumpId").map(String::as_str),
            Some(receipt.record_id.as_str())
        );
    }

    #[tokio::test]
    async fn empty_message_uses_default() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_registry, outbox) = outbox(&transport).await;
        outbox.record_and_notify("alice", "bob", Some("   ")).await.unwrap();
        outbox.record_and_notify("alice", "bob", None).await.unwrap();

        let history = outbox.history("bob", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.message == "🔔 Bump!"));
    }

    #[tokio::test]
    async fn event_persists_when_every_delivery_fails() {
        let transport = Arc::new(ScriptedTransport::default().with(&token('a'), gone()));
        let (registry, outbox) = outbox(&transport).await;
        register(&registry, "bob", &token('a'), "production").await;

        let receipt = outbox.record_and_notify("alice", "bob", Some("hi")).await.unwrap();
        assert_eq!(receipt.dispatch.hard_failed, 1);
        assert_eq!(receipt.dispatch.pruned, 1);

        let history = outbox.history("bob", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, receipt.record_id);
        assert_eq!(history[0].message, "hi");
    }

    #[tokio::test]
    async fn recipient_without_devices_still_gets_record() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_registry, outbox) = outbox(&transport).await;
        let receipt = outbox.record_and_notify("alice", "carol", None).await.unwrap();
        assert_eq!(receipt.dispatch, DispatchSummary::default());
        assert_eq!(transport.call_count(), 0);
        assert_eq!(outbox.history("carol", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_ids_write_nothing() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_registry, outbox) = outbox(&transport).await;
        let err = outbox
            .record_and_notify("alice", "not valid", None)
            .await
            .unwrap_err();
        assert_matches!(err, DispatchError::Validation(ValidationError::InvalidUserId(_)));
        assert!(outbox.history("alice", 5).await.unwrap().is_empty());
    }
}
