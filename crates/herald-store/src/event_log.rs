//! Async facade over the notification outbox table.

use herald_core::UserId;

use crate::connection::{ConnectionPool, with_connection};
use crate::errors::Result;
use crate::models::NotificationEvent;
use crate::repositories::NotificationEventRepo;

/// Append-only log of notification events.
///
/// Shares the registry's pool and expects the schema to be migrated, which
/// [`crate::DeviceRegistry::bootstrap`] does at startup.
#[derive(Clone)]
pub struct EventLog {
    pool: ConnectionPool,
}

impl EventLog {
    /// Wrap a connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Persist a new event.
    pub async fn append(
        &self,
        from_user_id: &UserId,
        to_user_id: &UserId,
        message: &str,
    ) -> Result<NotificationEvent> {
        let (from, to, message) = (from_user_id.clone(), to_user_id.clone(), message.to_string());
        with_connection(&self.pool, move |conn| {
            NotificationEventRepo::insert(conn, &from, &to, &message)
        })
        .await
    }

    /// Events addressed to `to_user_id`, newest first.
    pub async fn history(&self, to_user_id: &UserId, limit: u32) -> Result<Vec<NotificationEvent>> {
        let to = to_user_id.clone();
        with_connection(&self.pool, move |conn| {
            NotificationEventRepo::list_for_recipient(conn, &to, limit)
        })
        .await
    }
}
