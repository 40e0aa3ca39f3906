//! Notification event repository, the write side of the outbox.

use herald_core::{RecordId, UserId};
use rusqlite::{Connection, params};

use crate::errors::Result;
use crate::models::{NotificationEvent, now_timestamp, parse_column};

/// Stateless, append-only repository.
pub struct NotificationEventRepo;

impl NotificationEventRepo {
    /// Persist a new event and return it.
    pub fn insert(
        conn: &Connection,
        from_user_id: &UserId,
        to_user_id: &UserId,
        message: &str,
    ) -> Result<NotificationEvent> {
        let event = NotificationEvent {
            id: RecordId::new(),
            from_user_id: from_user_id.clone(),
            to_user_id: to_user_id.clone(),
            message: message.to_string(),
            created_at: now_timestamp(),
        };
        let _ = conn.execute(
            "INSERT INTO notification_events (id, from_user_id, to_user_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.as_str(),
                event.from_user_id.as_str(),
                event.to_user_id.as_str(),
                event.message,
                event.created_at
            ],
        )?;
        Ok(event)
    }

    /// Events addressed to `to_user_id`, newest first.
    pub fn list_for_recipient(
        conn: &Connection,
        to_user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<NotificationEvent>> {
        let mut stmt = conn.prepare(
            "SELECT id, from_user_id, to_user_id, message, created_at
             FROM notification_events
             WHERE to_user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![to_user_id.as_str(), limit], |row| {
                Ok(NotificationEvent {
                    id: RecordId::from_string(row.get(0)?),
                    from_user_id: parse_column(row, 1)?,
                    to_user_id: parse_column(row, 2)?,
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
