//! CRUD for the `device_registrations` table.
//!
//! Registrations are unique per `(user_id, platform, environment)`; the index
//! enforcing that is created by [`crate::bootstrap`]. A push token belongs to
//! one app install, so registering a token under a new owner removes the
//! previous owner's row in the same transaction.

use herald_core::{Platform, PushToken, RecordId, UserId};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use crate::errors::{RegistryError, Result};
use crate::models::{
    DeviceRegistration, NewRegistration, RegisterOutcome, now_timestamp, parse_column,
};

const COLUMNS: &str =
    "id, user_id, platform, push_token, environment, topic, created_at, updated_at";

/// Stateless repository; every method takes `&Connection`.
pub struct DeviceRegistrationRepo;

impl DeviceRegistrationRepo {
    /// Insert or overwrite the registration for the record's key.
    ///
    /// Runs in an immediate transaction: concurrent writers for the same key
    /// serialize on the database lock and the last one wins.
    pub fn upsert(conn: &Connection, reg: &NewRegistration) -> Result<RegisterOutcome> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let now = now_timestamp();

        let reassigned = tx.execute(
            "DELETE FROM device_registrations
             WHERE platform = ?1 AND push_token = ?2
               AND NOT (user_id = ?3 AND environment = ?4)",
            params![
                reg.platform.as_str(),
                reg.push_token.as_str(),
                reg.user_id.as_str(),
                reg.environment.as_str()
            ],
        )?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM device_registrations
                 WHERE user_id = ?1 AND platform = ?2 AND environment = ?3",
                params![
                    reg.user_id.as_str(),
                    reg.platform.as_str(),
                    reg.environment.as_str()
                ],
                |row| row.get(0),
            )
            .optional()?;

        let id: String = tx.query_row(
            "INSERT INTO device_registrations
                 (id, user_id, platform, push_token, environment, topic, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (user_id, platform, environment) DO UPDATE SET
                 push_token = excluded.push_token,
                 topic      = excluded.topic,
                 updated_at = excluded.updated_at
             RETURNING id",
            params![
                RecordId::new().as_str(),
                reg.user_id.as_str(),
                reg.platform.as_str(),
                reg.push_token.as_str(),
                reg.environment.as_str(),
                reg.topic,
                now
            ],
            |row| row.get(0),
        )?;

        tx.commit()?;

        Ok(RegisterOutcome {
            id: RecordId::from_string(id),
            created: existing.is_none(),
            reassigned,
        })
    }

    /// Fallback write used when [`Self::upsert`] hits a uniqueness violation:
    /// overwrite the row keyed by `(user_id, platform)` in place.
    ///
    /// Returns [`RegistryError::Conflict`] if no such row exists.
    pub fn overwrite_by_user_platform(
        conn: &Connection,
        reg: &NewRegistration,
    ) -> Result<RegisterOutcome> {
        let id: Option<String> = conn
            .query_row(
                "UPDATE device_registrations
                 SET push_token = ?1, environment = ?2, topic = ?3, updated_at = ?4
                 WHERE id = (
                     SELECT id FROM device_registrations
                     WHERE user_id = ?5 AND platform = ?6
                     ORDER BY updated_at DESC LIMIT 1
                 )
                 RETURNING id",
                params![
                    reg.push_token.as_str(),
                    reg.environment.as_str(),
                    reg.topic,
                    now_timestamp(),
                    reg.user_id.as_str(),
                    reg.platform.as_str()
                ],
                |row| row.get(0),
            )
            .optional()?;

        id.map(|id| RegisterOutcome {
            id: RecordId::from_string(id),
            created: false,
            reassigned: 0,
        })
        .ok_or_else(|| RegistryError::Conflict {
            user_id: reg.user_id.to_string(),
            message: "no row under the fallback key".to_string(),
        })
    }

    /// Registrations of one user on one platform, ordered by environment.
    pub fn find_by_user(
        conn: &Connection,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Vec<DeviceRegistration>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM device_registrations
             WHERE user_id = ?1 AND platform = ?2
             ORDER BY CASE environment WHEN 'sandbox' THEN 0 ELSE 1 END"
        ))?;
        let rows = stmt
            .query_map(params![user_id.as_str(), platform.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get a registration by id.
    pub fn get_by_id(conn: &Connection, id: &RecordId) -> Result<Option<DeviceRegistration>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM device_registrations WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Hard delete. Returns whether a row was removed.
    pub fn delete(conn: &Connection, id: &RecordId) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM device_registrations WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Delete `id` only while it still holds `token`. A row whose token was
    /// rotated in place since it was read is left alone.
    pub fn delete_if_token(conn: &Connection, id: &RecordId, token: &PushToken) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM device_registrations WHERE id = ?1 AND push_token = ?2",
            params![id.as_str(), token.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Total rows (diagnostics and tests).
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: u64 = conn.query_row("SELECT COUNT(*) FROM device_registrations", [], |row| {
            row.get(0)
        })?;
        Ok(n)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRegistration> {
        Ok(DeviceRegistration {
            id: RecordId::from_string(row.get(0)?),
            user_id: parse_column(row, 1)?,
            platform: parse_column(row, 2)?,
            push_token: parse_column(row, 3)?,
            environment: parse_column(row, 4)?,
            topic: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
