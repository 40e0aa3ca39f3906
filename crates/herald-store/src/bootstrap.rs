//! One-time schema repair for the device registry.
//!
//! Databases written by older layouts may hold free-text environments,
//! uniqueness indexes on the wrong key, or several rows per logical
//! registration. [`run_bootstrap`] brings any of them to the canonical shape:
//! exactly one unique index on `(user_id, platform, environment)` and at most
//! one row per key. Every step is idempotent, so a second run changes nothing.

use herald_core::Environment;
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::Result;
use crate::migrations::run_migrations;

/// Name of the unique index the registry upsert relies on.
pub const CANONICAL_INDEX: &str = "ux_device_registrations_user_platform_env";

const CANONICAL_COLUMNS: [&str; 3] = ["user_id", "platform", "environment"];

/// What a bootstrap run changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Schema migrations applied.
    pub migrations_applied: u32,
    /// Rows whose environment was rewritten to `sandbox` / `production`.
    pub environments_normalized: usize,
    /// Unique indexes removed because they enforced a different key.
    pub indexes_dropped: Vec<String>,
    /// Older duplicate rows removed.
    pub duplicates_removed: usize,
    /// Whether the canonical index had to be created.
    pub index_created: bool,
}

impl BootstrapReport {
    /// Whether the run found anything to repair beyond migrations.
    #[must_use]
    pub fn repaired(&self) -> bool {
        self.environments_normalized > 0
            || !self.indexes_dropped.is_empty()
            || self.duplicates_removed > 0
    }
}

/// Migrate and repair the registry schema.
///
/// Migrations run first in their own transactions; the repair steps then run
/// in a single immediate transaction so a concurrent process never observes
/// the table without a uniqueness index. Conflicting indexes go before any
/// row is rewritten, since normalizing `prod` and `production` can collapse two
/// rows onto one key until duplicates are removed.
pub fn run_bootstrap(conn: &Connection) -> Result<BootstrapReport> {
    let migrations_applied = run_migrations(conn)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let indexes_dropped = drop_conflicting_indexes(&tx)?;
    let environments_normalized = normalize_environments(&tx)?;
    let duplicates_removed = remove_duplicates(&tx)?;
    let index_created = create_canonical_index(&tx)?;
    tx.commit()?;

    let report = BootstrapReport {
        migrations_applied,
        environments_normalized,
        indexes_dropped,
        duplicates_removed,
        index_created,
    };
    if report.repaired() {
        info!(
            environments_normalized = report.environments_normalized,
            indexes_dropped = ?report.indexes_dropped,
            duplicates_removed = report.duplicates_removed,
            "device registry repaired"
        );
    }
    Ok(report)
}

fn normalize_environments(conn: &Connection) -> Result<usize> {
    let legacy: Vec<Option<String>> = conn
        .prepare(
            "SELECT DISTINCT environment FROM device_registrations
             WHERE environment IS NULL OR environment NOT IN ('sandbox', 'production')",
        )?
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    if legacy.is_empty() {
        return Ok(0);
    }

    // Recreated by `create_canonical_index` once duplicates are gone.
    conn.execute_batch(&format!("DROP INDEX IF EXISTS {CANONICAL_INDEX}"))?;

    let mut changed = 0;
    for raw in legacy {
        let env = Environment::from_legacy(raw.as_deref());
        changed += conn.execute(
            "UPDATE device_registrations SET environment = ?1 WHERE environment IS ?2",
            params![env.as_str(), raw],
        )?;
    }
    Ok(changed)
}

fn index_columns(conn: &Connection, index: &str) -> Result<Vec<String>> {
    let cols = conn
        .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?
        .query_map(params![index], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    Ok(cols)
}

fn drop_conflicting_indexes(conn: &Connection) -> Result<Vec<String>> {
    let unique: Vec<(String, String)> = conn
        .prepare(
            "SELECT name, origin FROM pragma_index_list('device_registrations')
             WHERE \"unique\" = 1",
        )?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    let mut dropped = Vec::new();
    for (name, origin) in unique {
        match origin.as_str() {
            "c" => {
                if name == CANONICAL_INDEX && index_columns(conn, &name)? == CANONICAL_COLUMNS {
                    continue;
                }
                conn.execute_batch(&format!(
                    "DROP INDEX IF EXISTS \"{}\"",
                    name.replace('"', "\"\"")
                ))?;
                dropped.push(name);
            }
            "u" => {
                // Inline table constraints cannot be dropped without a rebuild.
                warn!(
                    index = %name,
                    columns = ?index_columns(conn, &name)?,
                    "device_registrations has an inline UNIQUE constraint; registrations fall back to it on conflict"
                );
            }
            _ => {}
        }
    }
    Ok(dropped)
}

fn remove_duplicates(conn: &Connection) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM device_registrations WHERE id IN (
             SELECT id FROM (
                 SELECT id, ROW_NUMBER() OVER (
                     PARTITION BY user_id, platform, environment
                     ORDER BY updated_at DESC, id DESC
                 ) AS rn
                 FROM device_registrations
             ) WHERE rn > 1
         )",
        [],
    )?;
    Ok(removed)
}

fn create_canonical_index(conn: &Connection) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        params![CANONICAL_INDEX],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }
    conn.execute_batch(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {CANONICAL_INDEX}
             ON device_registrations (user_id, platform, environment)"
    ))?;
    Ok(true)
}
