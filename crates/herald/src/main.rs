//! # herald
//!
//! Herald server binary: wires settings, storage, the push gateway client,
//! and the HTTP surface together.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use herald_apns::{ApnsTransport, CredentialProvider};
use herald_dispatch::{Dispatcher, Outbox};
use herald_server::HeraldServer;
use herald_settings::HeraldSettings;
use herald_settings::loader::herald_home;
use herald_store::connection::new_file;
use herald_store::{ConnectionConfig, DeviceRegistry, EventLog};

/// Herald push notification server.
#[derive(Parser, Debug)]
#[command(name = "herald", about = "Herald push notification server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Settings file to load instead of `~/.herald/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut HeraldSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.db_path {
            settings.database.path = path.display().to_string();
        }
    }
}

/// Relative database paths live under `~/.herald`.
fn resolve_db_path(configured: &str, home: &Path) -> PathBuf {
    let path = PathBuf::from(configured);
    if path.is_absolute() {
        path
    } else {
        home.join(path)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => herald_settings::load_settings_from_path(path),
        None => herald_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    cli.apply(&mut settings);

    if settings.logging.json {
        herald_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        herald_core::logging::init_subscriber(&settings.logging.level);
    }

    // Storage
    let db_path = resolve_db_path(&settings.database.path, &herald_home());
    ensure_parent_dir(&db_path)?;
    let pool = new_file(
        &db_path.to_string_lossy(),
        &ConnectionConfig {
            pool_size: settings.database.pool_size,
            busy_timeout_ms: settings.database.busy_timeout_ms,
        },
    )
    .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let registry = Arc::new(DeviceRegistry::new(pool.clone()));
    let report = registry
        .bootstrap()
        .await
        .context("Failed to prepare device registry schema")?;
    tracing::info!(
        path = %db_path.display(),
        migrations = report.migrations_applied,
        repaired = report.repaired(),
        "device registry ready"
    );

    // Gateway
    let credentials = Arc::new(
        CredentialProvider::from_config(&settings.apns)
            .context("Push gateway credentials are incomplete or unreadable")?,
    );
    let transport = ApnsTransport::new(&settings.apns, Arc::clone(&credentials))
        .context("Invalid push gateway settings")?;
    tracing::info!(
        key_id = credentials.key_id(),
        bundle_id = %settings.apns.bundle_id,
        "push gateway credentials loaded"
    );

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), Arc::new(transport)));
    let outbox = Arc::new(Outbox::new(
        EventLog::new(pool),
        dispatcher,
        settings.dispatch.clone(),
    ));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind server on {addr}"))?;

    HeraldServer::new(registry, outbox)
        .serve(listener, shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_db_path_resolves_under_home() {
        let home = Path::new("/home/u/.herald");
        assert_eq!(
            resolve_db_path("herald.db", home),
            PathBuf::from("/home/u/.herald/herald.db")
        );
        assert_eq!(
            resolve_db_path("/var/lib/herald.db", home),
            PathBuf::from("/var/lib/herald.db")
        );
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from(["herald", "--port", "9000", "--db-path", "/tmp/h.db"]);
        let mut settings = HeraldSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.database.path, "/tmp/h.db");
    }

    #[test]
    fn ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("a").join("b").join("herald.db");
        ensure_parent_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
