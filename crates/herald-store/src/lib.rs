//! # herald-store
//!
//! `SQLite` persistence for the Herald push subsystem.
//!
//! - **Registry**: [`DeviceRegistry`] maps users to their current push
//!   registrations, one per `(user, platform, environment)`
//! - **Bootstrap**: [`bootstrap::run_bootstrap`] migrates the schema and repairs
//!   layouts written by older versions
//! - **Outbox**: [`EventLog`] appends and lists notification events
//! - **Plumbing**: `r2d2` pool with WAL, embedded migrations, and stateless
//!   repositories over a borrowed connection

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod connection;
pub mod errors;
pub mod event_log;
pub mod migrations;
pub mod models;
pub mod registry;
pub mod repositories;

pub use bootstrap::{BootstrapReport, CANONICAL_INDEX};
pub use connection::{ConnectionConfig, ConnectionPool};
pub use errors::RegistryError;
pub use event_log::EventLog;
pub use models::{DeviceRegistration, NotificationEvent};
pub use registry::{DeviceRegistry, RegisterDevice, Registered};
