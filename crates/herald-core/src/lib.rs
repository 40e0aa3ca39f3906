//! # herald-core
//!
//! Shared vocabulary for the Herald push-notification subsystem.
//!
//! - **IDs**: [`UserId`] (validated caller-supplied id) and [`RecordId`] (UUID v7)
//! - **Devices**: [`Platform`], [`Environment`], [`PushToken`], and origin-based environment inference
//! - **Delivery**: [`PushNotification`], [`DeliveryTarget`], [`DeliveryOutcome`], and the
//!   [`PushTransport`] seam implemented by the APNs client
//! - **Errors**: [`ValidationError`] for input rejected before any I/O
//! - **Logging**: [`logging::init_subscriber`] and token redaction helpers

#![deny(unsafe_code)]

pub mod device;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod notification;

pub use device::{Environment, Platform, PushToken, infer_environment};
pub use errors::ValidationError;
pub use ids::{RecordId, UserId};
pub use notification::{
    DeliveryOutcome, DeliveryTarget, Priority, PushNotification, PushTransport,
};
