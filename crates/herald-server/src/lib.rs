//! # herald-server
//!
//! HTTP surface for the Herald push subsystem:
//!
//! - `POST /devices/apns` registers a device token
//! - `POST /notify` records an event and notifies the recipient
//! - `GET /users/{user_id}/notifications` lists a recipient's events
//! - `GET /health` reports liveness

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod origin;
pub mod routes;
pub mod server;

pub use errors::ApiError;
pub use server::{AppState, HeraldServer};
