//! # herald-apns
//!
//! Apple Push Notification service client.
//!
//! - **Credentials**: [`CredentialProvider`] loads the team's `.p8` key and
//!   keeps one ES256 provider token, re-minted every 50 minutes
//! - **Transport**: [`ApnsTransport`] implements [`herald_core::PushTransport`]
//!   over HTTP/2
//! - **Classification**: [`classify`] maps a gateway response to a
//!   [`herald_core::DeliveryOutcome`]

#![deny(unsafe_code)]

pub mod classify;
pub mod credential;
pub mod errors;
pub mod transport;

pub use classify::classify;
pub use credential::{ASSERTION_MAX_AGE, CredentialProvider, SignedAssertion};
pub use errors::{CredentialError, TransportError};
pub use transport::{ApnsTransport, build_payload};
