//! # herald-dispatch
//!
//! Fan-out of one notification to every registered device of a user, plus
//! the outbox that records an event before notifying its recipient.
//!
//! - [`Dispatcher`]: concurrent delivery, pruning of dead registrations, and a
//!   [`DispatchSummary`] tally
//! - [`Outbox`]: persist-then-notify for user-to-user events

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod errors;
pub mod outbox;

pub use dispatcher::{DispatchSummary, Dispatcher, NotifyOptions};
pub use errors::{DispatchError, Result};
pub use outbox::{Outbox, OutboxReceipt};

#[cfg(test)]
pub(crate) mod testing;
