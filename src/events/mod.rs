//! Lifecycle events: types and the per-group broadcaster.
//!
//! ## Contents
//! - [`EventKind`], [`TaskEvent`], [`EventContent`] event classification and payload
//! - [`SubscriberGroup`] fan-out destination (typically one per end user)
//! - [`Broadcast`] injected publish capability used by the runner
//! - [`GroupBus`] in-process implementation over `tokio::sync::broadcast`, with
//!   [`Subscription`] receivers
//!
//! ## Quick reference
//! - **Publisher**: the runner's dispatcher (started, terminal, and bad-request events).
//! - **Consumers**: live [`Subscription`]s (websocket sessions), the event cache,
//!   and the process-wide observers (`SubscriberSet`).

mod bus;
mod event;

pub use bus::{Broadcast, GroupBus, Subscription};
pub use event::{EventContent, EventKind, SubscriberGroup, TaskEvent};
