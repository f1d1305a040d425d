//! # Process-wide event observers.
//!
//! Every [`TaskEvent`](crate::events::TaskEvent) the runner publishes, whatever its
//! subscriber group, is also fanned out to the observers registered with
//! [`RunnerBuilder::with_subscribers`](crate::RunnerBuilder::with_subscribers).
//!
//! ```text
//! Dispatcher ── emit(ev) ──► SubscriberSet ──► [queue] ─► worker ─► LogWriter::on_event
//!                                        ├──► [queue] ─► worker ─► Audit::on_event
//!                                        └──► [queue] ─► worker ─► ...
//! ```
//!
//! ## Implementing an observer
//! ```no_run
//! use channel_tasks::{EventKind, Subscribe, TaskEvent};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &TaskEvent) {
//!         if event.kind == EventKind::TaskError {
//!             // increment failure counter
//!         }
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscribe::Subscribe;
