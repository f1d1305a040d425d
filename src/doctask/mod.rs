//! # Doc-tasks: scheduled tasks whose result is stored.
//!
//! [`DocTaskScheduler`] wraps the [`TaskRunner`](crate::TaskRunner) so that every task
//! it schedules has a durable [`CompletionRecord`], created before the task starts and
//! filled with the terminal event content once it finishes.
//!
//! ```text
//! ScheduleRequest ─► TaskRegistry::resolve ─► DocTaskStore::create ─► index[task_id] = record
//!                                                    │
//!                                     TaskRunner::schedule (+ store callback)
//!                                                    │ terminal
//!                                                    ▼
//!                          index.remove(task_id) ─► DocTaskStore::mark_complete(record, content)
//! ```

mod request;
mod scheduler;
mod store;

pub use request::{ScheduleBody, ScheduleRequest};
pub use scheduler::DocTaskScheduler;
pub use store::{CompletionRecord, DocTaskStore, MemoryStore, RecordId};
