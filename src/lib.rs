//! # channel-tasks
//!
//! **channel-tasks** is an in-process background task runner for async services.
//!
//! It schedules named async jobs on one shared runtime, tracks each execution
//! through `Started → Success | Error | Cancelled`, runs completion callbacks, and
//! broadcasts every lifecycle transition to subscriber groups (typically one per
//! end user), keeping a bounded replay cache for clients that reconnect.
//!
//! ## Architecture
//! ```text
//!   ScheduleRequest {registered_task, inputs}
//!            │
//!            ▼
//!   ┌──────────────────┐  resolve + validate   ┌────────────────────────────┐
//!   │   TaskRegistry   │──────────────────────►│ ResolvedTask ─► TaskSpec   │
//!   └──────────────────┘                       │ (id, group, callbacks)     │
//!                                              └─────────────┬──────────────┘
//!   DocTaskScheduler (optional: CompletionRecord             │ schedule()
//!   created first, stored by a callback)                     ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │ TaskRunner (Clone handle) ── Command ──► Dispatcher (single writer)       │
//! │                                           - live index / retained handles │
//! │                                           - spawns bodies + callbacks     │
//! └──────────────────────────────────┬────────────────────────────────────────┘
//!                                    │ publish(group, TaskEvent)
//!            ┌───────────────────────┼─────────────────────────┐
//!            ▼                       ▼                         ▼
//!      EventCache::put      Broadcast::publish         SubscriberSet::emit
//!     (bounded replay)   (GroupBus: one channel       (process-wide observers,
//!                          per SubscriberGroup)         e.g. LogWriter)
//! ```
//!
//! ## Lifecycle of one task
//! ```text
//! schedule(spec)
//!   ├─► handle recorded (Started), task.started cached + broadcast
//!   ├─► body spawned on the runtime (concurrent with every other task)
//!   │       ├─ Ok(value)             ─► Success (output)
//!   │       ├─ Err(e) / panic        ─► Error   (exception-repr, logged with trace)
//!   │       └─ cancel(id) / Canceled ─► Cancelled
//!   ├─► exactly one terminal event, same group as task.started
//!   └─► completion callbacks (in order, failures logged) ─► wait(id) resolves
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                        |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Tasks**         | Async runnables with declared parameters, dotted-name lookup. | [`Runnable`], [`TaskFn`], [`TaskRegistry`] |
//! | **Runner**        | Scheduling, cancellation, inspection, completion callbacks.   | [`TaskRunner`], [`TaskSpec`], [`OnComplete`] |
//! | **Events**        | Per-group broadcasting and bounded replay.                    | [`Broadcast`], [`GroupBus`], [`EventCache`] |
//! | **Observers**     | Process-wide event hooks (logging, metrics).                  | [`Subscribe`], [`LogWriter`]              |
//! | **Doc-tasks**     | Results stored into completion records.                       | [`DocTaskScheduler`], [`DocTaskStore`]    |
//! | **Errors**        | Typed errors for every layer.                                 | [`RuntimeError`], [`ValidationError`]     |
//! | **Configuration** | Capacities and TTLs, from code or the environment.            | [`Config`]                                |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use channel_tasks::{
//!     Config, GroupBus, LogWriter, Subscribe, SubscriberGroup, TaskRegistry, TaskRunner,
//!     TaskSpec, builtin,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = TaskRegistry::with_builtins();
//!     let bus = Arc::new(GroupBus::new(64));
//!     let runner = TaskRunner::builder(Config::default())
//!         .with_broadcaster(bus.clone())
//!         .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
//!         .build()?;
//!
//!     let alice = SubscriberGroup::new("alice");
//!     let mut events = bus.subscribe(&alice).await;
//!
//!     let inputs = json!({"duration": 0.01}).as_object().cloned().unwrap_or_default();
//!     let task = registry.resolve(builtin::SLEEP_TEST, inputs)?;
//!     runner.schedule(TaskSpec::new(task).with_group(alice)).await?;
//!
//!     while let Some(ev) = events.recv().await {
//!         println!("{}", ev.to_message());
//!         if ev.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
mod cache;
mod config;
mod core;
mod doctask;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use cache::{EventCache, MemoryCache};
pub use config::Config;
pub use core::{
    CallbackFn, ErrorInfo, OnComplete, RunnerBuilder, TaskHandle, TaskId, TaskRunner, TaskStatus,
};
pub use doctask::{
    CompletionRecord, DocTaskScheduler, DocTaskStore, MemoryStore, RecordId, ScheduleBody,
    ScheduleRequest,
};
pub use error::{
    CacheError, CallbackError, DocTaskError, Field, FieldError, RegistryError, RuntimeError,
    StoreError, TaskError, ValidationError,
};
pub use events::{Broadcast, EventContent, EventKind, GroupBus, Subscription, SubscriberGroup, TaskEvent};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Inputs, Param, ResolvedTask, Runnable, TaskFn, TaskRef, TaskRegistry, TaskSpec, builtin};
