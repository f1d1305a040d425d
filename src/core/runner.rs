//! # TaskRunner - the scheduling handle.
//!
//! [`TaskRunner`] is a cheap `Clone` handle owned by the composition root and passed
//! to every caller. All requests travel as commands to a single dispatcher loop that
//! owns the task index; nothing reads task state through shared memory.
//!
//! ## Lifecycle
//! ```text
//! TaskRunner::builder(cfg).build()        (captures runtime, nothing spawned yet)
//!     │
//!     ▼ first request: ensure_running()   (spawns the dispatcher once)
//! schedule(spec) ─► Started handle        (task.started already published)
//!     │
//!     ├─ body returns      ─► Success ─┐
//!     ├─ body fails/panics ─► Error   ─┼─► terminal event ─► callbacks ─► wait() resolves
//!     └─ cancel(id)        ─► Cancelled┘
//! ```
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use channel_tasks::{Config, TaskRegistry, TaskRunner, TaskSpec, TaskStatus, builtin};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = TaskRegistry::with_builtins();
//!     let runner = TaskRunner::builder(Config::default()).build()?;
//!
//!     let inputs = json!({"duration": 0.01}).as_object().cloned().unwrap_or_default();
//!     let task = registry.resolve(builtin::SLEEP_TEST, inputs)?;
//!     let handle = runner.schedule(TaskSpec::new(task)).await?;
//!
//!     let done = runner.wait(&handle.id).await?;
//!     assert_eq!(done.status, TaskStatus::Success);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, OnceCell, mpsc, oneshot};

use super::builder::RunnerBuilder;
use super::dispatcher::{Command, Dispatcher};
use super::handle::{TaskHandle, TaskId};
use crate::cache::EventCache;
use crate::config::Config;
use crate::error::{RuntimeError, ValidationError};
use crate::events::SubscriberGroup;
use crate::tasks::TaskSpec;

/// Handle to the process-wide task runner.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

struct Inner {
    commands: mpsc::Sender<Command>,
    pending: Mutex<Option<Dispatcher>>,
    started: OnceCell<()>,
    cache: Arc<dyn EventCache>,
    runtime: Handle,
}

impl TaskRunner {
    /// Starts building a runner.
    pub fn builder(cfg: Config) -> RunnerBuilder {
        RunnerBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        commands: mpsc::Sender<Command>,
        dispatcher: Dispatcher,
        cache: Arc<dyn EventCache>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                commands,
                pending: Mutex::new(Some(dispatcher)),
                started: OnceCell::new(),
                cache,
                runtime,
            }),
        }
    }

    /// Spawns the dispatcher on first call; later calls return immediately.
    pub async fn ensure_running(&self) {
        self.inner
            .started
            .get_or_init(|| async {
                if let Some(dispatcher) = self.inner.pending.lock().await.take() {
                    self.inner.runtime.spawn(dispatcher.run());
                }
            })
            .await;
    }

    /// True once the dispatcher has been spawned.
    pub fn is_running(&self) -> bool {
        self.inner.started.initialized()
    }

    /// Schedules a task and returns its handle in `Started` state.
    ///
    /// When this returns, `task.started` has been cached and broadcast to the
    /// spec's group. The body runs concurrently with every other task.
    ///
    /// # Errors
    /// - [`RuntimeError::DuplicateTask`] if the spec's id is already known.
    /// - [`RuntimeError::WorkerStopped`] if the runtime is shutting down.
    pub async fn schedule(&self, spec: TaskSpec) -> Result<TaskHandle, RuntimeError> {
        self.request(|reply| Command::Schedule { spec, reply }).await?
    }

    /// Requests cancellation. Returns `true` if the task was in flight and is now
    /// `Cancelled`; finished or unknown tasks are left untouched.
    pub async fn cancel(&self, id: &TaskId) -> bool {
        let id = id.clone();
        matches!(
            self.request(|reply| Command::Cancel { id, reply }).await,
            Ok(true)
        )
    }

    /// Snapshot of a live or retained task.
    pub async fn get(&self, id: &TaskId) -> Option<TaskHandle> {
        let id = id.clone();
        self.request(|reply| Command::Get { id, reply })
            .await
            .ok()
            .flatten()
    }

    /// Waits until the task is terminal and its completion callbacks have returned.
    ///
    /// # Errors
    /// [`RuntimeError::UnknownTask`] if the id is neither live nor retained.
    pub async fn wait(&self, id: &TaskId) -> Result<TaskHandle, RuntimeError> {
        let id = id.clone();
        self.request(|reply| Command::Wait { id, reply }).await?
    }

    /// Snapshots of all in-flight tasks, oldest first.
    pub async fn live(&self) -> Vec<TaskHandle> {
        self.request(|reply| Command::Live { reply })
            .await
            .unwrap_or_default()
    }

    /// Publishes a `task.badrequest` event for a rejected request.
    ///
    /// `details` holds one entry per requested task (empty for valid ones).
    pub async fn publish_bad_request(
        &self,
        group: &SubscriberGroup,
        request_id: &str,
        details: Vec<ValidationError>,
    ) -> Result<(), RuntimeError> {
        let group = group.clone();
        let request_id = request_id.to_string();
        self.request(|reply| Command::BadRequest {
            group,
            request_id,
            details,
            reply,
        })
        .await
    }

    /// The replay cache events are stored in.
    pub fn cache(&self) -> &Arc<dyn EventCache> {
        &self.inner.cache
    }

    /// The runtime task bodies run on.
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        self.ensure_running().await;
        let (reply, rx) = oneshot::channel();
        self.inner
            .commands
            .send(make(reply))
            .await
            .map_err(|_| RuntimeError::WorkerStopped)?;
        rx.await.map_err(|_| RuntimeError::WorkerStopped)
    }
}
