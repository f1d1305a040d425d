use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::dispatcher::{Dispatcher, Sinks};
use super::runner::TaskRunner;
use crate::{
    cache::{EventCache, MemoryCache},
    config::Config,
    error::RuntimeError,
    events::{Broadcast, GroupBus},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`TaskRunner`] with optional collaborators.
///
/// Defaults: an in-process [`GroupBus`] and a [`MemoryCache`], both sized from
/// [`Config`], and no observers.
///
/// Without [`with_runtime`](Self::with_runtime) the runner uses the runtime current
/// at [`build`](Self::build) time, so task bodies share threads with whatever
/// serves requests. Services should give the runner its own runtime:
///
/// ```no_run
/// use channel_tasks::{Config, TaskRunner};
///
/// let workers = tokio::runtime::Builder::new_multi_thread()
///     .thread_name("task-worker")
///     .enable_all()
///     .build()?;
/// let runner = TaskRunner::builder(Config::default())
///     .with_runtime(workers.handle().clone())
///     .build()?;
/// # drop(runner);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RunnerBuilder {
    cfg: Config,
    runtime: Option<Handle>,
    broadcaster: Option<Arc<dyn Broadcast>>,
    cache: Option<Arc<dyn EventCache>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RunnerBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            runtime: None,
            broadcaster: None,
            cache: None,
            subscribers: Vec::new(),
        }
    }

    /// Runs task bodies, callbacks, and the dispatcher on `runtime` instead of the
    /// runtime current at [`build`](Self::build) time.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the fan-out capability events are published through.
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcast>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Sets the replay cache events are stored in.
    pub fn with_cache(mut self, cache: Arc<dyn EventCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets process-wide observers.
    ///
    /// Observers receive every event, whatever its group, through dedicated
    /// workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the runner. The dispatcher itself starts lazily on first use.
    ///
    /// # Errors
    /// [`RuntimeError::NoRuntime`] when called outside a tokio runtime without
    /// [`with_runtime`](Self::with_runtime).
    pub fn build(self) -> Result<TaskRunner, RuntimeError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?,
        };

        let broadcaster = self
            .broadcaster
            .unwrap_or_else(|| Arc::new(GroupBus::new(self.cfg.bus_capacity_clamped())));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::from_config(&self.cfg)));
        let observers = SubscriberSet::new(self.subscribers, &runtime);

        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity_clamped());
        let dispatcher = Dispatcher::new(
            rx,
            runtime.clone(),
            Sinks {
                broadcaster,
                cache: Arc::clone(&cache),
                observers,
            },
            self.cfg.retain_completed,
        );

        Ok(TaskRunner::new_internal(tx, dispatcher, cache, runtime))
    }
}
