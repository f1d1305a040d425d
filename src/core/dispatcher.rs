//! # Dispatcher - single owner of the in-flight task index.
//!
//! Every mutation of task state happens inside one loop, fed by two queues:
//! - **commands** from [`TaskRunner`](crate::TaskRunner) handles (bounded);
//! - **completions** from spawned task bodies and callback runs (unbounded, one per task).
//!
//! ## Architecture
//! ```text
//! TaskRunner ── Command ──► [commands] ─┐
//!                                       ├─► Dispatcher::run() ─► publish(group, ev)
//! task body  ── Finished ─► [done] ─────┤        │                 ├─► EventCache::put
//! callbacks  ── Settled ──► [done] ─────┘        │                 ├─► Broadcast::publish
//!                                                │                 └─► SubscriberSet::emit
//!                                                └─► spawn(execute) / spawn(run_callbacks)
//! ```
//!
//! ## Rules
//! - `task.started` is published before the body is spawned, so it always precedes
//!   the terminal event.
//! - A handle leaves the live index exactly once (finish or cancel); later outcomes
//!   for the same id are ignored.
//! - Waiters resolve once the task is terminal **and** its callbacks have returned.
//! - When every runner handle is dropped, live tasks are cancelled and pending
//!   callbacks drained before the loop exits.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::callback::{OnComplete, run_callbacks};
use super::execute::execute;
use super::handle::{Outcome, TaskHandle, TaskId};
use crate::cache::EventCache;
use crate::error::{RuntimeError, ValidationError};
use crate::events::{Broadcast, SubscriberGroup, TaskEvent};
use crate::subscribers::SubscriberSet;
use crate::tasks::TaskSpec;

type Reply<T> = oneshot::Sender<T>;

/// Requests served by the dispatcher.
pub(super) enum Command {
    Schedule {
        spec: TaskSpec,
        reply: Reply<Result<TaskHandle, RuntimeError>>,
    },
    Cancel {
        id: TaskId,
        reply: Reply<bool>,
    },
    Get {
        id: TaskId,
        reply: Reply<Option<TaskHandle>>,
    },
    Wait {
        id: TaskId,
        reply: Reply<Result<TaskHandle, RuntimeError>>,
    },
    Live {
        reply: Reply<Vec<TaskHandle>>,
    },
    BadRequest {
        group: SubscriberGroup,
        request_id: String,
        details: Vec<ValidationError>,
        reply: Reply<()>,
    },
}

/// Messages produced by work the dispatcher spawned.
enum Done {
    Finished(TaskId, Outcome),
    Settled(TaskHandle),
}

/// Event sinks shared by every publication.
pub(super) struct Sinks {
    pub(super) broadcaster: Arc<dyn Broadcast>,
    pub(super) cache: Arc<dyn EventCache>,
    pub(super) observers: SubscriberSet,
}

struct LiveTask {
    handle: TaskHandle,
    group: SubscriberGroup,
    callbacks: Vec<Arc<dyn OnComplete>>,
    cancel: CancellationToken,
}

pub(super) struct Dispatcher {
    commands: mpsc::Receiver<Command>,
    done_tx: mpsc::UnboundedSender<Done>,
    done_rx: mpsc::UnboundedReceiver<Done>,
    runtime: Handle,
    sinks: Sinks,
    root: CancellationToken,

    live: HashMap<TaskId, LiveTask>,
    settling: HashSet<TaskId>,
    waiters: HashMap<TaskId, Vec<Reply<Result<TaskHandle, RuntimeError>>>>,
    finished: HashMap<TaskId, TaskHandle>,
    finished_order: VecDeque<TaskId>,
    retain_completed: usize,
}

impl Dispatcher {
    pub(super) fn new(
        commands: mpsc::Receiver<Command>,
        runtime: Handle,
        sinks: Sinks,
        retain_completed: usize,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            commands,
            done_tx,
            done_rx,
            runtime,
            sinks,
            root: CancellationToken::new(),
            live: HashMap::new(),
            settling: HashSet::new(),
            waiters: HashMap::new(),
            finished: HashMap::new(),
            finished_order: VecDeque::new(),
            retain_completed,
        }
    }

    /// Main loop. Completions are drained before new commands.
    pub(super) async fn run(mut self) {
        tracing::debug!("task runner worker started");
        loop {
            tokio::select! {
                biased;
                Some(done) = self.done_rx.recv() => self.handle_done(done).await,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }
        self.shutdown().await;
        tracing::debug!("task runner worker stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Schedule { spec, reply } => {
                let _ = reply.send(self.schedule(spec).await);
            }
            Command::Cancel { id, reply } => {
                let cancelled = self.live.contains_key(&id);
                if cancelled {
                    tracing::info!(task_id = %id, "task cancellation requested");
                    self.finish(id, Outcome::Cancelled).await;
                }
                let _ = reply.send(cancelled);
            }
            Command::Get { id, reply } => {
                let handle = match self.live.get(&id) {
                    Some(task) => Some(task.handle.clone()),
                    None => self.finished.get(&id).cloned(),
                };
                let _ = reply.send(handle);
            }
            Command::Wait { id, reply } => {
                if self.live.contains_key(&id) || self.settling.contains(&id) {
                    self.waiters.entry(id).or_default().push(reply);
                } else if let Some(handle) = self.finished.get(&id) {
                    let _ = reply.send(Ok(handle.clone()));
                } else {
                    let _ = reply.send(Err(RuntimeError::UnknownTask { id: id.to_string() }));
                }
            }
            Command::Live { reply } => {
                let mut handles: Vec<TaskHandle> =
                    self.live.values().map(|t| t.handle.clone()).collect();
                handles.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
                let _ = reply.send(handles);
            }
            Command::BadRequest {
                group,
                request_id,
                details,
                reply,
            } => {
                tracing::info!(%request_id, group = %group, "schedule request rejected");
                self.publish(&group, TaskEvent::bad_request(request_id, details))
                    .await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_done(&mut self, done: Done) {
        match done {
            Done::Finished(id, outcome) => self.finish(id, outcome).await,
            Done::Settled(handle) => self.settle(handle),
        }
    }

    /// Records the handle, publishes `task.started`, then spawns the body.
    async fn schedule(&mut self, spec: TaskSpec) -> Result<TaskHandle, RuntimeError> {
        let (task, id, group, callbacks) = spec.into_parts();
        let id = id.unwrap_or_else(TaskId::generate);
        if self.live.contains_key(&id) || self.finished.contains_key(&id) || self.settling.contains(&id) {
            return Err(RuntimeError::DuplicateTask { id: id.to_string() });
        }

        let (name, runnable, inputs) = task.into_parts();
        let handle = TaskHandle::started(id.clone(), name.clone());
        let cancel = self.root.child_token();
        self.live.insert(
            id.clone(),
            LiveTask {
                handle: handle.clone(),
                group: group.clone(),
                callbacks,
                cancel: cancel.clone(),
            },
        );

        tracing::info!(task_id = %id, registered_task = %name, group = %group, "task scheduled");
        self.publish(&group, TaskEvent::for_handle(&handle)).await;

        let done = self.done_tx.clone();
        self.runtime.spawn(async move {
            let outcome = execute(&id, &name, runnable, inputs, cancel).await;
            let _ = done.send(Done::Finished(id, outcome));
        });
        Ok(handle)
    }

    /// Moves a live task to its terminal state (once), then runs its callbacks.
    async fn finish(&mut self, id: TaskId, outcome: Outcome) {
        let Some(LiveTask {
            mut handle,
            group,
            callbacks,
            cancel,
        }) = self.live.remove(&id)
        else {
            tracing::debug!(task_id = %id, "outcome for finished task ignored");
            return;
        };
        cancel.cancel();
        handle.complete(outcome);
        tracing::info!(task_id = %id, status = %handle.status, group = %group, "task finished");
        self.publish(&group, TaskEvent::for_handle(&handle)).await;
        self.retain(handle.clone());

        if callbacks.is_empty() {
            self.settle(handle);
            return;
        }
        self.settling.insert(id);
        let done = self.done_tx.clone();
        self.runtime.spawn(async move {
            run_callbacks(&callbacks, &handle).await;
            let _ = done.send(Done::Settled(handle));
        });
    }

    fn settle(&mut self, handle: TaskHandle) {
        self.settling.remove(&handle.id);
        for waiter in self.waiters.remove(&handle.id).unwrap_or_default() {
            let _ = waiter.send(Ok(handle.clone()));
        }
    }

    fn retain(&mut self, handle: TaskHandle) {
        if self.retain_completed == 0 {
            return;
        }
        self.finished_order.push_back(handle.id.clone());
        self.finished.insert(handle.id.clone(), handle);
        while self.finished_order.len() > self.retain_completed {
            if let Some(old) = self.finished_order.pop_front() {
                self.finished.remove(&old);
            }
        }
    }

    /// Cache first (replay), then live subscribers, then observers.
    async fn publish(&self, group: &SubscriberGroup, event: TaskEvent) {
        let event = Arc::new(event);
        if let Err(err) = self.sinks.cache.put(group, &event).await {
            tracing::warn!(
                group = %group,
                task_id = %event.task_id,
                label = err.as_label(),
                error = %err,
                "event not cached"
            );
        }
        self.sinks.broadcaster.publish(group, Arc::clone(&event)).await;
        self.sinks.observers.emit(&event);
        tracing::debug!(
            group = %group,
            task_id = %event.task_id,
            kind = %event.kind,
            seq = event.seq,
            "event published"
        );
    }

    /// Cancels everything still live and waits for pending callbacks.
    async fn shutdown(&mut self) {
        self.root.cancel();
        let ids: Vec<TaskId> = self.live.keys().cloned().collect();
        for id in ids {
            self.finish(id, Outcome::Cancelled).await;
        }
        while !self.settling.is_empty() {
            match self.done_rx.recv().await {
                Some(Done::Settled(handle)) => self.settle(handle),
                Some(Done::Finished(..)) => {}
                None => break,
            }
        }
    }
}
