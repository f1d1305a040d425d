use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Mutex;

use super::request::ScheduleRequest;
use super::store::{DocTaskStore, RecordId};
use crate::core::{OnComplete, TaskHandle, TaskId, TaskRunner};
use crate::error::{CallbackError, DocTaskError, RuntimeError, StoreError, ValidationError};
use crate::events::SubscriberGroup;
use crate::tasks::{ResolvedTask, TaskRegistry, TaskSpec};

type Index = Arc<Mutex<HashMap<TaskId, IndexEntry>>>;

/// In-flight doc-task: its record and the handle returned at schedule time.
struct IndexEntry {
    record_id: RecordId,
    handle: Option<TaskHandle>,
}

/// Schedules tasks through a [`TaskRunner`] and stores each result in a
/// [`CompletionRecord`](super::CompletionRecord).
///
/// Cheap to clone; clones share the runner, registry, store, and in-flight index.
#[derive(Clone)]
pub struct DocTaskScheduler {
    runner: TaskRunner,
    registry: Arc<TaskRegistry>,
    store: Arc<dyn DocTaskStore>,
    index: Index,
}

impl DocTaskScheduler {
    pub fn new(runner: TaskRunner, registry: Arc<TaskRegistry>, store: Arc<dyn DocTaskStore>) -> Self {
        Self {
            runner,
            registry,
            store,
            index: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Number of scheduled doc-tasks whose result is not stored yet.
    pub async fn in_flight(&self) -> usize {
        self.index.lock().await.len()
    }

    /// Creates the completion record, then schedules `task` with a callback that
    /// stores the terminal content into it.
    ///
    /// The index entry exists before the task is scheduled, so a task finishing
    /// immediately still finds its record.
    ///
    /// The work runs detached on the runner's runtime: dropping the returned
    /// future never leaves a record or index entry half set up. Either the task
    /// is scheduled and its result stored, or both are rolled back.
    pub async fn schedule_and_store(
        &self,
        task: ResolvedTask,
        id: Option<TaskId>,
        group: SubscriberGroup,
    ) -> Result<TaskHandle, DocTaskError> {
        let this = self.clone();
        let id = id.unwrap_or_else(TaskId::generate);
        let join = self
            .runner
            .runtime()
            .spawn(async move { this.store_and_schedule(task, id, group).await });
        match join.await {
            Ok(res) => res,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(RuntimeError::WorkerStopped.into()),
        }
    }

    async fn store_and_schedule(
        &self,
        task: ResolvedTask,
        id: TaskId,
        group: SubscriberGroup,
    ) -> Result<TaskHandle, DocTaskError> {
        let record_id = self
            .store
            .create(task.registered_task(), task.inputs())
            .await?;

        {
            let mut index = self.index.lock().await;
            if index.contains_key(&id) {
                drop(index);
                self.discard_record(record_id).await;
                return Err(RuntimeError::DuplicateTask { id: id.to_string() }.into());
            }
            index.insert(
                id.clone(),
                IndexEntry {
                    record_id,
                    handle: None,
                },
            );
        }

        let registered_task = task.registered_task().to_string();
        let spec = TaskSpec::new(task)
            .with_id(id.clone())
            .with_group(group)
            .with_callback(Arc::new(StoreResult {
                store: Arc::clone(&self.store),
                index: Arc::clone(&self.index),
            }));

        match self.runner.schedule(spec).await {
            Ok(handle) => {
                if let Some(entry) = self.index.lock().await.get_mut(&id) {
                    entry.handle = Some(handle.clone());
                }
                tracing::info!(task_id = %id, record_id, %registered_task, "scheduled doc-task");
                Ok(handle)
            }
            Err(err) => {
                self.index.lock().await.remove(&id);
                self.discard_record(record_id).await;
                Err(err.into())
            }
        }
    }

    /// Resolves `request` through the registry, then [`schedule_and_store`](Self::schedule_and_store).
    pub async fn schedule_request(
        &self,
        request: ScheduleRequest,
        id: Option<TaskId>,
        group: SubscriberGroup,
    ) -> Result<TaskHandle, DocTaskError> {
        let task = self
            .registry
            .resolve(&request.registered_task, request.inputs)
            .map_err(|err| DocTaskError::BadRequest(vec![err]))?;
        self.schedule_and_store(task, id, group).await
    }

    /// Schedules a batch of doc-tasks with ids `"{request_id}.{n}"`.
    ///
    /// The whole batch is validated first: if any item is invalid, nothing is
    /// scheduled, a `task.badrequest` event goes to `group`, and the per-item
    /// details are returned. Valid batches are submitted concurrently; this returns
    /// once every task has started, not finished.
    ///
    /// Items are independent once validated. If some fail to schedule (for
    /// example a reused `request_id`), the rest still run and
    /// [`DocTaskError::Batch`] reports both sides.
    pub async fn schedule_doctasks(
        &self,
        request_id: &str,
        group: &SubscriberGroup,
        requests: Vec<ScheduleRequest>,
    ) -> Result<Vec<TaskHandle>, DocTaskError> {
        let tasks = self.validate(request_id, group, requests).await?;
        let results = join_all(tasks.into_iter().enumerate().map(|(n, task)| {
            let id = batch_id(request_id, n);
            async move {
                let res = self.schedule_and_store(task, Some(id.clone()), group.clone()).await;
                (id, res)
            }
        }))
        .await;
        collect_batch(request_id, results)
    }

    /// Same as [`schedule_doctasks`](Self::schedule_doctasks), without storage.
    pub async fn schedule_tasks(
        &self,
        request_id: &str,
        group: &SubscriberGroup,
        requests: Vec<ScheduleRequest>,
    ) -> Result<Vec<TaskHandle>, DocTaskError> {
        let tasks = self.validate(request_id, group, requests).await?;
        let results = join_all(tasks.into_iter().enumerate().map(|(n, task)| {
            let id = batch_id(request_id, n);
            let spec = TaskSpec::new(task)
                .with_id(id.clone())
                .with_group(group.clone());
            async move { (id, self.runner.schedule(spec).await.map_err(DocTaskError::from)) }
        }))
        .await;
        collect_batch(request_id, results)
    }

    async fn validate(
        &self,
        request_id: &str,
        group: &SubscriberGroup,
        requests: Vec<ScheduleRequest>,
    ) -> Result<Vec<ResolvedTask>, DocTaskError> {
        let mut tasks = Vec::with_capacity(requests.len());
        let mut details = Vec::with_capacity(requests.len());
        for request in requests {
            match self.registry.resolve(&request.registered_task, request.inputs) {
                Ok(task) => {
                    tasks.push(task);
                    details.push(ValidationError::new());
                }
                Err(err) => details.push(err),
            }
        }
        if tasks.len() == details.len() {
            return Ok(tasks);
        }
        self.runner
            .publish_bad_request(group, request_id, details.clone())
            .await?;
        Err(DocTaskError::BadRequest(details))
    }

    async fn discard_record(&self, record_id: RecordId) {
        if let Err(err) = self.store.delete(record_id).await {
            tracing::warn!(record_id, error = %err, "failed to discard unused completion record");
        }
    }
}

fn batch_id(request_id: &str, n: usize) -> TaskId {
    TaskId::new(format!("{request_id}.{n}"))
}

fn collect_batch(
    request_id: &str,
    results: Vec<(TaskId, Result<TaskHandle, DocTaskError>)>,
) -> Result<Vec<TaskHandle>, DocTaskError> {
    let mut handles = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for (id, res) in results {
        match res {
            Ok(handle) => handles.push(handle),
            Err(err) => failed.push((id, err)),
        }
    }
    if failed.is_empty() {
        tracing::info!(%request_id, count = handles.len(), "scheduled batch");
        return Ok(handles);
    }
    tracing::warn!(
        %request_id,
        scheduled = handles.len(),
        failed = failed.len(),
        "batch partially scheduled"
    );
    Err(DocTaskError::Batch {
        scheduled: handles.into_iter().map(|h| h.id).collect(),
        failed,
    })
}

/// Completion callback writing the terminal content into the task's record.
struct StoreResult {
    store: Arc<dyn DocTaskStore>,
    index: Index,
}

#[async_trait]
impl OnComplete for StoreResult {
    async fn on_complete(&self, handle: &TaskHandle) -> Result<(), CallbackError> {
        let Some(entry) = self.index.lock().await.remove(&handle.id) else {
            tracing::warn!(task_id = %handle.id, "finished doc-task missing from index");
            return Ok(());
        };
        let scheduled_as = entry.handle.as_ref().map(|h| h.started_at);

        match self.store.mark_complete(entry.record_id, handle.content()).await {
            Ok(()) => {
                tracing::info!(
                    task_id = %handle.id,
                    record_id = entry.record_id,
                    status = %handle.status,
                    started_at = ?scheduled_as,
                    "stored doc-task result"
                );
                Ok(())
            }
            Err(StoreError::NotFound { id }) => {
                let count = self.store.count().await.unwrap_or_default();
                tracing::warn!(
                    task_id = %handle.id,
                    record_id = id,
                    count,
                    "completion record not found; deleted while the task ran"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &str {
        "store_doctask_result"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::config::Config;
    use crate::core::TaskStatus;
    use crate::doctask::MemoryStore;
    use crate::events::{EventKind, GroupBus};
    use crate::tasks::{Inputs, builtin};

    fn inputs(v: Value) -> Inputs {
        match v {
            Value::Object(map) => map,
            _ => unreachable!("test inputs must be objects"),
        }
    }

    fn sleep_request(duration: f64) -> ScheduleRequest {
        ScheduleRequest::new(builtin::SLEEP_TEST, inputs(json!({"duration": duration})))
    }

    fn setup() -> (DocTaskScheduler, Arc<MemoryStore>, Arc<GroupBus>) {
        let bus = Arc::new(GroupBus::new(64));
        let runner = TaskRunner::builder(Config::default())
            .with_broadcaster(bus.clone())
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let scheduler = DocTaskScheduler::new(
            runner,
            Arc::new(TaskRegistry::with_builtins()),
            store.clone(),
        );
        (scheduler, store, bus)
    }

    #[tokio::test(start_paused = true)]
    async fn stores_terminal_document() {
        let (scheduler, store, _bus) = setup();

        let handle = scheduler
            .schedule_request(sleep_request(0.1), None, SubscriberGroup::new("alice"))
            .await
            .unwrap();
        let pending = store.records().await;
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].is_complete());

        scheduler.runner().wait(&handle.id).await.unwrap();

        let record = &store.records().await[0];
        let document = record.document.as_ref().unwrap();
        assert_eq!(document["output"], "Slept for 0.1 seconds");
        assert_eq!(document["status"], "Success");
        assert_eq!(document["task_id"], handle.id.as_str());
        assert_eq!(record.name, builtin::SLEEP_TEST);
        assert!(record.is_complete());
        assert_eq!(scheduler.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn record_deleted_mid_flight_is_tolerated() {
        let (scheduler, store, _bus) = setup();

        let handle = scheduler
            .schedule_request(sleep_request(1.0), None, SubscriberGroup::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let record_id = store.records().await[0].id;
        assert!(store.delete(record_id).await.unwrap());

        let done = scheduler.runner().wait(&handle.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(scheduler.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_batch_is_rejected_whole() {
        let (scheduler, store, bus) = setup();
        let group = SubscriberGroup::new("bob");
        let mut sub = bus.subscribe(&group).await;

        let requests = vec![
            sleep_request(0.1),
            ScheduleRequest::new(builtin::SLEEP_TEST, inputs(json!({"speed": 3}))),
            ScheduleRequest::new("app.missing", Inputs::new()),
        ];
        let err = scheduler
            .schedule_doctasks("req-1", &group, requests)
            .await
            .unwrap_err();

        let details = match err {
            DocTaskError::BadRequest(details) => details,
            other => panic!("expected bad request, got {other:?}"),
        };
        assert!(details[0].is_empty());
        assert_eq!(details[1].errors()[0].messages.len(), 2);
        assert!(details[2].is_not_found());

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(scheduler.runner().live().await.is_empty());

        let ev = sub.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TaskBadRequest);
        let msg = ev.to_message();
        assert_eq!(msg["content"]["request_id"], "req-1");
        assert_eq!(msg["content"]["details"].as_array().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn valid_batch_runs_concurrently_with_indexed_ids() {
        let (scheduler, store, _bus) = setup();
        let group = SubscriberGroup::new("carol");

        let handles = scheduler
            .schedule_doctasks(
                "req-2",
                &group,
                vec![sleep_request(0.3), sleep_request(0.2), sleep_request(0.1)],
            )
            .await
            .unwrap();
        let ids: Vec<_> = handles.iter().map(|h| h.id.to_string()).collect();
        assert_eq!(ids, ["req-2.0", "req-2.1", "req-2.2"]);
        assert!(handles.iter().all(|h| h.status == TaskStatus::Started));
        assert_eq!(scheduler.in_flight().await, 3);

        let start = tokio::time::Instant::now();
        for h in &handles {
            scheduler.runner().wait(&h.id).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(400));
        assert!(store.records().await.iter().all(|r| r.is_complete()));
    }

    #[tokio::test(start_paused = true)]
    async fn plain_tasks_are_not_stored() {
        let (scheduler, store, _bus) = setup();

        let handles = scheduler
            .schedule_tasks("req-3", &SubscriberGroup::default(), vec![sleep_request(0.1)])
            .await
            .unwrap();
        let done = scheduler.runner().wait(&handles[0].id).await.unwrap();

        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_id_discards_new_record() {
        let (scheduler, store, _bus) = setup();
        let id = TaskId::new("fixed");

        scheduler
            .schedule_request(sleep_request(1.0), Some(id.clone()), SubscriberGroup::default())
            .await
            .unwrap();
        let err = scheduler
            .schedule_request(sleep_request(1.0), Some(id), SubscriberGroup::default())
            .await
            .unwrap_err();

        assert_eq!(err.as_label(), "doctask_runtime");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reused_request_id_rolls_back_rejected_items() {
        let (scheduler, store, _bus) = setup();
        let group = SubscriberGroup::new("dave");

        let first = scheduler
            .schedule_doctasks("r", &group, vec![sleep_request(0.1); 3])
            .await
            .unwrap();
        for h in &first {
            scheduler.runner().wait(&h.id).await.unwrap();
        }

        let err = scheduler
            .schedule_doctasks("r", &group, vec![sleep_request(0.1); 4])
            .await
            .unwrap_err();
        let (scheduled, failed) = match err {
            DocTaskError::Batch { scheduled, failed } => (scheduled, failed),
            other => panic!("expected batch error, got {other:?}"),
        };
        assert_eq!(scheduled, [TaskId::new("r.3")]);
        let failed_ids: Vec<_> = failed.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(failed_ids, ["r.0", "r.1", "r.2"]);
        assert!(failed.iter().all(|(_, e)| e.as_label() == "doctask_runtime"));

        scheduler.runner().wait(&TaskId::new("r.3")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let records = store.records().await;
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.is_complete()));
        assert_eq!(scheduler.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_schedule_call_still_stores_result() {
        let (scheduler, store, _bus) = setup();

        let dropped = tokio::time::timeout(
            Duration::ZERO,
            scheduler.schedule_request(sleep_request(0.1), Some(TaskId::new("gone")), SubscriberGroup::default()),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let done = scheduler.runner().wait(&TaskId::new("gone")).await.unwrap();
        assert_eq!(done.status, TaskStatus::Success);

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_complete());
        assert_eq!(scheduler.in_flight().await, 0);
    }
}
