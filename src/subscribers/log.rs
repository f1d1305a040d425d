//! # Logging observer.
//!
//! [`LogWriter`] renders every lifecycle event as a `tracing` record:
//! ```text
//! INFO  task started   task_id=4f0c.. registered_task=app.reports.build group=alice
//! INFO  task succeeded task_id=4f0c.. registered_task=app.reports.build
//! WARN  task failed    task_id=77aa.. registered_task=app.reports.build error=Fail("Fake error")
//! INFO  task cancelled task_id=91b2.. registered_task=app.reports.build
//! WARN  bad request    request_id=req-17 rejected=2
//! ```

use async_trait::async_trait;

use crate::events::{EventContent, EventKind, TaskEvent};

use super::Subscribe;

/// Observer that logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &TaskEvent) {
        match &e.content {
            EventContent::Task(h) => match e.kind {
                EventKind::TaskStarted => {
                    tracing::info!(task_id = %h.id, registered_task = %h.name, "task started");
                }
                EventKind::TaskSuccess => {
                    tracing::info!(task_id = %h.id, registered_task = %h.name, "task succeeded");
                }
                EventKind::TaskError => {
                    let error = h.error.as_ref().map(|err| err.repr()).unwrap_or_default();
                    tracing::warn!(task_id = %h.id, registered_task = %h.name, %error, "task failed");
                }
                EventKind::TaskCancelled => {
                    tracing::info!(task_id = %h.id, registered_task = %h.name, "task cancelled");
                }
                EventKind::TaskBadRequest => {}
            },
            EventContent::BadRequest {
                request_id,
                details,
            } => {
                let rejected = details.iter().filter(|d| !d.is_empty()).count();
                tracing::warn!(%request_id, rejected, "bad request");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
