//! # Task lifecycle events.
//!
//! The [`EventKind`] enum classifies the events published for a task:
//! - `task.started` once, when the task is scheduled
//! - exactly one terminal event: `task.success`, `task.error` or `task.cancelled`
//! - `task.badrequest` for rejected schedule requests (no task was created)
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! For a single task, `task.started` always carries a lower `seq` than its terminal event.
//!
//! ## Wire format
//! ```text
//! {"type": "task.success",
//!  "content": {"status": "Success", "http_status": 200, "task_id": "..",
//!              "registered_task": "..", "output": ..},
//!  "timestamp": 1700000000.123456}
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::{TaskHandle, TaskId, TaskStatus};
use crate::error::ValidationError;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Task was scheduled and is running.
    TaskStarted,
    /// Task body returned a value.
    TaskSuccess,
    /// Task body failed or panicked.
    TaskError,
    /// Task was cancelled before producing a result.
    TaskCancelled,
    /// A schedule request was rejected by validation.
    TaskBadRequest,
}

impl EventKind {
    /// The `type` string used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskStarted => "task.started",
            EventKind::TaskSuccess => "task.success",
            EventKind::TaskError => "task.error",
            EventKind::TaskCancelled => "task.cancelled",
            EventKind::TaskBadRequest => "task.badrequest",
        }
    }

    pub fn from_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Started => EventKind::TaskStarted,
            TaskStatus::Success => EventKind::TaskSuccess,
            TaskStatus::Error => EventKind::TaskError,
            TaskStatus::Cancelled => EventKind::TaskCancelled,
        }
    }

    /// True for `task.success`, `task.error` and `task.cancelled`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventKind::TaskSuccess | EventKind::TaskError | EventKind::TaskCancelled
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named fan-out destination for lifecycle events (typically a user name).
///
/// The default group is the empty name, used for anonymous schedules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberGroup(String);

impl SubscriberGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberGroup {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventContent {
    /// Snapshot of the task handle at publication time.
    Task(TaskHandle),
    /// Rejected schedule request, with one entry per requested task.
    BadRequest {
        request_id: String,
        details: Vec<ValidationError>,
    },
}

/// Lifecycle event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Event classification.
    pub kind: EventKind,
    /// Task (or request) id the event refers to.
    pub task_id: TaskId,
    /// Payload.
    pub content: EventContent,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,
}

impl TaskEvent {
    /// Creates the event matching the handle's current status.
    pub fn for_handle(handle: &TaskHandle) -> Self {
        Self::new(
            EventKind::from_status(handle.status),
            handle.id.clone(),
            EventContent::Task(handle.clone()),
        )
    }

    /// Creates a `task.badrequest` event for a rejected request.
    pub fn bad_request(request_id: impl Into<String>, details: Vec<ValidationError>) -> Self {
        let request_id = request_id.into();
        Self::new(
            EventKind::TaskBadRequest,
            TaskId::new(request_id.clone()),
            EventContent::BadRequest {
                request_id,
                details,
            },
        )
    }

    fn new(kind: EventKind, task_id: TaskId, content: EventContent) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            task_id,
            content,
            at: Utc::now(),
        }
    }

    /// The task snapshot, unless this is a bad-request event.
    pub fn handle(&self) -> Option<&TaskHandle> {
        match &self.content {
            EventContent::Task(handle) => Some(handle),
            EventContent::BadRequest { .. } => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// The `content` object of the wire message.
    pub fn content_json(&self) -> Value {
        match &self.content {
            EventContent::Task(handle) => handle.content(),
            EventContent::BadRequest {
                request_id,
                details,
            } => json!({
                "http_status": 400,
                "request_id": request_id,
                "details": details.iter().map(ValidationError::to_json).collect::<Vec<_>>(),
            }),
        }
    }

    /// Full wire message: `{"type", "content", "timestamp"}`.
    pub fn to_message(&self) -> Value {
        json!({
            "type": self.kind.as_str(),
            "content": self.content_json(),
            "timestamp": self.at.timestamp_micros() as f64 / 1_000_000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Field;

    #[test]
    fn sequence_is_monotonic() {
        let handle = TaskHandle::started(TaskId::new("a"), "app.job");
        let first = TaskEvent::for_handle(&handle);
        let second = TaskEvent::for_handle(&handle);
        assert!(second.seq > first.seq);
        assert_eq!(first.kind, EventKind::TaskStarted);
        assert!(!first.is_terminal());
    }

    #[test]
    fn started_message_shape() {
        let handle = TaskHandle::started(TaskId::new("req.0"), "app.job");
        let msg = TaskEvent::for_handle(&handle).to_message();

        assert_eq!(msg["type"], "task.started");
        assert_eq!(msg["content"]["status"], "Started");
        assert_eq!(msg["content"]["http_status"], 200);
        assert_eq!(msg["content"]["task_id"], "req.0");
        assert_eq!(msg["content"]["registered_task"], "app.job");
        assert!(msg["timestamp"].as_f64().is_some());
    }

    #[test]
    fn bad_request_message_shape() {
        let mut invalid = ValidationError::new();
        invalid.push(Field::Inputs, "Unknown parameters [\"x\"].");
        let ev = TaskEvent::bad_request("req", vec![ValidationError::new(), invalid]);

        assert!(ev.handle().is_none());
        let msg = ev.to_message();
        assert_eq!(msg["type"], "task.badrequest");
        assert_eq!(msg["content"]["http_status"], 400);
        assert_eq!(msg["content"]["details"][0], serde_json::json!([]));
        assert_eq!(
            msg["content"]["details"][1][0]["messages"][0],
            "Unknown parameters [\"x\"]."
        );
    }
}
