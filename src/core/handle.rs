//! # Task handles: the per-execution record.
//!
//! A [`TaskHandle`] is created by the runner when a task is scheduled (status
//! [`TaskStatus::Started`]) and completed exactly once with a terminal status.
//! Callers, callbacks, and the cache only ever receive clones (snapshots).
//!
//! ## State machine
//! ```text
//! Started ──► Success   (body returned a value)
//!        ├──► Error     (body returned an error or panicked)
//!        └──► Cancelled (cancel requested, or body returned TaskError::Canceled)
//! ```
//! Terminal states are final: completing a terminal handle is a no-op.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation id of one task execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id (UUID v4, simple form).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Started,
    Success,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Started => "Started",
            TaskStatus::Success => "Success",
            TaskStatus::Error => "Error",
            TaskStatus::Cancelled => "Cancelled",
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Started)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured failure of a task body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error type name (`Fail`, `Input`, `Panic`).
    pub kind: String,
    /// Bare error message.
    pub message: String,
    /// Formatted detail for operators (debug rendering of the error).
    pub trace: String,
}

impl ErrorInfo {
    /// Compact representation carried by events, e.g. `Fail("Fake error")`.
    pub fn repr(&self) -> String {
        format!("{}({:?})", self.kind, self.message)
    }
}

/// How a task body ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Success(Value),
    Error(ErrorInfo),
    Cancelled,
}

/// Record of one in-flight or completed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: TaskId,
    /// Registered (dotted) name of the runnable.
    pub name: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Returned value (`Success` only).
    pub result: Option<Value>,
    /// Captured failure (`Error` only).
    pub error: Option<ErrorInfo>,
}

impl TaskHandle {
    pub(crate) fn started(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: TaskStatus::Started,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Moves the handle to its terminal state. Returns `false` if it already was terminal.
    pub(crate) fn complete(&mut self, outcome: Outcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        match outcome {
            Outcome::Success(value) => {
                self.status = TaskStatus::Success;
                self.result = Some(value);
            }
            Outcome::Error(info) => {
                self.status = TaskStatus::Error;
                self.error = Some(info);
            }
            Outcome::Cancelled => self.status = TaskStatus::Cancelled,
        }
        self.completed_at = Some(Utc::now());
        true
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Status content as broadcast to subscribers and stored in completion records.
    ///
    /// ```text
    /// {"status": "Success", "http_status": 200, "task_id": "..", "registered_task": "..", "output": ..}
    /// {"status": "Error", ..., "exception-repr": "Fail(\"Fake error\")"}
    /// ```
    pub fn content(&self) -> Value {
        let mut content = Map::new();
        content.insert("status".into(), Value::from(self.status.as_str()));
        content.insert("http_status".into(), Value::from(200));
        content.insert("task_id".into(), Value::from(self.id.as_str()));
        content.insert("registered_task".into(), Value::from(self.name.as_str()));
        if let Some(output) = &self.result {
            content.insert("output".into(), output.clone());
        }
        if let Some(error) = &self.error {
            content.insert("exception-repr".into(), Value::from(error.repr()));
        }
        Value::Object(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completes_once() {
        let mut handle = TaskHandle::started(TaskId::new("t1"), "app.job");
        assert!(!handle.is_terminal());

        assert!(handle.complete(Outcome::Success(json!(1))));
        assert!(!handle.complete(Outcome::Cancelled));

        assert_eq!(handle.status, TaskStatus::Success);
        assert_eq!(handle.result, Some(json!(1)));
        assert!(handle.completed_at.is_some());
    }

    #[test]
    fn cancelled_has_no_result() {
        let mut handle = TaskHandle::started(TaskId::new("t2"), "app.job");
        handle.complete(Outcome::Cancelled);

        assert_eq!(handle.status, TaskStatus::Cancelled);
        assert_eq!(handle.result, None);
        assert_eq!(handle.error, None);
        assert_eq!(handle.content().get("output"), None);
    }

    #[test]
    fn error_content_carries_repr() {
        let mut handle = TaskHandle::started(TaskId::new("t3"), "app.job");
        handle.complete(Outcome::Error(ErrorInfo {
            kind: "Fail".into(),
            message: "Fake error".into(),
            trace: "Fail { error: \"Fake error\" }".into(),
        }));

        assert_eq!(
            handle.content(),
            json!({
                "status": "Error",
                "http_status": 200,
                "task_id": "t3",
                "registered_task": "app.job",
                "exception-repr": "Fail(\"Fake error\")",
            })
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TaskId::generate(), TaskId::generate());
    }
}
