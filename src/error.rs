//! Error types used by the task runner, registry, cache, and doc-task layer.
//!
//! - [`RuntimeError`] - errors raised by the runner itself (construction, dispatcher, config).
//! - [`TaskError`] - errors returned by individual runnable bodies.
//! - [`ValidationError`] - structured schedule-time rejection (unknown task, bad inputs).
//! - [`RegistryError`] - registration-time problems.
//! - [`CacheError`], [`StoreError`], [`CallbackError`] - collaborator failures.
//! - [`DocTaskError`] - failures of the doc-task scheduling layer.
//!
//! Error enums provide `as_label` (stable snake_case) for logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::TaskId;

/// # Errors produced by the task runner.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runner was built outside of a tokio runtime and no runtime handle was given.
    ///
    /// This is a programming error: the builder is the only sanctioned entry point
    /// and it must run inside the process runtime.
    #[error("task runner must be built inside a tokio runtime")]
    NoRuntime,

    /// A task with the same id is already known to the runner.
    #[error("task '{id}' already exists")]
    DuplicateTask {
        /// Offending task id.
        id: String,
    },

    /// No live or retained task with this id.
    #[error("task '{id}' not found")]
    UnknownTask {
        /// Requested task id.
        id: String,
    },

    /// The dispatcher loop is gone (runtime shut down).
    #[error("task runner worker stopped")]
    WorkerStopped,

    /// A configuration value could not be parsed.
    #[error("invalid config value {value:?} for {key}")]
    InvalidConfig {
        /// Environment key.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use channel_tasks::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::WorkerStopped.as_label(), "runtime_worker_stopped");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoRuntime => "runtime_no_runtime",
            RuntimeError::DuplicateTask { .. } => "runtime_duplicate_task",
            RuntimeError::UnknownTask { .. } => "runtime_unknown_task",
            RuntimeError::WorkerStopped => "runtime_worker_stopped",
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
        }
    }
}

/// # Errors produced by task execution.
///
/// Returned by [`Runnable::run`](crate::Runnable::run). The runner captures them into the
/// task handle; they never propagate to the scheduler's caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Inputs could not be decoded by the task body.
    #[error("invalid input: {error}")]
    Input {
        /// The decoding error message.
        error: String,
    },

    /// Task observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Input`].
    pub fn input(error: impl std::fmt::Display) -> Self {
        TaskError::Input {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Input { .. } => "task_bad_input",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Error type name recorded in [`ErrorInfo::kind`](crate::ErrorInfo).
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "Fail",
            TaskError::Input { .. } => "Input",
            TaskError::Canceled => "Canceled",
        }
    }

    /// The bare message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            TaskError::Fail { error } | TaskError::Input { error } => error,
            TaskError::Canceled => "context cancelled",
        }
    }
}

/// Field of a schedule request a validation message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// The registered task name.
    Name,
    /// The task inputs.
    Inputs,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Inputs => "inputs",
        }
    }
}

/// All messages for one [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub messages: Vec<String>,
}

/// # Structured schedule-time rejection.
///
/// Collects every problem found for one request (unknown task name, missing and
/// unknown input keys) so the caller gets the complete list in one failure.
/// Serializes as `[{"field": "inputs", "messages": [...]}, ...]`.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[error("invalid schedule request: {}", self.summary())]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates an empty error (no problems recorded).
    pub fn new() -> Self {
        Self::default()
    }

    /// The rejection used when no registered task matches `name`.
    pub fn not_found(name: &str) -> Self {
        let mut err = Self::new();
        err.push(Field::Name, format!("Task '{name}' not found."));
        err
    }

    /// Appends a message to `field`, keeping fields in first-seen order.
    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        match self.errors.iter_mut().find(|e| e.field == field) {
            Some(entry) => entry.messages.push(message.into()),
            None => self.errors.push(FieldError {
                field,
                messages: vec![message.into()],
            }),
        }
    }

    /// True if no problem was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if the request named an unregistered task.
    pub fn is_not_found(&self) -> bool {
        self.messages(Field::Name).next().is_some()
    }

    /// Per-field errors, in first-seen order.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Messages recorded for `field`.
    pub fn messages(&self, field: Field) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .flat_map(|e| e.messages.iter().map(String::as_str))
    }

    /// JSON form: `[{"field": "inputs", "messages": [...]}]`.
    pub fn to_json(&self) -> serde_json::Value {
        self.errors
            .iter()
            .map(|e| serde_json::json!({"field": e.field.as_str(), "messages": e.messages}))
            .collect()
    }

    fn summary(&self) -> String {
        self.errors
            .iter()
            .flat_map(|e| e.messages.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// # Errors produced while populating the task registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The dotted name is already registered.
    #[error("task '{name}' is already registered")]
    Duplicate { name: String },

    /// The name has no `namespace.` part.
    #[error("task name '{name}' must be a dotted path")]
    InvalidName { name: String },
}

impl RegistryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Duplicate { .. } => "registry_duplicate",
            RegistryError::InvalidName { .. } => "registry_invalid_name",
        }
    }
}

/// # Errors produced by an event cache backend.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache unavailable: {error}")]
    Unavailable { error: String },
}

impl CacheError {
    pub fn as_label(&self) -> &'static str {
        match self {
            CacheError::Unavailable { .. } => "cache_unavailable",
        }
    }
}

/// # Errors produced by a completion-record store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record was deleted (or never existed).
    #[error("completion record {id} not found")]
    NotFound { id: u64 },

    /// Storage backend failure.
    #[error("store backend error: {error}")]
    Backend { error: String },
}

impl StoreError {
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::Backend { .. } => "store_backend",
        }
    }
}

/// A completion callback failed. Logged by the runner, never re-raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("completion callback failed: {error}")]
pub struct CallbackError {
    pub error: String,
}

impl From<StoreError> for CallbackError {
    fn from(err: StoreError) -> Self {
        CallbackError {
            error: err.to_string(),
        }
    }
}

/// # Errors produced by the doc-task scheduler.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocTaskError {
    /// At least one requested task failed validation; nothing was scheduled.
    ///
    /// One entry per requested task, in request order (empty for valid items).
    #[error("bad request: {} of {} task(s) rejected", rejected_count(.0), .0.len())]
    BadRequest(Vec<ValidationError>),

    /// The completion record could not be created.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The runner refused the task.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Some items of a validated batch could not be scheduled; the others run.
    #[error("batch: {} of {} task(s) not scheduled", .failed.len(), batch_len(.scheduled, .failed))]
    Batch {
        /// Ids of the items that were scheduled.
        scheduled: Vec<TaskId>,
        /// Ids of the items that were not, with the reason.
        failed: Vec<(TaskId, DocTaskError)>,
    },
}

impl DocTaskError {
    pub fn as_label(&self) -> &'static str {
        match self {
            DocTaskError::BadRequest(_) => "doctask_bad_request",
            DocTaskError::Store(_) => "doctask_store",
            DocTaskError::Runtime(_) => "doctask_runtime",
            DocTaskError::Batch { .. } => "doctask_batch",
        }
    }
}

fn batch_len(scheduled: &[TaskId], failed: &[(TaskId, DocTaskError)]) -> usize {
    scheduled.len() + failed.len()
}

fn rejected_count(details: &[ValidationError]) -> usize {
    details.iter().filter(|d| !d.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_groups_messages_per_field() {
        let mut err = ValidationError::new();
        err.push(Field::Inputs, "Missing required parameters [\"duration\"].");
        err.push(Field::Inputs, "Unknown parameters [\"speed\"].");

        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.messages(Field::Inputs).count(), 2);
        assert!(!err.is_not_found());
    }

    #[test]
    fn validation_error_serializes_as_field_list() {
        let err = ValidationError::not_found("app.nope");
        let expected =
            serde_json::json!([{"field": "name", "messages": ["Task 'app.nope' not found."]}]);

        assert_eq!(serde_json::to_value(&err).unwrap(), expected);
        assert_eq!(err.to_json(), expected);
        assert!(err.is_not_found());
    }

    #[test]
    fn task_error_parts() {
        let err = TaskError::fail("Fake error");
        assert_eq!(err.kind(), "Fail");
        assert_eq!(err.message(), "Fake error");
        assert_eq!(err.to_string(), "execution failed: Fake error");
        assert_eq!(err.as_label(), "task_failed");
    }

    #[test]
    fn doctask_bad_request_counts_rejected_items() {
        let err = DocTaskError::BadRequest(vec![
            ValidationError::new(),
            ValidationError::not_found("app.nope"),
        ]);
        assert_eq!(err.to_string(), "bad request: 1 of 2 task(s) rejected");
        assert_eq!(err.as_label(), "doctask_bad_request");
    }

    #[test]
    fn doctask_batch_counts_failed_items() {
        let err = DocTaskError::Batch {
            scheduled: vec![TaskId::new("r.1")],
            failed: vec![(
                TaskId::new("r.0"),
                RuntimeError::DuplicateTask { id: "r.0".into() }.into(),
            )],
        };
        assert_eq!(err.to_string(), "batch: 1 of 2 task(s) not scheduled");
        assert_eq!(err.as_label(), "doctask_batch");
    }
}
