//! # Task specification for scheduling.
//!
//! Defines [`TaskSpec`], the bundle handed to [`TaskRunner::schedule`](crate::TaskRunner::schedule):
//! a resolved task plus its correlation id, subscriber group, and completion callbacks.
//!
//! ## Rules
//! - Without an explicit id, the runner assigns a fresh UUID v4.
//! - Without an explicit group, events go to the default (anonymous) group.
//! - Callbacks run after the terminal event, in registration order.

use std::sync::Arc;

use crate::core::{OnComplete, TaskId};
use crate::events::SubscriberGroup;
use crate::tasks::ResolvedTask;

/// Specification for running a resolved task.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use channel_tasks::{SubscriberGroup, TaskId, TaskRegistry, TaskSpec, builtin};
///
/// let registry = TaskRegistry::with_builtins();
/// let inputs = json!({"duration": 0.1}).as_object().cloned().unwrap_or_default();
/// let resolved = registry.resolve(builtin::SLEEP_TEST, inputs).unwrap();
///
/// let spec = TaskSpec::new(resolved)
///     .with_id(TaskId::new("req-1.0"))
///     .with_group(SubscriberGroup::new("alice"));
/// assert_eq!(spec.id().map(TaskId::as_str), Some("req-1.0"));
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: ResolvedTask,
    id: Option<TaskId>,
    group: SubscriberGroup,
    callbacks: Vec<Arc<dyn OnComplete>>,
}

impl TaskSpec {
    /// Creates a spec with a generated id, the default group and no callbacks.
    pub fn new(task: ResolvedTask) -> Self {
        Self {
            task,
            id: None,
            group: SubscriberGroup::default(),
            callbacks: Vec::new(),
        }
    }

    /// Returns a new spec with an explicit correlation id.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns a new spec targeting `group`.
    pub fn with_group(mut self, group: SubscriberGroup) -> Self {
        self.group = group;
        self
    }

    /// Returns a new spec with one more completion callback.
    pub fn with_callback(mut self, callback: Arc<dyn OnComplete>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn task(&self) -> &ResolvedTask {
        &self.task
    }

    pub fn id(&self) -> Option<&TaskId> {
        self.id.as_ref()
    }

    pub fn group(&self) -> &SubscriberGroup {
        &self.group
    }

    pub fn callbacks(&self) -> &[Arc<dyn OnComplete>] {
        &self.callbacks
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        ResolvedTask,
        Option<TaskId>,
        SubscriberGroup,
        Vec<Arc<dyn OnComplete>>,
    ) {
        (self.task, self.id, self.group, self.callbacks)
    }
}
