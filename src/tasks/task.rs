//! # Runnable abstraction.
//!
//! A [`Runnable`] is a named asynchronous unit of work. It declares its input
//! parameters, receives its inputs as a JSON object, and returns a JSON value.
//! A [`CancellationToken`] is passed in so long bodies can stop cooperatively.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::Param;

/// Task inputs: a JSON object keyed by parameter name.
pub type Inputs = serde_json::Map<String, Value>;

/// Shared handle to a runnable.
pub type TaskRef = Arc<dyn Runnable>;

/// # Asynchronous, cancelable unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use tokio_util::sync::CancellationToken;
/// use channel_tasks::{Inputs, Param, Runnable, TaskError};
///
/// struct Echo {
///     params: Vec<Param>,
/// }
///
/// #[async_trait]
/// impl Runnable for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     fn params(&self) -> &[Param] { &self.params }
///
///     async fn run(&self, _ctx: CancellationToken, inputs: Inputs) -> Result<Value, TaskError> {
///         Ok(inputs.get("text").cloned().unwrap_or(Value::Null))
///     }
/// }
/// ```
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Returns a stable, human-readable short name.
    fn name(&self) -> &str;

    /// Declared input parameters.
    fn params(&self) -> &[Param];

    /// Executes the body with already validated inputs.
    ///
    /// Returning `Err(TaskError::Canceled)` marks the task as cancelled.
    async fn run(&self, ctx: CancellationToken, inputs: Inputs) -> Result<Value, TaskError>;
}
