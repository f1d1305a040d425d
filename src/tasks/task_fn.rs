//! # Function-backed runnable (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(CancellationToken, Inputs) -> Fut`, producing a
//! fresh future per run. If shared state is needed, capture an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use serde_json::Value;
//! use tokio_util::sync::CancellationToken;
//! use channel_tasks::{Inputs, Param, TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc(
//!     "greet",
//!     [Param::required("who")],
//!     |_ctx: CancellationToken, inputs: Inputs| async move {
//!         let who = inputs.get("who").and_then(Value::as_str).unwrap_or("nobody");
//!         Ok::<_, TaskError>(Value::from(format!("hello {who}")))
//!     },
//! );
//!
//! assert_eq!(t.name(), "greet");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{Inputs, Param, Runnable};

/// Function-backed runnable.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    params: Vec<Param>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed runnable.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        params: impl IntoIterator<Item = Param>,
        f: F,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            f,
        }
    }

    /// Creates the runnable and returns it as a shared handle.
    pub fn arc(
        name: impl Into<Cow<'static, str>>,
        params: impl IntoIterator<Item = Param>,
        f: F,
    ) -> Arc<Self> {
        Arc::new(Self::new(name, params, f))
    }
}

#[async_trait]
impl<F, Fut> Runnable for TaskFn<F>
where
    F: Fn(CancellationToken, Inputs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &[Param] {
        &self.params
    }

    async fn run(&self, ctx: CancellationToken, inputs: Inputs) -> Result<Value, TaskError> {
        (self.f)(ctx, inputs).await
    }
}
