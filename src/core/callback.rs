//! Completion callbacks.
//!
//! Callbacks attached to a [`TaskSpec`](crate::TaskSpec) run once the task's terminal
//! event is published. They receive a snapshot of the final handle, run in
//! registration order on the runner's runtime, and never influence the task's status:
//! errors and panics are logged and the next callback still runs.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use super::TaskHandle;
use crate::error::CallbackError;
use crate::subscribers::panic_message;

/// Hook invoked with the terminal [`TaskHandle`] of a task.
#[async_trait]
pub trait OnComplete: Send + Sync + 'static {
    async fn on_complete(&self, handle: &TaskHandle) -> Result<(), CallbackError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed [`OnComplete`].
///
/// ```rust
/// use channel_tasks::{CallbackFn, TaskHandle};
///
/// let audit = CallbackFn::arc("audit", |handle: TaskHandle| async move {
///     println!("{} finished as {}", handle.id, handle.status);
///     Ok::<(), channel_tasks::CallbackError>(())
/// });
/// # let _ = audit;
/// ```
pub struct CallbackFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> CallbackFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> OnComplete for CallbackFn<F>
where
    F: Fn(TaskHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
{
    async fn on_complete(&self, handle: &TaskHandle) -> Result<(), CallbackError> {
        (self.f)(handle.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Runs `callbacks` in order, isolating failures and panics.
pub(crate) async fn run_callbacks(callbacks: &[Arc<dyn OnComplete>], handle: &TaskHandle) {
    for cb in callbacks {
        match std::panic::AssertUnwindSafe(cb.on_complete(handle))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(
                    task_id = %handle.id,
                    callback = cb.name(),
                    error = %err,
                    "completion callback failed"
                );
            }
            Err(panic) => {
                tracing::error!(
                    task_id = %handle.id,
                    callback = cb.name(),
                    panic = %panic_message(panic.as_ref()),
                    "completion callback panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskId;
    use tokio::sync::Mutex;

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn failures_do_not_stop_later_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = TaskHandle::started(TaskId::new("t"), "app.job");

        let failing = CallbackFn::arc("failing", |_h: TaskHandle| async {
            Err::<(), _>(CallbackError {
                error: "disk full".into(),
            })
        });
        let panicking = CallbackFn::arc("panicking", |_h: TaskHandle| async {
            panic!("boom");
            Ok::<(), CallbackError>(())
        });
        let recorder = {
            let seen = Arc::clone(&seen);
            CallbackFn::arc("recorder", move |h: TaskHandle| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().await.push(h.id.to_string());
                    Ok::<(), CallbackError>(())
                }
            })
        };

        let callbacks: Vec<Arc<dyn OnComplete>> = vec![failing, panicking, recorder];
        run_callbacks(&callbacks, &handle).await;

        assert_eq!(*seen.lock().await, ["t"]);
        assert_eq!(callbacks[2].name(), "recorder");
    }
}
