//! # Run one task body to its outcome.
//!
//! ```text
//! Success:      run() → Ok(value)            → Outcome::Success(value)
//! Failure:      run() → Err(Fail | Input)    → Outcome::Error(kind, message, trace)
//! Panic:        run() panics                 → Outcome::Error(kind = "Panic")
//! Cancellation: token cancelled              → Outcome::Cancelled (body dropped)
//!               run() → Err(Canceled)        → Outcome::Cancelled
//! ```
//!
//! ## Rules
//! - Always yields **exactly one** outcome; failures never escape as errors or panics.
//! - Cancellation wins over a result that becomes ready in the same poll.
//! - Cancellation is cooperative: a body is only stopped at its await points.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::handle::{ErrorInfo, Outcome, TaskId};
use crate::error::TaskError;
use crate::subscribers::panic_message;
use crate::tasks::{Inputs, TaskRef};

/// Executes `task` with `inputs` until it returns, panics, or `token` is cancelled.
pub(crate) async fn execute(
    id: &TaskId,
    name: &str,
    task: TaskRef,
    inputs: Inputs,
    token: CancellationToken,
) -> Outcome {
    let body = AssertUnwindSafe(task.run(token.clone(), inputs)).catch_unwind();

    let res = tokio::select! {
        biased;
        _ = token.cancelled() => return Outcome::Cancelled,
        res = body => res,
    };

    match res {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(TaskError::Canceled)) => Outcome::Cancelled,
        Ok(Err(err)) => {
            let trace = format!("{err:?}");
            tracing::error!(
                task_id = %id,
                registered_task = name,
                error = %err,
                label = err.as_label(),
                %trace,
                "task execution failed"
            );
            Outcome::Error(ErrorInfo {
                kind: err.kind().to_string(),
                message: err.message().to_string(),
                trace,
            })
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            let trace = format!("task '{name}' panicked: {message}");
            tracing::error!(task_id = %id, registered_task = name, %trace, "task panicked");
            Outcome::Error(ErrorInfo {
                kind: "Panic".to_string(),
                message,
                trace,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    async fn run(task: TaskRef, token: CancellationToken) -> Outcome {
        execute(&TaskId::new("t"), "app.job", task, Inputs::new(), token).await
    }

    #[tokio::test]
    async fn success_and_failure() {
        let ok = TaskFn::arc("ok", [], |_ctx: CancellationToken, _inputs: Inputs| async {
            Ok::<_, TaskError>(json!("done"))
        });
        assert_eq!(
            run(ok, CancellationToken::new()).await,
            Outcome::Success(json!("done"))
        );

        let failing = TaskFn::arc("failing", [], |_ctx: CancellationToken, _inputs: Inputs| async {
            Err::<Value, _>(TaskError::fail("Fake error"))
        });
        match run(failing, CancellationToken::new()).await {
            Outcome::Error(info) => {
                assert_eq!(info.kind, "Fail");
                assert!(info.message.contains("Fake error"));
                assert!(info.trace.contains("Fake error"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn panic_is_captured() {
        let panicking = TaskFn::arc("panicking", [], |_ctx: CancellationToken, _inputs: Inputs| async {
            panic!("kaboom");
            Ok::<Value, TaskError>(Value::Null)
        });
        match run(panicking, CancellationToken::new()).await {
            Outcome::Error(info) => {
                assert_eq!(info.kind, "Panic");
                assert_eq!(info.message, "kaboom");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_body() {
        let slow = TaskFn::arc("slow", [], |_ctx: CancellationToken, _inputs: Inputs| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, TaskError>(Value::Null)
        });
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        assert_eq!(run(slow, token).await, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn cooperative_cancel_maps_to_cancelled() {
        let polite: TaskRef = Arc::new(TaskFn::new("polite", [], |_ctx: CancellationToken, _inputs: Inputs| async {
            Err::<Value, _>(TaskError::Canceled)
        }));
        assert_eq!(run(polite, CancellationToken::new()).await, Outcome::Cancelled);
    }
}
