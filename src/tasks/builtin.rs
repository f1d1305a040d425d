//! Runnables shipped with the crate, registered by [`TaskRegistry::with_builtins`].
//!
//! [`TaskRegistry::with_builtins`]: crate::TaskRegistry::with_builtins

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{Inputs, Param, TaskFn, TaskRef};

/// Dotted name of [`sleep_test`] in [`TaskRegistry::with_builtins`](crate::TaskRegistry::with_builtins).
pub const SLEEP_TEST: &str = "channel_tasks.tasks.sleep_test";

pub(crate) fn all() -> Vec<(&'static str, TaskRef)> {
    vec![(SLEEP_TEST, sleep_test())]
}

/// Sleeps `duration` seconds, then fails with `"Test error"` if `raise_error` is set,
/// otherwise returns `"Slept for {duration} seconds"`.
pub fn sleep_test() -> TaskRef {
    TaskFn::arc(
        "sleep_test",
        [Param::required("duration"), Param::optional("raise_error")],
        |_ctx: CancellationToken, inputs: Inputs| sleep_body(inputs),
    )
}

async fn sleep_body(inputs: Inputs) -> Result<Value, TaskError> {
    let duration = inputs
        .get("duration")
        .and_then(Value::as_f64)
        .ok_or_else(|| TaskError::input("'duration' must be a number"))?;
    let raise_error = match inputs.get("raise_error") {
        None | Some(Value::Null) => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| TaskError::input("'raise_error' must be a boolean"))?,
    };
    let pause = Duration::try_from_secs_f64(duration).map_err(TaskError::input)?;

    tokio::time::sleep(pause).await;

    if raise_error {
        return Err(TaskError::fail("Test error"));
    }
    Ok(Value::from(format!("Slept for {duration} seconds")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Runnable;
    use serde_json::json;

    fn inputs(v: Value) -> Inputs {
        match v {
            Value::Object(map) => map,
            _ => unreachable!("test inputs must be objects"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_test_outputs() {
        let task = sleep_test();

        let ok = task
            .run(CancellationToken::new(), inputs(json!({"duration": 0.1})))
            .await;
        assert_eq!(ok, Ok(Value::from("Slept for 0.1 seconds")));

        let failed = task
            .run(
                CancellationToken::new(),
                inputs(json!({"duration": 0.15, "raise_error": true})),
            )
            .await;
        assert_eq!(failed, Err(TaskError::fail("Test error")));
    }

    #[tokio::test]
    async fn sleep_test_rejects_bad_duration() {
        let task = sleep_test();

        let err = task
            .run(CancellationToken::new(), inputs(json!({"duration": -1.0})))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "task_bad_input");
    }
}
