//! Runner core: task handles, execution, and the dispatcher.
//!
//! The public surface is [`TaskRunner`] (built through [`RunnerBuilder`]), the
//! [`TaskHandle`] record it hands out, and the [`OnComplete`] callback hook.
//!
//! Internal modules:
//! - `dispatcher`: single-writer loop owning the live index, publishing events;
//! - `execute`: runs one body to an outcome (errors, panics, cancellation);
//! - `callback`: completion hooks and their isolated execution.

mod builder;
mod callback;
mod dispatcher;
mod execute;
mod handle;
mod runner;

pub use builder::RunnerBuilder;
pub use callback::{CallbackFn, OnComplete};
pub use handle::{ErrorInfo, TaskHandle, TaskId, TaskStatus};
pub use runner::TaskRunner;
