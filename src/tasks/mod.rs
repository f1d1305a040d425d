//! # Runnables, parameters, and the task registry.
//!
//! This module provides the task-side types:
//! - [`Runnable`] - trait for async, cancelable units of work taking JSON inputs
//! - [`TaskFn`] - closure-backed runnable
//! - [`Param`] - declared input parameter (required or optional)
//! - [`TaskRegistry`] - dotted name → runnable table with input validation
//! - [`ResolvedTask`] - a runnable bound to validated inputs
//! - [`TaskSpec`] - a resolved task plus scheduling metadata for the runner
//! - [`builtin`] - runnables shipped with the crate

pub mod builtin;
mod params;
mod registry;
mod spec;
mod task;
mod task_fn;

pub use params::Param;
pub use registry::{ResolvedTask, TaskRegistry};
pub use spec::TaskSpec;
pub use task::{Inputs, Runnable, TaskRef};
pub use task_fn::TaskFn;
