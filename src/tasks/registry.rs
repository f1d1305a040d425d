//! # Task registry - dotted name → runnable table.
//!
//! The registry is populated once at process start (explicit [`TaskRegistry::register`]
//! calls, typically wrapped into an `Arc` afterwards) and then only read.
//!
//! ## Resolution
//! ```text
//! resolve("app.jobs.sleep", inputs)
//!   ├─► split at the last '.' → namespace "app.jobs", short name "sleep"
//!   ├─► no match             → ValidationError (name: "Task '...' not found.")
//!   └─► check inputs against declared params
//!         ├─► missing required keys ─┐
//!         ├─► unknown keys ──────────┴─► one ValidationError listing both
//!         └─► ok → ResolvedTask
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{Field, RegistryError, ValidationError};
use crate::tasks::{Inputs, TaskRef};

/// A runnable bound to validated inputs. Immutable once resolved.
#[derive(Clone)]
pub struct ResolvedTask {
    registered_task: String,
    task: TaskRef,
    inputs: Inputs,
}

impl ResolvedTask {
    /// The dotted name the task was resolved from.
    pub fn registered_task(&self) -> &str {
        &self.registered_task
    }

    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub(crate) fn into_parts(self) -> (String, TaskRef, Inputs) {
        (self.registered_task, self.task, self.inputs)
    }
}

impl fmt::Debug for ResolvedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTask")
            .field("registered_task", &self.registered_task)
            .field("inputs", &self.inputs)
            .finish()
    }
}

/// Process-wide table of runnables keyed by dotted name.
#[derive(Default)]
pub struct TaskRegistry {
    namespaces: HashMap<String, HashMap<String, TaskRef>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the [`builtin`](crate::tasks::builtin) runnables.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, task) in super::builtin::all() {
            if let Err(err) = registry.register(name, task) {
                tracing::error!(name, error = %err, label = err.as_label(), "failed to register builtin task");
            }
        }
        registry
    }

    /// Registers `task` under the dotted `name`.
    pub fn register(&mut self, name: &str, task: TaskRef) -> Result<(), RegistryError> {
        let name = name.trim();
        let (namespace, short) = split_dotted(name).ok_or_else(|| RegistryError::InvalidName {
            name: name.to_string(),
        })?;

        let entries = self.namespaces.entry(namespace.to_string()).or_default();
        if entries.contains_key(short) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        entries.insert(short.to_string(), task);
        tracing::debug!(registered_task = name, "registered runnable");
        Ok(())
    }

    /// Looks up the runnable for `name` and validates `inputs` against its parameters.
    pub fn resolve(&self, name: &str, inputs: Inputs) -> Result<ResolvedTask, ValidationError> {
        let name = name.trim();
        let task = self
            .lookup(name)
            .ok_or_else(|| ValidationError::not_found(name))?;

        check_inputs(task, &inputs)?;

        Ok(ResolvedTask {
            registered_task: name.to_string(),
            task: task.clone(),
            inputs,
        })
    }

    /// Sorted list of registered dotted names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .iter()
            .flat_map(|(ns, entries)| entries.keys().map(move |short| format!("{ns}.{short}")))
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, name: &str) -> Option<&TaskRef> {
        let (namespace, short) = split_dotted(name)?;
        self.namespaces.get(namespace)?.get(short)
    }
}

fn split_dotted(name: &str) -> Option<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((ns, short)) if !ns.is_empty() && !short.is_empty() => Some((ns, short)),
        _ => None,
    }
}

/// Both checks always run so the caller sees every problem at once.
fn check_inputs(task: &TaskRef, inputs: &Inputs) -> Result<(), ValidationError> {
    let params = task.params();
    let given: BTreeSet<&str> = inputs.keys().map(String::as_str).collect();

    let missing: Vec<&str> = params
        .iter()
        .filter(|p| p.is_required() && !given.contains(p.key()))
        .map(|p| p.key())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let unknown: Vec<&str> = given
        .iter()
        .copied()
        .filter(|k| !params.iter().any(|p| p.key() == *k))
        .collect();

    let mut err = ValidationError::new();
    if !missing.is_empty() {
        err.push(Field::Inputs, format!("Missing required parameters {missing:?}."));
    }
    if !unknown.is_empty() {
        err.push(Field::Inputs, format!("Unknown parameters {unknown:?}."));
    }

    if err.is_empty() { Ok(()) } else { Err(err) }
}
