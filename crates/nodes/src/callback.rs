//! The `Callback` trait, the contract every leaf task callback must fulfil.

use std::fmt;

use serde_json::{Map, Value};
use uuid::Uuid;

/// View of the running task handed to a callback.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// callbacks can import it without a circular dependency.
#[derive(Debug)]
pub struct TaskContext<'a> {
    /// ID of the workflow the task runs in.
    pub workflow_id: Uuid,
    /// Stable identity of the task instance.
    pub task_id: Uuid,
    /// Name of the task spec the task instantiates.
    pub task_name: &'a str,
    /// Whether an external trigger has reached this task.
    pub triggered: bool,
    /// The task's data, writable in place.
    pub data: &'a mut Map<String, Value>,
}

impl TaskContext<'_> {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }
}

/// What a callback reports back to the engine.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// The work is finished; the task completes.
    Done,
    /// Not finished yet; the task is left INCOMPLETE and retried later.
    Retry,
    /// The work failed; the task is marked FAILED with this error as detail.
    Failed(anyhow::Error),
}

impl CallbackOutcome {
    /// Shorthand for a failure carrying only a message.
    pub fn failed(message: impl fmt::Display) -> Self {
        Self::Failed(anyhow::anyhow!("{message}"))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<bool> for CallbackOutcome {
    fn from(done: bool) -> Self {
        if done {
            Self::Done
        } else {
            Self::Retry
        }
    }
}

impl<E> From<Result<bool, E>> for CallbackOutcome
where
    E: Into<anyhow::Error>,
{
    fn from(result: Result<bool, E>) -> Self {
        match result {
            Ok(done) => done.into(),
            Err(err) => Self::Failed(err.into()),
        }
    }
}

/// A unit of work attached to a leaf task.
///
/// Called with the task spec's configured arguments followed by the task
/// itself. Implementations must not block; long-running work should be
/// started on the first call and polled on later ones via [`CallbackOutcome::Retry`].
pub trait Callback: Send + Sync {
    fn call(&self, args: &[Value], task: &mut TaskContext<'_>) -> CallbackOutcome;
}

impl<F> Callback for F
where
    F: Fn(&[Value], &mut TaskContext<'_>) -> CallbackOutcome + Send + Sync,
{
    fn call(&self, args: &[Value], task: &mut TaskContext<'_>) -> CallbackOutcome {
        self(args, task)
    }
}
