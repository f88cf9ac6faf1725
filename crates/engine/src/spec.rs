//! The `TaskSpec` trait: the lifecycle hooks every task spec variant
//! implements.
//!
//! The [`Workflow`] driver calls the hooks of a task's spec in a fixed order:
//! `predict`, then `before_ready`, then `ready`, then `complete_attempt`
//! (possibly repeatedly while it reports [`Completion::Incomplete`]).
//! `on_trigger` runs whenever an external trigger targets the task.

use std::fmt;

use serde_json::Value;

use crate::serializer::Serializer;
use crate::state::TaskState;
use crate::task::TaskId;
use crate::{EngineError, Workflow};

/// Result of a completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The task's effect happened; it becomes COMPLETED.
    Done,
    /// Not yet; the task becomes INCOMPLETE and is retried on a later pass.
    Incomplete,
    /// The effect failed; the task becomes FAILED with this detail.
    Failed(String),
    /// The task already failed and must not run again. Nothing happened.
    Refused,
}

/// Behaviour of a node in the spec graph.
///
/// Graph identity (name, inputs, outputs) lives in [`crate::SpecNode`]; a
/// `TaskSpec` only carries what its variant needs to act. Hooks receive the
/// whole workflow so they can inspect and reshape the task tree.
pub trait TaskSpec: fmt::Debug + Send + Sync {
    /// Stable variant tag, used by serializers.
    fn kind(&self) -> &'static str;

    /// Synchronise `task`'s children with the successors this spec expects.
    /// Must be idempotent.
    fn predict(&self, workflow: &mut Workflow, task: TaskId) -> Result<(), EngineError> {
        predict_outputs(workflow, task)
    }

    /// Runs once before the task turns READY. May reshape the tree.
    fn before_ready(&self, _workflow: &mut Workflow, _task: TaskId) -> Result<(), EngineError> {
        Ok(())
    }

    /// Runs once right after the task turned READY.
    fn ready(&self, _workflow: &mut Workflow, _task: TaskId) -> Result<(), EngineError> {
        Ok(())
    }

    /// Perform the task's effect.
    fn complete_attempt(
        &self,
        _workflow: &mut Workflow,
        _task: TaskId,
    ) -> Result<Completion, EngineError> {
        Ok(Completion::Done)
    }

    /// An external trigger reached the task.
    fn on_trigger(&self, workflow: &mut Workflow, task: TaskId) -> Result<(), EngineError> {
        workflow.task_mut(task)?.triggered = true;
        Ok(())
    }

    /// Surface this variant's fields to a serializer.
    fn serialize(&self, serializer: &dyn Serializer) -> Result<Value, EngineError>;
}

/// Default prediction: one child per declared output.
///
/// Children of a definite task are FUTURE; children of a speculative task
/// inherit its state. Existing children whose spec is still an output are
/// kept untouched.
pub fn predict_outputs(workflow: &mut Workflow, task: TaskId) -> Result<(), EngineError> {
    let spec = workflow.task(task)?.spec();
    let outputs = workflow.graph().node(spec)?.outputs().to_vec();
    sync_with_best_state(workflow, task, &outputs)
}

/// Synchronise children with `specs`, using the state rule of
/// [`predict_outputs`], and pull speculative children up to that state.
pub(crate) fn sync_with_best_state(
    workflow: &mut Workflow,
    task: TaskId,
    specs: &[crate::SpecId],
) -> Result<(), EngineError> {
    let state = workflow.task(task)?.state();
    let best = if state.is_definite() {
        TaskState::Future
    } else {
        state
    };

    workflow.sync_children(task, specs, best)?;

    for child in workflow.task(task)?.children().to_vec() {
        let child_state = workflow.task(child)?.state();
        if child_state.is_predicted() && !child_state.is_definite() {
            workflow.set_task_state(child, best)?;
        }
    }
    Ok(())
}
