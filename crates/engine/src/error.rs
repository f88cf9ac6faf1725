//! Engine-level error types.

use thiserror::Error;

use crate::state::TaskState;
use crate::task::TaskId;

/// Errors produced by the workflow engine (structure, execution, serialization).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Structural errors ------

    /// Two task specs of the same workflow spec share a name.
    #[error("duplicate task spec name: '{0}'")]
    DuplicateTaskSpec(String),

    /// A spec id or name that the graph does not know.
    #[error("unknown task spec '{0}'")]
    UnknownTaskSpec(String),

    /// A task id that is not (or no longer) in the tree.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// No reachable task carries this uuid.
    #[error("no task with id {0}")]
    TaskNotFound(uuid::Uuid),

    /// Topological sort detected a cycle.
    #[error("task spec graph contains a cycle")]
    CycleDetected,

    /// An edge recorded on one side only.
    #[error("edge '{from}' -> '{to}' is not mirrored on both task specs")]
    AsymmetricEdge { from: String, to: String },

    /// The start task of a workflow spec was given an input.
    #[error("start task '{0}' cannot have inputs")]
    StartHasInputs(String),

    /// A nested workflow ends in more than one leaf.
    #[error(
        "ambiguous convergence: sub-workflow '{subworkflow}' spliced at '{task}' ends in \
         {tails} leaves; merge nested branches before composing into a sub-workflow"
    )]
    AmbiguousConvergence {
        task: String,
        subworkflow: String,
        tails: usize,
    },

    /// A sub-workflow spec whose edges were already rewritten by a splice.
    #[error("task spec '{0}' has already been spliced in this workflow")]
    SpliceReentered(String),

    /// `ready` ran on a sub-workflow task that has no nested workflow.
    #[error("task '{0}' has no spliced sub-workflow")]
    NotSpliced(String),

    /// Child synchronisation tried to drop a child that is no longer speculative.
    #[error("cannot remove non-predicted child '{child}' of '{task}'")]
    NonPredictedRemoval { task: String, child: String },

    /// A definite child was about to be attached under a speculative parent.
    #[error("cannot add {state} child '{child}' to predicted task '{task}'")]
    NonPredictedChild {
        task: String,
        child: String,
        state: TaskState,
    },

    /// A state change against the lifecycle lattice.
    #[error("task {task} cannot move from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskState,
        to: TaskState,
    },

    /// Completion was attempted on a task that is not READY or INCOMPLETE.
    #[error("task '{task}' is {state}, not ready for completion")]
    TaskNotReady { task: String, state: TaskState },

    // ------ Execution errors ------

    /// A leaf task failed and the engine is configured to abort on failure.
    #[error("task '{task}' failed: {detail}")]
    TaskFailed { task: String, detail: String },

    // ------ Serialization errors ------

    /// A serialized task spec names a variant the serializer does not know.
    #[error("unknown task spec kind '{0}'")]
    UnknownSpecKind(String),

    /// Callback resolution failed.
    #[error(transparent)]
    Callback(#[from] nodes::NodeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// True for invariant violations in the spec graph or the task tree.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::TaskFailed { .. }
                | Self::UnknownSpecKind(_)
                | Self::Callback(_)
                | Self::Serialization(_)
        )
    }
}
