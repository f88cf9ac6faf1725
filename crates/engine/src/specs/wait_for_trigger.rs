use serde_json::Value;
use tracing::debug;

use crate::graph::SpecId;
use crate::serializer::Serializer;
use crate::spec::{Completion, TaskSpec};
use crate::state::TaskState;
use crate::task::TaskId;
use crate::specs::Function;
use crate::{EngineError, Workflow, WorkflowSpec};

/// A [`Function`] that stays INCOMPLETE until the task has been triggered.
///
/// The gate does not poll; it re-checks the flag on every completion
/// attempt the driver makes.
#[derive(Debug, Clone)]
pub struct WaitForTrigger {
    function: Function,
}

impl WaitForTrigger {
    pub fn new(function: Function) -> Self {
        Self { function }
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn deserialize(
        serializer: &dyn Serializer,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        serializer.deserialize_wait_for_trigger(wf_spec, name, state)
    }
}

impl TaskSpec for WaitForTrigger {
    fn kind(&self) -> &'static str {
        "wait_for_trigger"
    }

    fn complete_attempt(&self, workflow: &mut Workflow, task: TaskId) -> Result<Completion, EngineError> {
        let task_ref = workflow.task(task)?;
        if task_ref.state() == TaskState::Failed {
            return Ok(Completion::Refused);
        }
        if !task_ref.is_triggered() {
            debug!(task = %task, "waiting for trigger");
            return Ok(Completion::Incomplete);
        }
        self.function.attempt(workflow, task)
    }

    fn serialize(&self, serializer: &dyn Serializer) -> Result<Value, EngineError> {
        serializer.serialize_wait_for_trigger(self)
    }
}
