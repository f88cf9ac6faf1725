use serde_json::Value;

use crate::graph::SpecId;
use crate::serializer::Serializer;
use crate::spec::TaskSpec;
use crate::{EngineError, WorkflowSpec};

/// A task with no effect of its own: completes as soon as it is attempted
/// and fans out to all of its outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simple;

impl Simple {
    pub fn deserialize(
        serializer: &dyn Serializer,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        serializer.deserialize_simple(wf_spec, name, state)
    }
}

impl TaskSpec for Simple {
    fn kind(&self) -> &'static str {
        "simple"
    }

    fn serialize(&self, serializer: &dyn Serializer) -> Result<Value, EngineError> {
        serializer.serialize_simple(self)
    }
}

/// The entry task every workflow spec starts with.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartTask;

impl StartTask {
    pub fn deserialize(
        serializer: &dyn Serializer,
        wf_spec: &mut WorkflowSpec,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        serializer.deserialize_start_task(wf_spec, state)
    }
}

impl TaskSpec for StartTask {
    fn kind(&self) -> &'static str {
        "start"
    }

    fn serialize(&self, serializer: &dyn Serializer) -> Result<Value, EngineError> {
        serializer.serialize_start_task(self)
    }
}
