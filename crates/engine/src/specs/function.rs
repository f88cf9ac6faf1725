use std::fmt;
use std::sync::Arc;

use nodes::{Callback, CallbackOutcome, CallbackRegistry, TaskContext};
use serde_json::Value;
use tracing::debug;

use crate::graph::SpecId;
use crate::serializer::Serializer;
use crate::spec::{Completion, TaskSpec};
use crate::state::TaskState;
use crate::task::TaskId;
use crate::{EngineError, Workflow, WorkflowSpec};

/// Calls a callback with fixed arguments followed by the task.
///
/// - [`CallbackOutcome::Done`] completes the task.
/// - [`CallbackOutcome::Retry`] leaves it INCOMPLETE for a later pass.
/// - [`CallbackOutcome::Failed`] fails it, keeping the error chain as detail.
///
/// A task that already failed is never called again.
#[derive(Clone)]
pub struct Function {
    callback_name: String,
    callback: Arc<dyn Callback>,
    args: Vec<Value>,
}

impl Function {
    /// `callback_name` is the identifier serializers use to find the
    /// callback again.
    pub fn new(callback_name: impl Into<String>, callback: Arc<dyn Callback>, args: Vec<Value>) -> Self {
        Self {
            callback_name: callback_name.into(),
            callback,
            args,
        }
    }

    /// Wrap a plain function or closure.
    pub fn from_fn<F>(callback_name: impl Into<String>, f: F, args: Vec<Value>) -> Self
    where
        F: Fn(&[Value], &mut TaskContext<'_>) -> CallbackOutcome + Send + Sync + 'static,
    {
        Self::new(callback_name, Arc::new(f), args)
    }

    /// Resolve the callback from a registry.
    pub fn from_registry(
        registry: &CallbackRegistry,
        callback_name: &str,
        args: Vec<Value>,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(callback_name, registry.get(callback_name)?, args))
    }

    pub fn callback_name(&self) -> &str {
        &self.callback_name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn deserialize(
        serializer: &dyn Serializer,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        serializer.deserialize_function(wf_spec, name, state)
    }

    fn try_fire(&self, workflow: &mut Workflow, task: TaskId) -> Result<CallbackOutcome, EngineError> {
        workflow.with_task_context(task, |ctx| self.callback.call(&self.args, ctx))
    }

    pub(crate) fn attempt(&self, workflow: &mut Workflow, task: TaskId) -> Result<Completion, EngineError> {
        if workflow.task(task)?.state() == TaskState::Failed {
            return Ok(Completion::Refused);
        }

        debug!(task = %task, callback = %self.callback_name, "invoking callback");
        let completion = match self.try_fire(workflow, task)? {
            CallbackOutcome::Done => Completion::Done,
            CallbackOutcome::Retry => Completion::Incomplete,
            CallbackOutcome::Failed(err) => {
                let detail = format!("{err:?}");
                if detail.trim().is_empty() {
                    Completion::Failed(format!("callback '{}' failed", self.callback_name))
                } else {
                    Completion::Failed(detail)
                }
            }
        };
        Ok(completion)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("callback", &self.callback_name)
            .field("args", &self.args)
            .finish()
    }
}

impl TaskSpec for Function {
    fn kind(&self) -> &'static str {
        "function"
    }

    fn complete_attempt(&self, workflow: &mut Workflow, task: TaskId) -> Result<Completion, EngineError> {
        self.attempt(workflow, task)
    }

    fn serialize(&self, serializer: &dyn Serializer) -> Result<Value, EngineError> {
        serializer.serialize_function(self)
    }
}
