//! Serialization of workflow specs.
//!
//! Every task spec variant hands its fields to a [`Serializer`] through
//! [`crate::TaskSpec::serialize`], and is rebuilt through the variant's
//! associated `deserialize` factory. The wire format is the serializer's
//! business; [`JsonSerializer`] is the JSON one.

use std::collections::HashMap;

use nodes::CallbackRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::graph::SpecId;
use crate::operators::Assign;
use crate::specs::{Function, Simple, StartTask, SubWorkflow, WaitForTrigger};
use crate::{EngineError, WorkflowSpec};

/// Per-variant (de)serialization hooks.
pub trait Serializer {
    fn serialize_simple(&self, spec: &Simple) -> Result<Value, EngineError>;
    fn serialize_start_task(&self, spec: &StartTask) -> Result<Value, EngineError>;
    fn serialize_function(&self, spec: &Function) -> Result<Value, EngineError>;
    fn serialize_wait_for_trigger(&self, spec: &WaitForTrigger) -> Result<Value, EngineError>;
    fn serialize_sub_workflow(&self, spec: &SubWorkflow) -> Result<Value, EngineError>;

    fn deserialize_simple(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError>;
    fn deserialize_start_task(
        &self,
        wf_spec: &mut WorkflowSpec,
        state: &Value,
    ) -> Result<SpecId, EngineError>;
    fn deserialize_function(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError>;
    fn deserialize_wait_for_trigger(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError>;
    fn deserialize_sub_workflow(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError>;
}

// ---------------------------------------------------------------------------
// JSON document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct WorkflowSpecDoc {
    name: String,
    task_specs: Vec<TaskSpecDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskSpecDoc {
    name: String,
    kind: String,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    state: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionDoc {
    callback: String,
    #[serde(default)]
    args: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubWorkflowDoc {
    workflow_spec: Value,
    #[serde(default)]
    in_assign: Vec<Assign>,
    #[serde(default)]
    out_assign: Vec<Assign>,
}

// ---------------------------------------------------------------------------
// JsonSerializer
// ---------------------------------------------------------------------------

/// Serializes workflow specs to and from JSON. Callbacks are written by
/// identifier and resolved through the registry on the way back.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    registry: CallbackRegistry,
}

impl JsonSerializer {
    pub fn new(registry: CallbackRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn serialize_workflow_spec(&self, spec: &WorkflowSpec) -> Result<Value, EngineError> {
        let graph = spec.graph();
        let mut task_specs = Vec::with_capacity(graph.len());
        for (_, node) in graph.nodes() {
            let outputs = node
                .outputs()
                .iter()
                .map(|id| graph.node(*id).map(|out| out.name().to_owned()))
                .collect::<Result<Vec<_>, _>>()?;
            let behavior = node.behavior();
            task_specs.push(TaskSpecDoc {
                name: node.name().to_owned(),
                kind: behavior.kind().to_owned(),
                outputs,
                state: behavior.serialize(self)?,
            });
        }
        Ok(serde_json::to_value(WorkflowSpecDoc {
            name: spec.name().to_owned(),
            task_specs,
        })?)
    }

    /// Rebuild a workflow spec. Edges are wired by name once every task
    /// spec exists; the result is validated.
    pub fn deserialize_workflow_spec(&self, value: &Value) -> Result<WorkflowSpec, EngineError> {
        let doc: WorkflowSpecDoc = serde_json::from_value(value.clone())?;
        let mut spec = WorkflowSpec::new(doc.name.as_str());
        let mut ids: HashMap<&str, SpecId> = HashMap::new();

        for task_spec in &doc.task_specs {
            let name = task_spec.name.as_str();
            let state = &task_spec.state;
            let id = match task_spec.kind.as_str() {
                "start" => StartTask::deserialize(self, &mut spec, state)?,
                "simple" => Simple::deserialize(self, &mut spec, name, state)?,
                "function" => Function::deserialize(self, &mut spec, name, state)?,
                "wait_for_trigger" => WaitForTrigger::deserialize(self, &mut spec, name, state)?,
                "sub_workflow" => SubWorkflow::deserialize(self, &mut spec, name, state)?,
                other => return Err(EngineError::UnknownSpecKind(other.to_owned())),
            };
            ids.insert(name, id);
        }

        for task_spec in &doc.task_specs {
            let from = lookup(&ids, &task_spec.name)?;
            for output in &task_spec.outputs {
                spec.connect(from, lookup(&ids, output)?)?;
            }
        }

        spec.validate()?;
        debug!(spec = %spec.name(), task_specs = spec.graph().len(), "deserialized workflow spec");
        Ok(spec)
    }

    pub fn to_json(&self, spec: &WorkflowSpec) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.serialize_workflow_spec(spec)?)?)
    }

    pub fn from_json(&self, text: &str) -> Result<WorkflowSpec, EngineError> {
        let value: Value = serde_json::from_str(text)?;
        self.deserialize_workflow_spec(&value)
    }

    fn function_doc(spec: &Function) -> Result<Value, EngineError> {
        Ok(serde_json::to_value(FunctionDoc {
            callback: spec.callback_name().to_owned(),
            args: spec.args().to_vec(),
        })?)
    }

    fn function_from(&self, state: &Value) -> Result<Function, EngineError> {
        let doc: FunctionDoc = serde_json::from_value(state.clone())?;
        Function::from_registry(&self.registry, &doc.callback, doc.args)
    }
}

fn lookup(ids: &HashMap<&str, SpecId>, name: &str) -> Result<SpecId, EngineError> {
    ids.get(name)
        .copied()
        .ok_or_else(|| EngineError::UnknownTaskSpec(name.to_owned()))
}

impl Serializer for JsonSerializer {
    fn serialize_simple(&self, _spec: &Simple) -> Result<Value, EngineError> {
        Ok(json!({}))
    }

    fn serialize_start_task(&self, _spec: &StartTask) -> Result<Value, EngineError> {
        Ok(json!({}))
    }

    fn serialize_function(&self, spec: &Function) -> Result<Value, EngineError> {
        Self::function_doc(spec)
    }

    fn serialize_wait_for_trigger(&self, spec: &WaitForTrigger) -> Result<Value, EngineError> {
        Self::function_doc(spec.function())
    }

    fn serialize_sub_workflow(&self, spec: &SubWorkflow) -> Result<Value, EngineError> {
        Ok(serde_json::to_value(SubWorkflowDoc {
            workflow_spec: self.serialize_workflow_spec(spec.workflow_spec())?,
            in_assign: spec.in_assign().to_vec(),
            out_assign: spec.out_assign().to_vec(),
        })?)
    }

    fn deserialize_simple(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        _state: &Value,
    ) -> Result<SpecId, EngineError> {
        wf_spec.add(name, Simple)
    }

    /// Every workflow spec is born with its start task.
    fn deserialize_start_task(
        &self,
        wf_spec: &mut WorkflowSpec,
        _state: &Value,
    ) -> Result<SpecId, EngineError> {
        Ok(wf_spec.start())
    }

    fn deserialize_function(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        let function = self.function_from(state)?;
        wf_spec.add(name, function)
    }

    fn deserialize_wait_for_trigger(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        let function = self.function_from(state)?;
        wf_spec.add(name, WaitForTrigger::new(function))
    }

    fn deserialize_sub_workflow(
        &self,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        let doc: SubWorkflowDoc = serde_json::from_value(state.clone())?;
        let nested = self.deserialize_workflow_spec(&doc.workflow_spec)?;
        let spec = SubWorkflow::new(nested)
            .with_in_assign(doc.in_assign)
            .with_out_assign(doc.out_assign);
        wf_spec.add(name, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Workflow;

    fn serializer() -> JsonSerializer {
        let mut registry = CallbackRegistry::new();
        nodes::builtin::register_builtins(&mut registry).unwrap();
        JsonSerializer::new(registry)
    }

    fn document() -> Value {
        json!({
            "name": "host",
            "task_specs": [
                { "name": "Start", "kind": "start", "outputs": ["greet"] },
                {
                    "name": "greet",
                    "kind": "function",
                    "outputs": ["embed"],
                    "state": { "callback": "set_data", "args": ["greeting", "hello"] }
                },
                {
                    "name": "embed",
                    "kind": "sub_workflow",
                    "outputs": ["gate"],
                    "state": {
                        "workflow_spec": {
                            "name": "inner",
                            "task_specs": [
                                { "name": "Start", "kind": "start", "outputs": ["check"] },
                                {
                                    "name": "check",
                                    "kind": "function",
                                    "state": { "callback": "equals", "args": ["hello", "copied"] }
                                }
                            ]
                        },
                        "in_assign": [ { "left": "copied", "attribute": "greeting" } ]
                    }
                },
                {
                    "name": "gate",
                    "kind": "wait_for_trigger",
                    "outputs": ["End"],
                    "state": { "callback": "noop" }
                },
                { "name": "End", "kind": "simple" }
            ]
        })
    }

    #[test]
    fn document_builds_a_runnable_spec() {
        let spec = serializer().deserialize_workflow_spec(&document()).unwrap();
        assert_eq!(spec.name(), "host");
        assert_eq!(spec.graph().len(), 5);

        let mut workflow = Workflow::new(&spec).unwrap();
        workflow.complete_all().unwrap();
        let gate = workflow.tasks_named("gate")[0];
        assert_eq!(workflow.task(gate).unwrap().state(), crate::TaskState::Incomplete);

        workflow.trigger(gate).unwrap();
        workflow.complete_all().unwrap();
        assert!(workflow.is_completed());
    }

    #[test]
    fn serialized_form_survives_a_reload() {
        let serializer = serializer();
        let spec = serializer.deserialize_workflow_spec(&document()).unwrap();
        let first = serializer.serialize_workflow_spec(&spec).unwrap();
        let reloaded = serializer.deserialize_workflow_spec(&first).unwrap();
        assert_eq!(serializer.serialize_workflow_spec(&reloaded).unwrap(), first);

        let embed = &first["task_specs"][2];
        assert_eq!(embed["kind"], "sub_workflow");
        assert_eq!(embed["state"]["in_assign"][0]["attribute"], "greeting");
        assert_eq!(embed["state"]["workflow_spec"]["name"], "inner");
    }

    #[test]
    fn unknown_callback_is_reported() {
        let doc = json!({
            "name": "broken",
            "task_specs": [
                { "name": "Start", "kind": "start", "outputs": ["x"] },
                { "name": "x", "kind": "function", "state": { "callback": "ghost" } }
            ]
        });
        assert!(matches!(
            serializer().deserialize_workflow_spec(&doc),
            Err(EngineError::Callback(nodes::NodeError::UnknownCallback(name))) if name == "ghost"
        ));
    }

    #[test]
    fn unknown_kind_is_reported() {
        let doc = json!({
            "name": "broken",
            "task_specs": [ { "name": "m", "kind": "mutex" } ]
        });
        assert!(matches!(
            serializer().deserialize_workflow_spec(&doc),
            Err(EngineError::UnknownSpecKind(kind)) if kind == "mutex"
        ));
    }

    #[test]
    fn dangling_output_is_reported() {
        let doc = json!({
            "name": "broken",
            "task_specs": [ { "name": "Start", "kind": "start", "outputs": ["nowhere"] } ]
        });
        assert!(matches!(
            serializer().deserialize_workflow_spec(&doc),
            Err(EngineError::UnknownTaskSpec(name)) if name == "nowhere"
        ));
    }
}
