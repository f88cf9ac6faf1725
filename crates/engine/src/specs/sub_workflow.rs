use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::graph::SpecId;
use crate::operators::Assign;
use crate::serializer::Serializer;
use crate::spec::{sync_with_best_state, TaskSpec};
use crate::state::TaskState;
use crate::task::TaskId;
use crate::workflow::NestedWorkflow;
use crate::{EngineError, Workflow, WorkflowSpec};

/// Embeds another workflow spec as if it were a single task.
///
/// When the task is about to become ready, a nested workflow is
/// instantiated and its tree is grafted under the task. The nested tree
/// must converge on exactly one leaf, the tail, which then takes over this
/// task's outputs in both the task tree and the spec graph.
///
/// With several outputs the tail performs an implicit parallel split, in
/// declared order. The spec splices once per run: a second task of the
/// same spec (one per incoming branch) fails with
/// [`EngineError::SpliceReentered`].
#[derive(Debug, Clone)]
pub struct SubWorkflow {
    workflow_spec: Arc<WorkflowSpec>,
    in_assign: Vec<Assign>,
    out_assign: Vec<Assign>,
}

impl SubWorkflow {
    pub fn new(workflow_spec: impl Into<Arc<WorkflowSpec>>) -> Self {
        Self {
            workflow_spec: workflow_spec.into(),
            in_assign: Vec::new(),
            out_assign: Vec::new(),
        }
    }

    /// Values copied from this task into every nested entry task. Assigned
    /// keys are pinned: they win over same-named keys inherited from this
    /// task.
    pub fn with_in_assign(mut self, in_assign: Vec<Assign>) -> Self {
        self.in_assign = in_assign;
        self
    }

    /// Values meant to flow back out. They do not filter: everything the
    /// nested tail holds reaches the outputs through data inheritance.
    pub fn with_out_assign(mut self, out_assign: Vec<Assign>) -> Self {
        self.out_assign = out_assign;
        self
    }

    pub fn workflow_spec(&self) -> &WorkflowSpec {
        &self.workflow_spec
    }

    pub fn in_assign(&self) -> &[Assign] {
        &self.in_assign
    }

    pub fn out_assign(&self) -> &[Assign] {
        &self.out_assign
    }

    pub fn deserialize(
        serializer: &dyn Serializer,
        wf_spec: &mut WorkflowSpec,
        name: &str,
        state: &Value,
    ) -> Result<SpecId, EngineError> {
        serializer.deserialize_sub_workflow(wf_spec, name, state)
    }
}

impl TaskSpec for SubWorkflow {
    fn kind(&self) -> &'static str {
        "sub_workflow"
    }

    /// Keep every current child, and put declared outputs that have no
    /// child yet in front of them.
    fn predict(&self, workflow: &mut Workflow, task: TaskId) -> Result<(), EngineError> {
        let spec = workflow.task(task)?.spec();
        let mut specs: Vec<SpecId> = Vec::new();
        for &child in workflow.task(task)?.children() {
            specs.push(workflow.task(child)?.spec());
        }
        let missing: Vec<SpecId> = workflow
            .graph()
            .node(spec)?
            .outputs()
            .iter()
            .copied()
            .filter(|output| !specs.contains(output))
            .collect();
        specs.splice(0..0, missing);
        sync_with_best_state(workflow, task, &specs)
    }

    fn before_ready(&self, workflow: &mut Workflow, task: TaskId) -> Result<(), EngineError> {
        let splicer = workflow.task(task)?.spec();
        let host_name = workflow.graph().node(splicer)?.name().to_owned();
        if workflow.graph().is_spliced(splicer) {
            return Err(EngineError::SpliceReentered(host_name));
        }
        let outputs = workflow.graph().node(splicer)?.outputs().to_vec();

        // Build the nested tree off to the side; nothing of the host is
        // touched until convergence is confirmed.
        let checkpoint = workflow.checkpoint();
        let nested_root = match workflow.instantiate(&self.workflow_spec) {
            Ok(root) => root,
            Err(err) => {
                workflow.rollback(checkpoint);
                return Err(err);
            }
        };
        let tails = workflow.tree().leaves(nested_root);
        let tail = match tails.as_slice() {
            [tail] => *tail,
            _ => {
                workflow.rollback(checkpoint);
                return Err(EngineError::AmbiguousConvergence {
                    task: host_name,
                    subworkflow: self.workflow_spec.name().to_owned(),
                    tails: tails.len(),
                });
            }
        };

        let entry = workflow.tree_mut().graft(nested_root, task)?;

        // Whatever followed the host task now follows the tail.
        for child in workflow.task(task)?.children().to_vec() {
            if !entry.contains(&child) && outputs.contains(&workflow.task(child)?.spec()) {
                workflow.tree_mut().reparent(child, tail)?;
            }
        }
        workflow.sync_children(tail, &outputs, TaskState::Likely)?;

        let tail_spec = workflow.task(tail)?.spec();
        let mut entry_specs = Vec::with_capacity(entry.len());
        for &child in &entry {
            entry_specs.push(workflow.task(child)?.spec());
        }
        workflow.graph_mut().splice(splicer, tail_spec, &entry_specs)?;

        info!(
            task = %host_name,
            subworkflow = %self.workflow_spec.name(),
            tail = %tail,
            "spliced sub-workflow"
        );
        let outer = workflow.id();
        workflow.task_mut(task)?.nested = Some(NestedWorkflow {
            id: Uuid::new_v4(),
            spec_name: self.workflow_spec.name().to_owned(),
            outer,
            root: nested_root,
            entry,
            tail,
        });
        Ok(())
    }

    fn ready(&self, workflow: &mut Workflow, task: TaskId) -> Result<(), EngineError> {
        let nested = match workflow.task(task)?.nested() {
            Some(nested) => nested.clone(),
            None => {
                let spec = workflow.task(task)?.spec();
                let name = workflow.graph().node(spec)?.name().to_owned();
                return Err(EngineError::NotSpliced(name));
            }
        };

        for &child in &nested.entry {
            for assignment in &self.in_assign {
                assignment.assign(workflow, task, child)?;
            }
        }

        workflow.predict(task)?;
        for &child in &nested.entry {
            workflow.update_state(child)?;
        }
        debug!(task = %task, entry = nested.entry.len(), "nested workflow primed");
        Ok(())
    }

    fn serialize(&self, serializer: &dyn Serializer) -> Result<Value, EngineError> {
        serializer.serialize_sub_workflow(self)
    }
}
