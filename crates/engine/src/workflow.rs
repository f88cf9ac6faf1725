//! Workflow execution engine.
//!
//! `Workflow` owns one execution of a [`WorkflowSpec`]:
//! 1. Copies the spec graph into a live graph it is free to rewrite.
//! 2. Builds the runtime task tree and extends it by prediction.
//! 3. Drives tasks through readiness and completion, pass after pass.
//! 4. Records leaf failures on the task and, depending on
//!    [`EngineConfig::abort_on_failure`], aborts the driving call.

use std::sync::Arc;

use nodes::TaskContext;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::graph::{SpecGraph, SpecId};
use crate::spec::{Completion, TaskSpec};
use crate::specs::Simple;
use crate::state::TaskState;
use crate::task::{Task, TaskId, TaskIter, TaskTree};
use crate::{EngineError, WorkflowSpec};

/// Name of the hidden spec behind every tree root.
const ROOT: &str = "Root";

// ---------------------------------------------------------------------------
// Nested workflow handle
// ---------------------------------------------------------------------------

/// A nested workflow spliced under a host task.
///
/// Its tasks live in the host workflow's arena; the handle records where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedWorkflow {
    pub id: Uuid,
    /// Name of the workflow spec that was instantiated.
    pub spec_name: String,
    /// ID of the outermost workflow, shared context for every nesting level.
    pub outer: Uuid,
    /// The nested tree's own root. Detached: its children were grafted
    /// under the host task.
    pub root: TaskId,
    /// Former root children, now children of the host task.
    pub entry: Vec<TaskId>,
    /// The single leaf the nested tree converges on.
    pub tail: TaskId,
}

// ---------------------------------------------------------------------------
// Pass report
// ---------------------------------------------------------------------------

/// What a driving call achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub completed: Vec<TaskId>,
    /// Attempted but left INCOMPLETE.
    pub pending: Vec<TaskId>,
    pub failed: Vec<TaskId>,
}

impl PassReport {
    pub fn made_progress(&self) -> bool {
        !self.completed.is_empty() || !self.failed.is_empty()
    }

    fn absorb(&mut self, other: PassReport) {
        self.completed.extend(other.completed);
        self.failed.extend(other.failed);
        self.pending = other.pending;
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    specs: usize,
    tasks: usize,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// One execution of a workflow spec.
#[derive(Debug)]
pub struct Workflow {
    id: Uuid,
    name: String,
    config: EngineConfig,
    graph: SpecGraph,
    tree: TaskTree,
    root: TaskId,
}

impl Workflow {
    /// Instantiate `spec` with the default configuration.
    pub fn new(spec: &WorkflowSpec) -> Result<Self, EngineError> {
        Self::with_config(spec, EngineConfig::default())
    }

    /// Instantiate `spec`, predict its tree and make the start task ready.
    ///
    /// # Errors
    /// Validation errors of the spec graph, or any structural error raised
    /// while the start task becomes ready.
    #[instrument(skip_all, fields(workflow = %spec.name()))]
    pub fn with_config(spec: &WorkflowSpec, config: EngineConfig) -> Result<Self, EngineError> {
        let mut workflow = Self {
            id: Uuid::new_v4(),
            name: spec.name().to_owned(),
            config,
            graph: SpecGraph::default(),
            tree: TaskTree::default(),
            root: TaskId(0),
        };
        workflow.root = workflow.instantiate(spec)?;
        info!(
            workflow_id = %workflow.id,
            specs = workflow.graph.len(),
            tasks = workflow.tree.len(),
            "workflow instantiated"
        );

        for start in workflow.task(workflow.root)?.children().to_vec() {
            workflow.update_state(start)?;
        }
        Ok(workflow)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> TaskId {
        self.root
    }

    /// The live spec graph of this run, including specs of spliced
    /// sub-workflows.
    pub fn graph(&self) -> &SpecGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut SpecGraph {
        &mut self.graph
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut TaskTree {
        &mut self.tree
    }

    pub fn task(&self, id: TaskId) -> Result<&Task, EngineError> {
        self.tree.get(id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, EngineError> {
        self.tree.get_mut(id)
    }

    /// Name of the spec a task instantiates.
    pub fn task_name(&self, id: TaskId) -> Result<&str, EngineError> {
        let spec = self.task(id)?.spec();
        Ok(self.graph.node(spec)?.name())
    }

    /// Every task reachable from the root, pre-order.
    pub fn tasks(&self) -> TaskIter<'_> {
        self.tree.iter_from(self.root)
    }

    /// Reachable tasks whose spec has the given name.
    pub fn tasks_named(&self, name: &str) -> Vec<TaskId> {
        self.tasks()
            .filter(|task| {
                self.graph
                    .node(task.spec())
                    .map(|node| node.name() == name)
                    .unwrap_or(false)
            })
            .map(Task::id)
            .collect()
    }

    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<TaskId> {
        self.tasks().find(|task| task.uuid() == uuid).map(Task::id)
    }

    /// True once no reachable task is left unfinished.
    pub fn is_completed(&self) -> bool {
        self.tasks().all(|task| task.state().is_finished())
    }

    pub fn set_task_state(&mut self, id: TaskId, state: TaskState) -> Result<(), EngineError> {
        self.tree.get_mut(id)?.set_state(state)
    }

    /// Run `f` against a callback view of the task.
    pub fn with_task_context<R>(
        &mut self,
        id: TaskId,
        f: impl FnOnce(&mut TaskContext<'_>) -> R,
    ) -> Result<R, EngineError> {
        let workflow_id = self.id;
        let spec = self.tree.get(id)?.spec();
        let task_name = self.graph.node(spec)?.name();
        let task = self.tree.get_mut(id)?;
        let mut ctx = TaskContext {
            workflow_id,
            task_id: task.uuid,
            task_name,
            triggered: task.triggered,
            data: &mut task.data,
        };
        Ok(f(&mut ctx))
    }

    fn behavior(&self, id: TaskId) -> Result<Arc<dyn TaskSpec>, EngineError> {
        let spec = self.task(id)?.spec();
        Ok(self.graph.node(spec)?.behavior())
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Copy `spec` into the live graph and build a detached tree for it:
    /// a COMPLETED root with the start task as a predicted FUTURE child.
    /// Returns the root.
    pub(crate) fn instantiate(&mut self, spec: &WorkflowSpec) -> Result<TaskId, EngineError> {
        spec.validate()?;
        let offset = self.graph.absorb(spec.graph());
        let root_spec = self.graph.add(ROOT, spec.name(), Arc::new(Simple));
        let start_spec = SpecId(spec.start().index() + offset);

        let root = self.tree.insert(root_spec, None, TaskState::Completed)?;
        let start = self.tree.insert(start_spec, Some(root), TaskState::Future)?;
        self.predict(start)?;
        debug!(spec = %spec.name(), root = %root, "instantiated task tree");
        Ok(root)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            specs: self.graph.checkpoint(),
            tasks: self.tree.checkpoint(),
        }
    }

    /// Drop specs and tasks created since `checkpoint`. Only valid while
    /// nothing older links to them.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.graph.rollback(checkpoint.specs);
        self.tree.rollback(checkpoint.tasks);
    }

    /// Make `task`'s children match `specs`.
    ///
    /// Children whose spec is listed are kept, missing ones are created in
    /// `state`, unlisted speculative children are pruned. Triggered children
    /// are never removed.
    ///
    /// # Errors
    /// - [`EngineError::NonPredictedRemoval`] if an unlisted child is definite.
    /// - [`EngineError::NonPredictedChild`] if `task` is speculative and
    ///   `state` is not.
    pub fn sync_children(
        &mut self,
        task: TaskId,
        specs: &[SpecId],
        state: TaskState,
    ) -> Result<(), EngineError> {
        let mut add = specs.to_vec();
        let mut remove = Vec::new();

        for &child in self.task(task)?.children() {
            let child_task = self.task(child)?;
            if let Some(pos) = add.iter().position(|spec| *spec == child_task.spec()) {
                add.remove(pos);
                continue;
            }
            if child_task.is_triggered() {
                continue;
            }
            if child_task.state().is_definite() {
                return Err(EngineError::NonPredictedRemoval {
                    task: self.task_name(task)?.to_owned(),
                    child: self.task_name(child)?.to_owned(),
                });
            }
            remove.push(child);
        }

        for child in remove {
            self.tree.prune(child)?;
        }
        for spec in add {
            self.add_child(task, spec, state)?;
        }
        Ok(())
    }

    fn add_child(&mut self, parent: TaskId, spec: SpecId, state: TaskState) -> Result<TaskId, EngineError> {
        if self.task(parent)?.state().is_predicted() && !state.is_predicted() {
            return Err(EngineError::NonPredictedChild {
                task: self.task_name(parent)?.to_owned(),
                child: self.graph.node(spec)?.name().to_owned(),
                state,
            });
        }
        if state.is_runnable() {
            let child = self.tree.insert(spec, Some(parent), TaskState::Future)?;
            self.make_ready(child)?;
            return Ok(child);
        }
        self.tree.insert(spec, Some(parent), state)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Prediction pass from `task` downwards.
    ///
    /// Finished tasks are skipped. Below a non-definite task the pass looks
    /// at most [`EngineConfig::lookahead`] levels ahead and never revisits a
    /// spec on the same speculative path.
    pub fn predict(&mut self, task: TaskId) -> Result<(), EngineError> {
        self.predict_from(task, &[], 0)
    }

    fn predict_from(&mut self, task: TaskId, seen: &[SpecId], looked_ahead: usize) -> Result<(), EngineError> {
        let (spec, state) = {
            let task = self.task(task)?;
            (task.spec(), task.state())
        };
        if state.is_finished() || seen.contains(&spec) {
            return Ok(());
        }

        self.behavior(task)?.predict(self, task)?;

        let mut seen = seen.to_vec();
        let mut looked_ahead = looked_ahead;
        if !self.task(task)?.state().is_definite() {
            if looked_ahead + 1 >= self.config.lookahead {
                return Ok(());
            }
            seen.push(spec);
            looked_ahead += 1;
        }

        for child in self.task(task)?.children().to_vec() {
            self.predict_from(child, &seen, looked_ahead)?;
        }
        Ok(())
    }

    /// Re-evaluate a task after its parent changed.
    ///
    /// Inherits the parent's data, stays FUTURE while the parent is
    /// unfinished, re-predicts speculative tasks and makes the task ready
    /// once its parent completed.
    pub fn update_state(&mut self, task: TaskId) -> Result<(), EngineError> {
        self.inherit_data(task)?;

        let (state, parent) = {
            let task = self.task(task)?;
            (task.state(), task.parent())
        };
        let parent_completed = match parent {
            Some(parent) => self.task(parent)?.state() == TaskState::Completed,
            None => true,
        };

        if !parent_completed && state.is_predicted() {
            self.set_task_state(task, TaskState::Future)?;
        }
        if state.is_predicted() {
            self.predict(task)?;
        }
        if parent_completed {
            self.make_ready(task)?;
        }
        Ok(())
    }

    fn inherit_data(&mut self, task: TaskId) -> Result<(), EngineError> {
        let Some(parent) = self.task(task)?.parent() else {
            return Ok(());
        };
        let inherited = self.task(parent)?.data().clone();
        let task = self.task_mut(task)?;
        for (key, value) in inherited {
            if !task.pinned.contains_key(&key) {
                task.data.insert(key, value);
            }
        }
        Ok(())
    }

    /// `before_ready`, then READY, then `ready`. Runs once per task.
    fn make_ready(&mut self, task: TaskId) -> Result<(), EngineError> {
        let state = self.task(task)?.state();
        if state.is_finished() || state.is_runnable() {
            return Ok(());
        }

        let behavior = self.behavior(task)?;
        behavior.before_ready(self, task)?;
        self.set_task_state(task, TaskState::Ready)?;
        behavior.ready(self, task)?;
        let name = self.task_name(task)?;
        debug!(task = %task, name = %name, "task ready");
        Ok(())
    }

    /// Attempt to complete one task.
    ///
    /// Returns `Ok(true)` if the task completed. A FAILED task is never
    /// invoked again and yields `Ok(false)`.
    ///
    /// # Errors
    /// - [`EngineError::TaskNotReady`] if the task is neither READY nor
    ///   INCOMPLETE.
    /// - [`EngineError::TaskFailed`] if the task failed and
    ///   [`EngineConfig::abort_on_failure`] is set.
    /// - Structural errors raised while successors become ready.
    #[instrument(skip(self), fields(workflow = %self.name))]
    pub fn complete_task(&mut self, task: TaskId) -> Result<bool, EngineError> {
        let state = self.task(task)?.state();
        let name = self.task_name(task)?.to_owned();
        if state == TaskState::Failed {
            warn!("task '{}' already failed; not running it again", name);
            return Ok(false);
        }
        if !state.is_runnable() {
            return Err(EngineError::TaskNotReady { task: name, state });
        }

        match self.behavior(task)?.complete_attempt(self, task)? {
            Completion::Done => {
                self.set_task_state(task, TaskState::Completed)?;
                info!("task '{}' completed", name);
                for child in self.task(task)?.children().to_vec() {
                    self.update_state(child)?;
                }
                Ok(true)
            }
            Completion::Incomplete => {
                self.set_task_state(task, TaskState::Incomplete)?;
                debug!("task '{}' incomplete; will retry", name);
                Ok(false)
            }
            Completion::Refused => Ok(false),
            Completion::Failed(detail) => {
                self.fail_task(task, detail.clone())?;
                error!("task '{}' failed: {}", name, detail);
                if self.config.abort_on_failure {
                    Err(EngineError::TaskFailed { task: name, detail })
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn fail_task(&mut self, task: TaskId, detail: String) -> Result<(), EngineError> {
        let task = self.task_mut(task)?;
        task.set_state(TaskState::Failed)?;
        task.failure = Some(detail);
        Ok(())
    }

    fn runnable(&self) -> Vec<TaskId> {
        self.tasks()
            .filter(|task| task.state().is_runnable())
            .map(Task::id)
            .collect()
    }

    /// Complete the first runnable task that agrees to complete.
    pub fn complete_next(&mut self) -> Result<bool, EngineError> {
        for task in self.runnable() {
            if !self.task(task)?.state().is_runnable() {
                continue;
            }
            if self.complete_task(task)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Attempt every currently runnable task once, in tree order. Tasks
    /// that become ready during the pass wait for the next one.
    #[instrument(skip(self), fields(workflow = %self.name))]
    pub fn run_pass(&mut self) -> Result<PassReport, EngineError> {
        let mut report = PassReport::default();
        for task in self.runnable() {
            if !self.task(task)?.state().is_runnable() {
                continue;
            }
            if self.complete_task(task)? {
                report.completed.push(task);
            } else if self.task(task)?.state() == TaskState::Failed {
                report.failed.push(task);
            } else {
                report.pending.push(task);
            }
        }
        Ok(report)
    }

    /// Run passes until one makes no progress.
    pub fn complete_all(&mut self) -> Result<PassReport, EngineError> {
        let mut total = PassReport::default();
        loop {
            let pass = self.run_pass()?;
            let progressed = pass.made_progress();
            total.absorb(pass);
            if !progressed {
                break;
            }
        }
        info!(
            completed = total.completed.len(),
            pending = total.pending.len(),
            failed = total.failed.len(),
            done = self.is_completed(),
            "workflow '{}' quiescent",
            self.name
        );
        Ok(total)
    }

    // -----------------------------------------------------------------------
    // External events
    // -----------------------------------------------------------------------

    /// Deliver a trigger to a task.
    pub fn trigger(&mut self, task: TaskId) -> Result<(), EngineError> {
        debug!(task = %task, "trigger");
        self.behavior(task)?.on_trigger(self, task)
    }

    pub fn trigger_by_uuid(&mut self, uuid: Uuid) -> Result<(), EngineError> {
        let task = self
            .find_by_uuid(uuid)
            .ok_or(EngineError::TaskNotFound(uuid))?;
        self.trigger(task)
    }

    /// Cancel a task and, recursively, everything below it. Finished tasks
    /// keep their state.
    pub fn cancel_task(&mut self, task: TaskId) -> Result<(), EngineError> {
        if !self.task(task)?.state().is_finished() {
            self.set_task_state(task, TaskState::Cancelled)?;
        }
        for child in self.task(task)?.children().to_vec() {
            self.cancel_task(child)?;
        }
        Ok(())
    }

    /// Cancel the whole tree.
    pub fn cancel(&mut self) -> Result<(), EngineError> {
        info!("cancelling workflow '{}'", self.name);
        self.cancel_task(self.root)
    }
}
