//! Runtime task tree.
//!
//! Tasks live in an arena owned by the [`crate::Workflow`] and refer to each
//! other by [`TaskId`]. Parent/child links are index pairs, so moving a
//! subtree from one parent to another is a pair of list edits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;
use uuid::Uuid;

use crate::graph::SpecId;
use crate::state::TaskState;
use crate::workflow::NestedWorkflow;
use crate::EngineError;

/// Stable index of a task in its workflow's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A runtime instance of one task spec.
#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) uuid: Uuid,
    pub(crate) spec: SpecId,
    pub(crate) parent: Option<TaskId>,
    pub(crate) children: Vec<TaskId>,
    pub(crate) state: TaskState,
    pub(crate) triggered: bool,
    pub(crate) data: Map<String, Value>,
    /// Assigned keys that survive data inheritance.
    pub(crate) pinned: Map<String, Value>,
    pub(crate) failure: Option<String>,
    pub(crate) nested: Option<NestedWorkflow>,
    pub(crate) last_state_change: DateTime<Utc>,
}

impl Task {
    fn new(id: TaskId, spec: SpecId, parent: Option<TaskId>, state: TaskState) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            spec,
            parent,
            children: Vec::new(),
            state,
            triggered: false,
            data: Map::new(),
            pinned: Map::new(),
            failure: None,
            nested: None,
            last_state_change: Utc::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn spec(&self) -> SpecId {
        self.spec
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Set a key that later data inheritance from the parent will not
    /// overwrite.
    pub fn pin_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.pinned.insert(key.clone(), value.clone());
        self.data.insert(key, value);
    }

    /// Diagnostic detail recorded when the task failed.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// The nested workflow spliced under this task, if any.
    pub fn nested(&self) -> Option<&NestedWorkflow> {
        self.nested.as_ref()
    }

    pub fn last_state_change(&self) -> DateTime<Utc> {
        self.last_state_change
    }

    pub(crate) fn set_state(&mut self, state: TaskState) -> Result<(), EngineError> {
        if self.state == state {
            return Ok(());
        }
        if !self.state.can_transition_to(state) {
            return Err(EngineError::InvalidTransition {
                task: self.id,
                from: self.state,
                to: state,
            });
        }
        trace!(task = %self.id, from = %self.state, to = %state, "task state change");
        self.state = state;
        self.last_state_change = Utc::now();
        Ok(())
    }
}

/// Arena of tasks. Pruned tasks leave an empty slot so ids stay stable.
#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    slots: Vec<Option<Task>>,
}

impl TaskTree {
    pub fn get(&self, id: TaskId) -> Result<&Task, EngineError> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(EngineError::UnknownTask(id))
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Result<&mut Task, EngineError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(EngineError::UnknownTask(id))
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a task, appending it to `parent`'s children.
    pub(crate) fn insert(
        &mut self,
        spec: SpecId,
        parent: Option<TaskId>,
        state: TaskState,
    ) -> Result<TaskId, EngineError> {
        if let Some(parent) = parent {
            self.get(parent)?;
        }
        let id = TaskId(self.slots.len());
        self.slots.push(Some(Task::new(id, spec, parent, state)));
        if let Some(parent) = parent {
            self.get_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    /// Unlink a task from its parent. The task keeps its own subtree.
    pub(crate) fn detach(&mut self, id: TaskId) -> Result<(), EngineError> {
        if let Some(parent) = self.get_mut(id)?.parent.take() {
            self.get_mut(parent)?.children.retain(|child| *child != id);
        }
        Ok(())
    }

    /// Move a task (with its subtree) under `parent`, appended last.
    pub(crate) fn reparent(&mut self, id: TaskId, parent: TaskId) -> Result<(), EngineError> {
        self.get(parent)?;
        self.detach(id)?;
        self.get_mut(id)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(id);
        Ok(())
    }

    /// Move every child of `from` to the front of `onto`'s children,
    /// preserving their order. Returns the moved ids.
    pub(crate) fn graft(&mut self, from: TaskId, onto: TaskId) -> Result<Vec<TaskId>, EngineError> {
        self.get(onto)?;
        let moved = std::mem::take(&mut self.get_mut(from)?.children);
        for &child in &moved {
            self.get_mut(child)?.parent = Some(onto);
        }
        self.get_mut(onto)?.children.splice(0..0, moved.iter().copied());
        Ok(moved)
    }

    /// Detach a task and drop it together with its subtree.
    pub(crate) fn prune(&mut self, id: TaskId) -> Result<(), EngineError> {
        self.detach(id)?;
        let doomed: Vec<TaskId> = self.iter_from(id).map(Task::id).collect();
        for task in doomed {
            if let Some(slot) = self.slots.get_mut(task.0) {
                *slot = None;
            }
        }
        Ok(())
    }

    /// Arena length, used to roll back speculative inserts.
    pub(crate) fn checkpoint(&self) -> usize {
        self.slots.len()
    }

    /// Drop every slot created after `checkpoint`.
    ///
    /// Only valid when nothing older than the checkpoint links to the
    /// dropped tasks.
    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        self.slots.truncate(checkpoint);
    }

    /// Pre-order, depth-first iteration of the subtree rooted at `root`.
    pub fn iter_from(&self, root: TaskId) -> TaskIter<'_> {
        TaskIter {
            tree: self,
            stack: vec![root],
        }
    }

    /// Tasks without children in the subtree rooted at `root`.
    pub fn leaves(&self, root: TaskId) -> Vec<TaskId> {
        self.iter_from(root)
            .filter(|task| task.children.is_empty())
            .map(Task::id)
            .collect()
    }
}

/// Pre-order iterator over a subtree.
pub struct TaskIter<'a> {
    tree: &'a TaskTree,
    stack: Vec<TaskId>,
}

impl<'a> Iterator for TaskIter<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<&'a Task> {
        let tree: &'a TaskTree = self.tree;
        while let Some(id) = self.stack.pop() {
            if let Ok(task) = tree.get(id) {
                self.stack.extend(task.children.iter().rev());
                return Some(task);
            }
        }
        None
    }
}
