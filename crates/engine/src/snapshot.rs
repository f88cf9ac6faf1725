//! Serializable view of a running workflow's task tree.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::state::TaskState;
use crate::task::TaskId;
use crate::{EngineError, Workflow};

/// One task and everything below it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub uuid: Uuid,
    pub name: String,
    pub state: TaskState,
    pub triggered: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub last_state_change: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskSnapshot>,
}

impl TaskSnapshot {
    /// Pre-order `(depth, snapshot)` pairs, handy for indented dumps.
    pub fn walk(&self) -> Vec<(usize, &TaskSnapshot)> {
        let mut out = Vec::new();
        let mut stack = vec![(0, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            stack.extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        }
        out
    }
}

impl Workflow {
    /// Snapshot the tree below the root.
    pub fn snapshot(&self) -> Result<TaskSnapshot, EngineError> {
        self.snapshot_from(self.root())
    }

    pub fn snapshot_from(&self, id: TaskId) -> Result<TaskSnapshot, EngineError> {
        let task = self.task(id)?;
        let children = task
            .children()
            .iter()
            .map(|child| self.snapshot_from(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaskSnapshot {
            uuid: task.uuid(),
            name: self.task_name(id)?.to_owned(),
            state: task.state(),
            triggered: task.is_triggered(),
            data: task.data().clone(),
            failure: task.failure().map(str::to_owned),
            last_state_change: task.last_state_change(),
            children,
        })
    }
}
