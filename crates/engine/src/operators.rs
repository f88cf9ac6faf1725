//! Data assignments between tasks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::TaskId;
use crate::{EngineError, Workflow};

/// Where an assigned value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignSource {
    /// Another key of the source task's data.
    Attribute(String),
    /// A literal value.
    Value(Value),
}

/// Writes `left` on a target task, from an attribute of a source task or a
/// literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub left: String,
    #[serde(flatten)]
    pub source: AssignSource,
}

impl Assign {
    /// `to.left = from.right`
    pub fn copy(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            source: AssignSource::Attribute(right.into()),
        }
    }

    /// `to.left = value`
    pub fn value(left: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            left: left.into(),
            source: AssignSource::Value(value.into()),
        }
    }

    /// Apply the assignment. A missing source attribute assigns `null`.
    /// The key is pinned on `to`, so inheriting from its parent keeps it.
    pub fn assign(&self, workflow: &mut Workflow, from: TaskId, to: TaskId) -> Result<(), EngineError> {
        let value = match &self.source {
            AssignSource::Attribute(right) => workflow
                .task(from)?
                .get_data(right)
                .cloned()
                .unwrap_or(Value::Null),
            AssignSource::Value(value) => value.clone(),
        };
        workflow.task_mut(to)?.pin_data(self.left.clone(), value);
        Ok(())
    }
}
