//! Task lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task instance.
///
/// Speculative states (`Maybe`, `Likely`, `Future`) are assigned by the
/// prediction pass; `Future` is also *definite*, meaning the task will
/// certainly run. Finished states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Maybe,
    Likely,
    Future,
    Waiting,
    Ready,
    /// Still READY; the last completion attempt asked to be retried.
    Incomplete,
    Completed,
    Cancelled,
    Failed,
}

impl TaskState {
    /// MAYBE | LIKELY | FUTURE
    pub fn is_predicted(self) -> bool {
        matches!(self, Self::Maybe | Self::Likely | Self::Future)
    }

    /// FUTURE | WAITING | READY | INCOMPLETE
    pub fn is_definite(self) -> bool {
        matches!(
            self,
            Self::Future | Self::Waiting | Self::Ready | Self::Incomplete
        )
    }

    /// COMPLETED | CANCELLED | FAILED
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// READY | INCOMPLETE
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Incomplete)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        if self == next {
            return true;
        }
        if self.is_finished() {
            return false;
        }
        if self.is_runnable() {
            return next.is_runnable() || next.is_finished();
        }
        true
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Maybe => "MAYBE",
            Self::Likely => "LIKELY",
            Self::Future => "FUTURE",
            Self::Waiting => "WAITING",
            Self::Ready => "READY",
            Self::Incomplete => "INCOMPLETE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
