//! Engine configuration.

/// Tuning knobs for a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many levels below a non-definite task the prediction pass may
    /// speculate.
    pub lookahead: usize,
    /// When a leaf task fails, also return [`crate::EngineError::TaskFailed`]
    /// from the driving call instead of only marking the task FAILED.
    pub abort_on_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead: 2,
            abort_on_failure: true,
        }
    }
}
