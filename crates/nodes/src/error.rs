//! Node-level error type.

use thiserror::Error;

/// Errors raised while resolving or registering callbacks.
///
/// Failures *inside* a callback are not errors at this level; they travel
/// as [`crate::CallbackOutcome::Failed`] so the engine can record them on
/// the task.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// No callback is registered under the given identifier.
    #[error("no callback registered under '{0}'")]
    UnknownCallback(String),

    /// The identifier is already taken.
    #[error("callback '{0}' is already registered")]
    DuplicateCallback(String),
}
