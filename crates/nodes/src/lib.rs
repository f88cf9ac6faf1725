//! `nodes` crate — the callback contract leaf tasks run against, and the
//! registry that resolves callbacks by name.
//!
//! The engine crate invokes callbacks through [`Callback`] and only ever
//! observes the [`CallbackOutcome`] they return.

pub mod builtin;
pub mod callback;
pub mod error;
pub mod mock;
pub mod registry;

pub use callback::{Callback, CallbackOutcome, TaskContext};
pub use error::NodeError;
pub use registry::CallbackRegistry;
