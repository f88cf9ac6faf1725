//! `engine` crate — spec graph, task tree, and the workflow driver.

pub mod config;
pub mod dag;
pub mod error;
pub mod graph;
pub mod operators;
pub mod serializer;
pub mod snapshot;
pub mod spec;
pub mod specs;
pub mod state;
pub mod task;
pub mod workflow;
pub mod workflow_spec;

pub use config::EngineConfig;
pub use dag::validate_spec_graph;
pub use error::EngineError;
pub use graph::{SpecGraph, SpecId, SpecNode};
pub use operators::{Assign, AssignSource};
pub use serializer::{JsonSerializer, Serializer};
pub use snapshot::TaskSnapshot;
pub use spec::{predict_outputs, Completion, TaskSpec};
pub use specs::{Function, Simple, StartTask, SubWorkflow, WaitForTrigger};
pub use state::TaskState;
pub use task::{Task, TaskId, TaskIter, TaskTree};
pub use workflow::{NestedWorkflow, PassReport, Workflow};
pub use workflow_spec::{WorkflowSpec, START};

#[cfg(test)]
mod workflow_tests;
