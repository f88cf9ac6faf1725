//! Workflow specifications: a named spec graph with a start task.

use std::sync::Arc;

use crate::dag::validate_spec_graph;
use crate::graph::{SpecGraph, SpecId};
use crate::spec::TaskSpec;
use crate::specs::StartTask;
use crate::EngineError;

/// Name given to the start task of every workflow spec.
pub const START: &str = "Start";

/// A complete workflow definition.
#[derive(Debug, Clone)]
pub struct WorkflowSpec {
    name: String,
    graph: SpecGraph,
    start: SpecId,
}

impl WorkflowSpec {
    /// Create a spec holding only its start task.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut graph = SpecGraph::default();
        let start = graph.add(START, name.as_str(), Arc::new(StartTask));
        Self { name, graph, start }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> SpecId {
        self.start
    }

    pub fn graph(&self) -> &SpecGraph {
        &self.graph
    }

    /// Look up a task spec by name.
    pub fn get(&self, name: &str) -> Option<SpecId> {
        self.graph.find(name)
    }

    /// Add a task spec.
    ///
    /// # Errors
    /// [`EngineError::DuplicateTaskSpec`] if the name is taken.
    pub fn add(&mut self, name: impl Into<String>, spec: impl TaskSpec + 'static) -> Result<SpecId, EngineError> {
        self.add_shared(name, Arc::new(spec))
    }

    /// Add a task spec whose behaviour is already shared.
    pub fn add_shared(
        &mut self,
        name: impl Into<String>,
        behavior: Arc<dyn TaskSpec>,
    ) -> Result<SpecId, EngineError> {
        let name = name.into();
        if self.graph.find(&name).is_some() {
            return Err(EngineError::DuplicateTaskSpec(name));
        }
        Ok(self.graph.add(name, self.name.as_str(), behavior))
    }

    /// Declare `to` as a successor of `from`.
    ///
    /// # Errors
    /// [`EngineError::StartHasInputs`] if `to` is the start task.
    pub fn connect(&mut self, from: SpecId, to: SpecId) -> Result<(), EngineError> {
        self.graph.node(from)?;
        if to == self.start {
            return Err(EngineError::StartHasInputs(START.to_owned()));
        }
        self.graph.connect(from, to)
    }

    /// Connect each spec to the next one.
    pub fn chain(&mut self, specs: &[SpecId]) -> Result<(), EngineError> {
        for pair in specs.windows(2) {
            self.connect(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Validate the graph and return its specs in topological order.
    pub fn validate(&self) -> Result<Vec<SpecId>, EngineError> {
        validate_spec_graph(&self.graph)
    }
}
