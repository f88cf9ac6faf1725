//! The task spec graph.
//!
//! Task specs live in an arena and name their neighbours by [`SpecId`].
//! Every edge is stored on both ends: `b` in `a.outputs` iff `a` in
//! `b.inputs`. All mutation goes through methods that write both sides.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::spec::TaskSpec;
use crate::EngineError;

/// Stable index of a task spec in a [`SpecGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecId(pub(crate) usize);

impl SpecId {
    pub fn index(self) -> usize {
        self.0
    }

    fn shifted(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spec#{}", self.0)
    }
}

/// One task spec: identity, edges and behaviour.
#[derive(Debug, Clone)]
pub struct SpecNode {
    name: String,
    owner: String,
    inputs: Vec<SpecId>,
    outputs: Vec<SpecId>,
    behavior: Arc<dyn TaskSpec>,
}

impl SpecNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the workflow spec that declared this task spec.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn inputs(&self) -> &[SpecId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SpecId] {
        &self.outputs
    }

    pub fn behavior(&self) -> Arc<dyn TaskSpec> {
        Arc::clone(&self.behavior)
    }
}

/// Arena of task specs.
#[derive(Debug, Clone, Default)]
pub struct SpecGraph {
    nodes: Vec<SpecNode>,
    spliced: HashSet<SpecId>,
}

impl SpecGraph {
    pub fn node(&self, id: SpecId) -> Result<&SpecNode, EngineError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| EngineError::UnknownTaskSpec(id.to_string()))
    }

    fn node_mut(&mut self, id: SpecId) -> Result<&mut SpecNode, EngineError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| EngineError::UnknownTaskSpec(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SpecId> {
        (0..self.nodes.len()).map(SpecId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (SpecId, &SpecNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (SpecId(i), node))
    }

    /// First spec with the given name.
    pub fn find(&self, name: &str) -> Option<SpecId> {
        self.nodes().find(|(_, node)| node.name == name).map(|(id, _)| id)
    }

    /// First spec with the given name declared by `owner`.
    pub fn find_owned(&self, owner: &str, name: &str) -> Option<SpecId> {
        self.nodes()
            .find(|(_, node)| node.owner == owner && node.name == name)
            .map(|(id, _)| id)
    }

    pub(crate) fn add(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        behavior: Arc<dyn TaskSpec>,
    ) -> SpecId {
        let id = SpecId(self.nodes.len());
        self.nodes.push(SpecNode {
            name: name.into(),
            owner: owner.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            behavior,
        });
        id
    }

    /// Add the edge `from -> to` on both ends. Existing edges are left alone.
    pub(crate) fn connect(&mut self, from: SpecId, to: SpecId) -> Result<(), EngineError> {
        self.node(to)?;
        if self.node(from)?.outputs.contains(&to) {
            return Ok(());
        }
        self.node_mut(from)?.outputs.push(to);
        self.node_mut(to)?.inputs.push(from);
        Ok(())
    }

    /// Replace the outputs of `id`, keeping the inputs of old and new
    /// successors in step.
    pub(crate) fn set_outputs(&mut self, id: SpecId, outputs: Vec<SpecId>) -> Result<(), EngineError> {
        for &output in &outputs {
            self.node(output)?;
        }
        let old = std::mem::take(&mut self.node_mut(id)?.outputs);
        for output in old {
            self.node_mut(output)?.inputs.retain(|input| *input != id);
        }
        for &output in &outputs {
            self.node_mut(output)?.inputs.push(id);
        }
        self.node_mut(id)?.outputs = outputs;
        Ok(())
    }

    /// Rewrite edges around a splice point: `tail` takes over the outputs
    /// of `splicer`, and `splicer` now leads into `entry`.
    pub(crate) fn splice(
        &mut self,
        splicer: SpecId,
        tail: SpecId,
        entry: &[SpecId],
    ) -> Result<(), EngineError> {
        let outputs = self.node(splicer)?.outputs.clone();
        self.set_outputs(tail, outputs)?;
        self.set_outputs(splicer, entry.to_vec())?;
        self.spliced.insert(splicer);
        Ok(())
    }

    /// Whether `id` was already the splice point of a nested workflow.
    pub fn is_spliced(&self, id: SpecId) -> bool {
        self.spliced.contains(&id)
    }

    /// Append a copy of `other`, shifting its ids. Returns the offset to
    /// add to an id of `other` to address its copy.
    pub(crate) fn absorb(&mut self, other: &SpecGraph) -> usize {
        let offset = self.nodes.len();
        self.nodes.extend(other.nodes.iter().map(|node| SpecNode {
            name: node.name.clone(),
            owner: node.owner.clone(),
            inputs: node.inputs.iter().map(|id| id.shifted(offset)).collect(),
            outputs: node.outputs.iter().map(|id| id.shifted(offset)).collect(),
            behavior: Arc::clone(&node.behavior),
        }));
        self.spliced
            .extend(other.spliced.iter().map(|id| id.shifted(offset)));
        offset
    }

    /// Arena length, used to roll back speculative inserts.
    pub(crate) fn checkpoint(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        self.nodes.truncate(checkpoint);
        self.spliced.retain(|id| id.0 < checkpoint);
    }

    /// Verify that every edge is recorded on both of its ends.
    pub fn check_mutual_edges(&self) -> Result<(), EngineError> {
        for (id, node) in self.nodes() {
            for &output in &node.outputs {
                if !self.node(output)?.inputs.contains(&id) {
                    return Err(self.asymmetric(id, output));
                }
            }
            for &input in &node.inputs {
                if !self.node(input)?.outputs.contains(&id) {
                    return Err(self.asymmetric(input, id));
                }
            }
        }
        Ok(())
    }

    fn asymmetric(&self, from: SpecId, to: SpecId) -> EngineError {
        let name = |id: SpecId| {
            self.node(id)
                .map(|node| node.name.clone())
                .unwrap_or_else(|_| id.to_string())
        };
        EngineError::AsymmetricEdge {
            from: name(from),
            to: name(to),
        }
    }

    #[cfg(test)]
    pub(crate) fn push_raw_output(&mut self, from: SpecId, to: SpecId) {
        self.nodes[from.0].outputs.push(to);
    }
}
