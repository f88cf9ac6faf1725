//! Spec graph validation — run this before instantiating a workflow spec.
//!
//! Rules enforced:
//! 1. Task spec names must be unique within their owning workflow spec.
//! 2. Every edge must reference existing specs and be recorded on both ends.
//! 3. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns a topologically-sorted list of spec ids on success.

use std::collections::{HashSet, VecDeque};

use crate::graph::{SpecGraph, SpecId};
use crate::EngineError;

/// Validate the graph and return its specs in topological order.
///
/// # Errors
/// - [`EngineError::DuplicateTaskSpec`] if two specs of one owner share a name.
/// - [`EngineError::UnknownTaskSpec`] if an edge references a missing spec.
/// - [`EngineError::AsymmetricEdge`] if an edge is recorded on one end only.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_spec_graph(graph: &SpecGraph) -> Result<Vec<SpecId>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure names are unique per owner
    // -----------------------------------------------------------------------
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (_, node) in graph.nodes() {
        if !seen.insert((node.owner(), node.name())) {
            return Err(EngineError::DuplicateTaskSpec(node.name().to_owned()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints and mutuality
    // -----------------------------------------------------------------------
    graph.check_mutual_edges()?;

    // -----------------------------------------------------------------------
    // 3. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let mut in_degree: Vec<usize> = graph
        .nodes()
        .map(|(_, node)| node.inputs().len())
        .collect();

    // Seed the queue with specs that have no incoming edges.
    let mut queue: VecDeque<SpecId> = graph
        .ids()
        .filter(|id| in_degree[id.index()] == 0)
        .collect();

    let mut sorted: Vec<SpecId> = Vec::with_capacity(graph.len());

    while let Some(id) = queue.pop_front() {
        sorted.push(id);

        for &next in graph.node(id)?.outputs() {
            let degree = &mut in_degree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(next);
            }
        }
    }

    // If we didn't visit every spec the graph contains a cycle.
    if sorted.len() != graph.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}
