use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::model::PlanState;

use super::node::{Node, NodeName};

/// A routing decision for the single conditional edge.
pub type DecideFn = fn(&PlanState) -> NodeName;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node `{0}`")]
    DuplicateNode(NodeName),
    #[error("edge references unregistered node `{0}`")]
    UnknownNode(NodeName),
    #[error("node `{0}` already has an outgoing edge")]
    DuplicateEdge(NodeName),
    #[error("no entry point set")]
    MissingEntry,
    #[error("static edges form a cycle")]
    CycleDetected,
    #[error("node `{0}` is unreachable from the entry point")]
    Unreachable(NodeName),
}

/// Builder for a [`CompiledGraph`]: named nodes, static edges, and at most
/// one conditional edge.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<NodeName, Arc<dyn Node>>,
    edges: HashMap<NodeName, NodeName>,
    conditional: Option<(NodeName, Vec<NodeName>, DecideFn)>,
    entry: Option<NodeName>,
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, node: Arc<dyn Node>) -> Result<Self, GraphError> {
        let name = node.name();
        if self.nodes.insert(name, node).is_some() {
            return Err(GraphError::DuplicateNode(name));
        }
        Ok(self)
    }

    pub fn set_entry(mut self, entry: NodeName) -> Self {
        self.entry = Some(entry);
        self
    }

    /// A static edge: after `from` completes, run `to`.
    pub fn add_edge(mut self, from: NodeName, to: NodeName) -> Result<Self, GraphError> {
        if self.edges.insert(from, to).is_some() {
            return Err(GraphError::DuplicateEdge(from));
        }
        Ok(self)
    }

    /// The conditional edge: after `from` completes, `decide` picks one of
    /// `targets` based on the merged state.
    pub fn add_conditional_edge(
        mut self,
        from: NodeName,
        targets: Vec<NodeName>,
        decide: DecideFn,
    ) -> Self {
        self.conditional = Some((from, targets, decide));
        self
    }

    /// Validate and freeze the graph.
    ///
    /// The static edge set must be acyclic. The conditional edge is allowed
    /// to point backwards (the bounded retry edge does) so it is excluded
    /// from the cycle check but included in the reachability check.
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownNode(entry));
        }
        for (from, to) in &self.edges {
            for name in [from, to] {
                if !self.nodes.contains_key(name) {
                    return Err(GraphError::UnknownNode(*name));
                }
            }
        }
        if let Some((from, targets, _)) = &self.conditional {
            for name in std::iter::once(from).chain(targets.iter()) {
                if !self.nodes.contains_key(name) {
                    return Err(GraphError::UnknownNode(*name));
                }
            }
        }

        let mut graph = DiGraph::<NodeName, ()>::new();
        let mut index_map: HashMap<NodeName, NodeIndex> = HashMap::new();
        for name in self.nodes.keys() {
            index_map.insert(*name, graph.add_node(*name));
        }
        for (from, to) in &self.edges {
            graph.add_edge(index_map[from], index_map[to], ());
        }
        if is_cyclic_directed(&graph) {
            return Err(GraphError::CycleDetected);
        }

        // Reachability over static + conditional edges.
        let mut reachable = std::collections::HashSet::from([entry]);
        let mut frontier = vec![entry];
        while let Some(current) = frontier.pop() {
            let mut successors: Vec<NodeName> = Vec::new();
            if let Some(to) = self.edges.get(&current) {
                successors.push(*to);
            }
            if let Some((from, targets, _)) = &self.conditional {
                if *from == current {
                    successors.extend(targets.iter().copied());
                }
            }
            for next in successors {
                if reachable.insert(next) {
                    frontier.push(next);
                }
            }
        }
        if let Some(name) = self.nodes.keys().find(|n| !reachable.contains(*n)) {
            return Err(GraphError::Unreachable(*name));
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            conditional: self.conditional,
            entry,
        })
    }
}

/// An immutable, validated graph. Compiled once per process and shared
/// across requests; holds no per-request state.
pub struct CompiledGraph {
    nodes: HashMap<NodeName, Arc<dyn Node>>,
    edges: HashMap<NodeName, NodeName>,
    conditional: Option<(NodeName, Vec<NodeName>, DecideFn)>,
    entry: NodeName,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish()
    }
}

impl CompiledGraph {
    pub fn entry(&self) -> NodeName {
        self.entry
    }

    pub fn node(&self, name: NodeName) -> &Arc<dyn Node> {
        &self.nodes[&name]
    }

    /// The node to run after `current`, or `None` at the end of the graph.
    /// The conditional edge takes precedence over static edges.
    pub fn next(&self, current: NodeName, state: &PlanState) -> Option<NodeName> {
        if let Some((from, _, decide)) = &self.conditional {
            if *from == current {
                return Some(decide(state));
            }
        }
        self.edges.get(&current).copied()
    }
}
