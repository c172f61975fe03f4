//! Template instantiation dependency graph
//!
//! Every instantiation records an edge from the template being
//! instantiated to each template its arguments or members pull in.
//! Self-recursive template chains then show up as cycles, letting the
//! engine refuse further expansion deterministically instead of relying
//! on the depth guard alone.

use crate::bindings::BindingId;
use indexmap::IndexMap;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

#[derive(Debug, Default)]
pub struct InstantiationGraph {
    graph: DiGraph<BindingId, ()>,
    nodes: IndexMap<BindingId, NodeIndex>,
}

impl InstantiationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, binding: BindingId) -> NodeIndex {
        if let Some(idx) = self.nodes.get(&binding) {
            return *idx;
        }
        let idx = self.graph.add_node(binding);
        self.nodes.insert(binding, idx);
        idx
    }

    /// Record that instantiating `from` requires instantiating `to`.
    pub fn add_dependency(&mut self, from: BindingId, to: BindingId) {
        let from = self.node(from);
        let to = self.node(to);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Whether any recorded dependency chain is cyclic.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Whether adding `from → to` would close a cycle.
    pub fn would_cycle(&mut self, from: BindingId, to: BindingId) -> bool {
        if from == to {
            return true;
        }
        let from = self.node(from);
        let to = self.node(to);
        petgraph::algo::has_path_connecting(&self.graph, to, from, None)
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_are_detected() {
        let mut graph = InstantiationGraph::new();
        graph.add_dependency(BindingId(1), BindingId(2));
        graph.add_dependency(BindingId(2), BindingId(3));
        assert!(!graph.has_cycle());
        assert!(graph.would_cycle(BindingId(3), BindingId(1)));
        graph.add_dependency(BindingId(3), BindingId(1));
        assert!(graph.has_cycle());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut graph = InstantiationGraph::new();
        assert!(graph.would_cycle(BindingId(7), BindingId(7)));
    }
}
