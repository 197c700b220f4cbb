//! Predicate-level causal graph

use std::collections::{BTreeMap, BTreeSet};

use crate::model::PlanningModel;

/// Directed graph over predicate names
///
/// Edge `p → q` exists iff some action has `p` among its precondition
/// predicates and `q` among its add-effect predicates.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    successors: BTreeMap<String, BTreeSet<String>>,
    predecessors: BTreeMap<String, BTreeSet<String>>,
}

impl CausalGraph {
    /// Build the graph from the model's action schemas
    pub fn build(model: &PlanningModel) -> Self {
        let mut graph = Self::default();
        for name in model.predicates().keys() {
            graph.add_node(name);
        }

        for action in model.actions().values() {
            let pre: BTreeSet<&str> = action
                .preconditions
                .iter()
                .map(|a| a.predicate.as_str())
                .collect();
            let add: BTreeSet<&str> = action
                .add_effects
                .iter()
                .map(|a| a.predicate.as_str())
                .collect();
            for p in &pre {
                for q in &add {
                    graph.add_edge(p, q);
                }
            }
        }
        graph
    }

    fn add_node(&mut self, name: &str) {
        self.successors.entry(name.to_string()).or_default();
        self.predecessors.entry(name.to_string()).or_default();
    }

    /// Insert edge `from → to`, creating nodes as needed
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        if let Some(s) = self.successors.get_mut(from) {
            s.insert(to.to_string());
        }
        if let Some(p) = self.predecessors.get_mut(to) {
            p.insert(from.to_string());
        }
    }

    /// Predicates directly enabled by `predicate`
    pub fn successors<'a>(&'a self, predicate: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.successors
            .get(predicate)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Predicates that directly enable `predicate`
    pub fn predecessors<'a>(&'a self, predicate: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.predecessors
            .get(predicate)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Whether `from → to` is an edge
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.successors
            .get(from)
            .is_some_and(|s| s.contains(to))
    }

    /// Whether the two predicates are joined by an edge in either direction
    pub fn adjacent(&self, a: &str, b: &str) -> bool {
        self.has_edge(a, b) || self.has_edge(b, a)
    }

    /// Node names in sorted order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.successors.keys().map(String::as_str)
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.successors.values().map(BTreeSet::len).sum()
    }

    /// Successor map, for reporting
    pub fn as_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.successors
    }
}
