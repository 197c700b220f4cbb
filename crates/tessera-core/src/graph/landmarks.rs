//! Heuristic landmark extraction
//!
//! A goal's landmarks are the predicates found by walking the causal graph
//! backwards from the goal's predicate for a bounded number of levels. This
//! is not a landmark proof, only a cheap signal of which intermediate facts a
//! goal is likely to need. The depth bound keeps cyclic graphs finite.

use std::collections::{BTreeSet, HashSet};

use super::causal::CausalGraph;
use crate::model::{GoalId, GroundAtom};

/// Smallest useful depth bound
pub const MIN_LANDMARK_DEPTH: u8 = 1;
/// Largest depth bound drawn when the depth is randomised
pub const MAX_LANDMARK_DEPTH: u8 = 3;

/// Backward traversal over a causal graph
#[derive(Debug, Clone, Copy)]
pub struct LandmarkExtractor<'a> {
    graph: &'a CausalGraph,
    depth: u8,
}

impl<'a> LandmarkExtractor<'a> {
    pub fn new(graph: &'a CausalGraph, depth: u8) -> Self {
        Self { graph, depth }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Landmark predicates of a single goal
    ///
    /// Breadth-first over predecessor edges, each predicate visited once. The
    /// goal's own predicate is excluded even when a cycle leads back to it.
    pub fn extract(&self, goal: &GroundAtom) -> BTreeSet<String> {
        let root = goal.predicate.as_str();
        let mut visited: HashSet<&str> = HashSet::from([root]);
        let mut landmarks = BTreeSet::new();
        let mut frontier = vec![root];

        for _ in 0..self.depth {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for q in frontier {
                for p in self.graph.predecessors(q) {
                    if visited.insert(p) {
                        landmarks.insert(p.to_string());
                        next.push(p);
                    }
                }
            }
            frontier = next;
        }
        landmarks
    }

    /// Landmark sets for every goal, indexed by goal id
    pub fn extract_all(&self, goals: &[GroundAtom]) -> LandmarkTable {
        LandmarkTable {
            sets: goals.iter().map(|g| self.extract(g)).collect(),
        }
    }
}

/// Per-goal landmark sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandmarkTable {
    sets: Vec<BTreeSet<String>>,
}

impl LandmarkTable {
    /// A table of empty sets, used when landmarks are disabled
    pub fn empty(goal_count: usize) -> Self {
        Self {
            sets: vec![BTreeSet::new(); goal_count],
        }
    }

    /// Landmarks of one goal
    pub fn get(&self, goal: GoalId) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.sets.get(goal).unwrap_or(&EMPTY)
    }

    /// Whether two goals share at least one landmark
    pub fn overlap(&self, a: GoalId, b: GoalId) -> bool {
        !self.get(a).is_disjoint(self.get(b))
    }

    /// Union of the landmark sets of several goals
    pub fn union<'g>(&self, goals: impl IntoIterator<Item = &'g GoalId>) -> BTreeSet<String> {
        goals
            .into_iter()
            .flat_map(|&g| self.get(g).iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
