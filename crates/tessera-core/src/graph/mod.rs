//! Structural graphs over predicates and goals
//!
//! - **Causal graph**: predicate → predicate edges from action preconditions
//!   to add effects.
//! - **Landmarks**: bounded backward traversal of the causal graph per goal.
//! - **Goal graph**: undirected goal dependencies and their connected
//!   components, computed with a union-find over goal indices.

mod causal;
mod goal_graph;
mod landmarks;
mod union_find;

pub use causal::CausalGraph;
pub use goal_graph::GoalGraph;
pub use landmarks::{LandmarkExtractor, LandmarkTable, MAX_LANDMARK_DEPTH, MIN_LANDMARK_DEPTH};
pub use union_find::UnionFind;
