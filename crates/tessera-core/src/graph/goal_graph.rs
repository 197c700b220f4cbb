//! Goal dependency graph

use std::collections::VecDeque;

use super::causal::CausalGraph;
use super::landmarks::LandmarkTable;
use super::union_find::UnionFind;
use crate::model::{GoalId, GroundAtom};

/// Undirected graph over goals, stored as an arena with sorted adjacency lists
///
/// Two goals are joined when they share a predicate or their predicates are
/// adjacent in the causal graph. Landmark overlap can add further edges but
/// never removes the structural ones.
#[derive(Debug, Clone)]
pub struct GoalGraph {
    goals: Vec<GroundAtom>,
    adjacency: Vec<Vec<GoalId>>,
}

impl GoalGraph {
    /// Build the graph; pass `landmarks` to enable landmark-overlap edges
    pub fn build(goals: &[GroundAtom], causal: &CausalGraph, landmarks: Option<&LandmarkTable>) -> Self {
        let n = goals.len();
        let mut adjacency = vec![Vec::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                let (pi, pj) = (goals[i].predicate.as_str(), goals[j].predicate.as_str());
                let structural = pi == pj || causal.adjacent(pi, pj);
                let overlap = landmarks.is_some_and(|lm| lm.overlap(i, j));
                if structural || overlap {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }
        Self {
            goals: goals.to_vec(),
            adjacency,
        }
    }

    /// Goal atom for an id
    pub fn goal(&self, id: GoalId) -> &GroundAtom {
        &self.goals[id]
    }

    pub fn goals(&self) -> &[GroundAtom] {
        &self.goals
    }

    pub fn neighbors(&self, id: GoalId) -> &[GoalId] {
        &self.adjacency[id]
    }

    pub fn has_edge(&self, a: GoalId, b: GoalId) -> bool {
        self.adjacency[a].binary_search(&b).is_ok()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Connected components, each in breadth-first discovery order
    ///
    /// Components are found with union-find and ordered by their smallest
    /// goal id; within a component the order is a BFS from that smallest goal
    /// with neighbours visited in id order. This is the "structural" ordering
    /// used when splitting oversize clusters.
    pub fn components(&self) -> Vec<Vec<GoalId>> {
        let mut uf = UnionFind::new(self.len());
        for (a, list) in self.adjacency.iter().enumerate() {
            for &b in list {
                if a < b {
                    uf.union(a, b);
                }
            }
        }

        let mut seen = vec![false; self.len()];
        uf.groups()
            .into_iter()
            .map(|group| {
                let start = group[0];
                let mut order = Vec::with_capacity(group.len());
                let mut queue = VecDeque::from([start]);
                seen[start] = true;
                while let Some(g) = queue.pop_front() {
                    order.push(g);
                    for &n in &self.adjacency[g] {
                        if !seen[n] {
                            seen[n] = true;
                            queue.push_back(n);
                        }
                    }
                }
                order
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LandmarkExtractor;

    fn causal() -> CausalGraph {
        let mut cg = CausalGraph::default();
        cg.add_edge("holding", "welded");
        cg.add_edge("at", "holding");
        cg.add_edge("clean", "painted");
        cg
    }

    #[test]
    fn test_same_predicate_and_causal_edges() {
        let goals = vec![
            GroundAtom::new("holding", ["r1", "t1"]),
            GroundAtom::new("painted", ["p1"]),
            GroundAtom::new("welded", ["s1"]),
            GroundAtom::new("welded", ["s2"]),
        ];
        let graph = GoalGraph::build(&goals, &causal(), None);
        assert!(graph.has_edge(2, 3));
        assert!(graph.has_edge(0, 2));
        assert!(graph.has_edge(0, 3));
        assert!(!graph.has_edge(1, 2));
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_landmark_edges_only_add() {
        let mut cg = causal();
        cg.add_edge("power", "painted");
        cg.add_edge("power", "sealed");
        let goals = vec![GroundAtom::new("painted", ["p1"]), GroundAtom::new("sealed", ["q1"])];

        let plain = GoalGraph::build(&goals, &cg, None);
        assert!(!plain.has_edge(0, 1));

        let table = LandmarkExtractor::new(&cg, 1).extract_all(&goals);
        let with_landmarks = GoalGraph::build(&goals, &cg, Some(&table));
        assert!(with_landmarks.has_edge(0, 1));
    }

    #[test]
    fn test_components_in_bfs_order() {
        let goals = vec![
            GroundAtom::new("a", ["1"]),
            GroundAtom::new("b", ["1"]),
            GroundAtom::new("b", ["2"]),
            GroundAtom::new("c", ["1"]),
        ];
        let mut cg = CausalGraph::default();
        cg.add_edge("a", "c");
        let graph = GoalGraph::build(&goals, &cg, None);
        assert_eq!(graph.components(), vec![vec![0, 3], vec![1, 2]]);
    }
}
