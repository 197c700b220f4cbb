//! Structural clustering of goals with size-bounded splitting

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::graph::GoalGraph;
use crate::model::GoalId;

/// An ordered group of goals produced by decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Member goals, in structural or shuffled order
    pub goals: Vec<GoalId>,
}

impl Cluster {
    pub fn new(goals: Vec<GoalId>) -> Self {
        Self { goals }
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

/// Result of splitting clusters for one attempt
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// Clusters no larger than the configured maximum
    pub clusters: Vec<Cluster>,
    /// Oversize clusters that were shuffled before slicing
    pub shuffled: usize,
    /// Oversize clusters sliced in structural order
    pub structural: usize,
}

/// Connected-component clustering followed by ε-greedy splitting
#[derive(Debug, Clone, Copy)]
pub struct ClusterDecomposer {
    max_cluster_size: usize,
}

impl ClusterDecomposer {
    /// `max_cluster_size` below 1 is treated as 1
    pub fn new(max_cluster_size: usize) -> Self {
        Self {
            max_cluster_size: max_cluster_size.max(1),
        }
    }

    pub fn max_cluster_size(&self) -> usize {
        self.max_cluster_size
    }

    /// Step A: one cluster per connected component of the goal graph
    pub fn components(&self, graph: &GoalGraph) -> Vec<Cluster> {
        graph.components().into_iter().map(Cluster::new).collect()
    }

    /// Step B: split oversize clusters into contiguous chunks
    ///
    /// For each oversize cluster one draw decides the ordering: with
    /// probability `epsilon` the goals are shuffled, otherwise the structural
    /// order is kept. Splitting may separate causally related goals; that is
    /// the price of a bounded cluster size.
    pub fn split<R: Rng + ?Sized>(&self, components: &[Cluster], epsilon: f64, rng: &mut R) -> SplitOutcome {
        let mut clusters = Vec::with_capacity(components.len());
        let mut shuffled = 0;
        let mut structural = 0;

        for component in components {
            if component.len() <= self.max_cluster_size {
                clusters.push(component.clone());
                continue;
            }

            let mut goals = component.goals.clone();
            if rng.gen_bool(epsilon.clamp(0.0, 1.0)) {
                goals.shuffle(rng);
                shuffled += 1;
            } else {
                structural += 1;
            }
            clusters.extend(
                goals
                    .chunks(self.max_cluster_size)
                    .map(|chunk| Cluster::new(chunk.to_vec())),
            );
        }

        SplitOutcome {
            clusters,
            shuffled,
            structural,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn oversize() -> Vec<Cluster> {
        vec![Cluster::new((0..10).collect()), Cluster::new(vec![10, 11])]
    }

    #[test]
    fn test_small_clusters_untouched() {
        let decomposer = ClusterDecomposer::new(4);
        let components = vec![Cluster::new(vec![0, 1, 2]), Cluster::new(vec![3, 4])];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = decomposer.split(&components, 1.0, &mut rng);
        assert_eq!(outcome.clusters, components);
        assert_eq!(outcome.shuffled + outcome.structural, 0);
    }

    #[test]
    fn test_structural_split_keeps_order() {
        let decomposer = ClusterDecomposer::new(4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = decomposer.split(&oversize(), 0.0, &mut rng);
        assert_eq!(outcome.structural, 1);
        assert_eq!(
            outcome.clusters,
            vec![
                Cluster::new(vec![0, 1, 2, 3]),
                Cluster::new(vec![4, 5, 6, 7]),
                Cluster::new(vec![8, 9]),
                Cluster::new(vec![10, 11]),
            ]
        );
    }

    #[test]
    fn test_random_split_preserves_members() {
        let decomposer = ClusterDecomposer::new(3);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let outcome = decomposer.split(&oversize(), 1.0, &mut rng);
        assert_eq!(outcome.shuffled, 1);
        assert!(outcome.clusters.iter().all(|c| c.len() <= 3));

        let mut all: Vec<GoalId> = outcome.clusters.iter().flat_map(|c| c.goals.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_size_treated_as_one() {
        let decomposer = ClusterDecomposer::new(0);
        assert_eq!(decomposer.max_cluster_size(), 1);
    }
}
