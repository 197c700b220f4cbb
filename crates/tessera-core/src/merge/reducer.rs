//! Constraint-preserving reduction of the subtask count

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraints::{ConstraintSet, RejectionCounts};
use super::objectives::{ObjectiveScorer, PairFeatures, SizeStats};
use crate::model::GroundAtom;
use crate::subtask::{SubTask, renumber};

/// Merge counters for one reduction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Merges of subtasks with identical role signatures
    pub same_signature: usize,
    /// Merges chosen by score while over the bound
    pub scored: usize,
    pub rejections: RejectionCounts,
}

impl MergeStats {
    pub fn merges(&self) -> usize {
        self.same_signature + self.scored
    }
}

/// Output of [`SubtaskCountReducer::reduce`]
#[derive(Debug, Clone)]
pub struct Reduction {
    /// Subtasks renumbered `0..n`
    pub subtasks: Vec<SubTask>,
    pub stats: MergeStats,
}

/// Merges subtasks while a validated merge exists and the count exceeds the bound
///
/// Every merge, including same-signature ones, goes through the
/// [`ConstraintSet`]. A merged subtask takes the place of the first subtask
/// of its pair, so list order stays stable across iterations.
pub struct SubtaskCountReducer<'a> {
    constraints: &'a ConstraintSet,
    goals: &'a [GroundAtom],
    max_subtasks: usize,
    scorer: Option<&'a ObjectiveScorer>,
}

impl<'a> SubtaskCountReducer<'a> {
    pub fn new(constraints: &'a ConstraintSet, goals: &'a [GroundAtom], max_subtasks: usize) -> Self {
        Self {
            constraints,
            goals,
            max_subtasks,
            scorer: None,
        }
    }

    /// Rank over-bound merges with objectives instead of the structural score
    pub fn with_scorer(mut self, scorer: &'a ObjectiveScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Reduce `subtasks`, returning them renumbered
    ///
    /// Same-signature merging runs first and always runs, even when the
    /// count is already within the bound. It works across cluster boundaries,
    /// so with no cluster keys every subtask has the empty signature and all
    /// of them are folded together unless a constraint rejects the merge.
    /// Configure a goal limit or merge constraints to keep clusters apart.
    /// Scored merges then run only while the count exceeds the bound.
    pub fn reduce<R: Rng + ?Sized>(&self, mut subtasks: Vec<SubTask>, rng: &mut R) -> Reduction {
        let mut stats = MergeStats::default();

        self.merge_same_signature(&mut subtasks, &mut stats);

        let mut sizes = SizeStats::of(&subtasks);
        while subtasks.len() > self.max_subtasks {
            let Some((i, j)) = self.best_pair(&subtasks, &sizes, &mut stats, rng) else {
                debug!(
                    count = subtasks.len(),
                    bound = self.max_subtasks,
                    "No compatible pair left"
                );
                break;
            };
            sizes.apply_merge(subtasks[i].len(), subtasks[j].len());
            let absorbed = subtasks.remove(j);
            subtasks[i] = subtasks[i].merged(&absorbed);
            stats.scored += 1;
        }

        renumber(&mut subtasks);
        Reduction { subtasks, stats }
    }

    /// Phase 1: fold every later subtask with an identical signature into the first one
    fn merge_same_signature(&self, subtasks: &mut Vec<SubTask>, stats: &mut MergeStats) {
        let mut i = 0;
        while i < subtasks.len() {
            let mut j = i + 1;
            while j < subtasks.len() {
                if subtasks[i].signature != subtasks[j].signature {
                    j += 1;
                    continue;
                }
                match self.constraints.check(&subtasks[i], &subtasks[j], self.goals) {
                    Ok(()) => {
                        let absorbed = subtasks.remove(j);
                        subtasks[i] = subtasks[i].merged(&absorbed);
                        stats.same_signature += 1;
                    }
                    Err(rejection) => {
                        debug!(left = subtasks[i].id, right = subtasks[j].id, %rejection, "Merge rejected");
                        stats.rejections.record(&rejection);
                        j += 1;
                    }
                }
            }
            i += 1;
        }
    }

    /// Phase 2: highest-scoring compatible pair, earliest pair on ties
    fn best_pair<R: Rng + ?Sized>(
        &self,
        subtasks: &[SubTask],
        sizes: &SizeStats,
        stats: &mut MergeStats,
        rng: &mut R,
    ) -> Option<(usize, usize)> {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..subtasks.len() {
            for j in (i + 1)..subtasks.len() {
                let (a, b) = (&subtasks[i], &subtasks[j]);
                if let Err(rejection) = self.constraints.check(a, b, self.goals) {
                    debug!(left = a.id, right = b.id, %rejection, "Merge rejected");
                    stats.rejections.record(&rejection);
                    continue;
                }
                let score = self.score(a, b, sizes, rng);
                if best.is_none_or(|(top, _, _)| score > top) {
                    best = Some((score, i, j));
                }
            }
        }
        best.map(|(_, i, j)| (i, j))
    }

    fn score<R: Rng + ?Sized>(&self, a: &SubTask, b: &SubTask, sizes: &SizeStats, rng: &mut R) -> f64 {
        let common_sources = self.constraints.common_sources(a, b, self.goals);
        let shared_landmarks = a.landmarks.intersection(&b.landmarks).count();
        match self.scorer {
            None => 10.0 * common_sources as f64 + 2.0 * shared_landmarks as f64 - (a.len() + b.len()) as f64,
            Some(scorer) => {
                let pair = PairFeatures {
                    left_size: a.len(),
                    right_size: b.len(),
                    shared_landmarks,
                    multi_valued_roles: a.signature.merge(&b.signature).multi_valued(),
                    common_sources,
                };
                scorer.score(&pair, sizes, rng)
            }
        }
    }
}
