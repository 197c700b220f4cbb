//! Role-based refinement of clusters into subtasks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::engine::RoleTable;
use super::schema::RoleSchema;
use crate::decomposition::Cluster;
use crate::error::{Error, Result};
use crate::graph::LandmarkTable;
use crate::model::{GoalId, GroundAtom};
use crate::subtask::{RoleSignature, SubTask};

/// What to do with a goal whose cluster key cannot be resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    /// Place the goal in its own subtask and count it
    #[default]
    Partial,
    /// Abort with [`Error::RoleUnresolved`]
    Fail,
}

/// Subtasks produced from one set of clusters
#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    /// Subtasks in cluster order, numbered `0..n`
    pub subtasks: Vec<SubTask>,
    /// Goals isolated because a cluster key was unresolved
    pub unresolved_singletons: usize,
}

/// Groups the goals of each cluster by their cluster-key role values
pub struct RolePartitioner<'a> {
    schema: &'a RoleSchema,
    on_missing: OnMissing,
}

impl<'a> RolePartitioner<'a> {
    pub fn new(schema: &'a RoleSchema, on_missing: OnMissing) -> Self {
        Self { schema, on_missing }
    }

    /// Split every cluster into equivalence groups
    ///
    /// Groups never cross cluster boundaries and keep the order in which
    /// their first member appears in the cluster.
    pub fn partition(
        &self,
        clusters: &[Cluster],
        roles: &RoleTable,
        landmarks: &LandmarkTable,
        goals: &[GroundAtom],
    ) -> Result<PartitionOutcome> {
        let mut subtasks = Vec::new();
        let mut unresolved_singletons = 0;

        for cluster in clusters {
            let mut groups: Vec<Vec<GoalId>> = Vec::new();
            let mut by_key: BTreeMap<Vec<&str>, usize> = BTreeMap::new();

            for &goal in &cluster.goals {
                match self.key_of(goal, roles) {
                    Ok(key) => {
                        let slot = *by_key.entry(key).or_insert_with(|| {
                            groups.push(Vec::new());
                            groups.len() - 1
                        });
                        groups[slot].push(goal);
                    }
                    Err(role) => {
                        if self.on_missing == OnMissing::Fail {
                            return Err(Error::RoleUnresolved {
                                goal: goals[goal].to_string(),
                                role: role.to_string(),
                            });
                        }
                        debug!(goal = %goals[goal], role, "Cluster key unresolved, isolating goal");
                        unresolved_singletons += 1;
                        groups.push(vec![goal]);
                    }
                }
            }

            for members in groups {
                let signature = RoleSignature::from_assignments(members.iter().map(|&g| roles.get(g)));
                let landmark_set = landmarks.union(&members);
                subtasks.push(SubTask::new(subtasks.len(), members, landmark_set, signature));
            }
        }

        Ok(PartitionOutcome {
            subtasks,
            unresolved_singletons,
        })
    }

    /// Cluster-key tuple of a goal, or the first key role it lacks
    fn key_of<'r>(&'r self, goal: GoalId, roles: &'r RoleTable) -> std::result::Result<Vec<&'r str>, &'r str> {
        let assignment = roles.get(goal);
        self.schema
            .cluster_keys()
            .iter()
            .map(|key| assignment.value(key).ok_or(key.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FactIndex;
    use crate::roles::{OnAmbiguous, RoleExtractionEngine};

    struct Fixture {
        goals: Vec<GroundAtom>,
        schema: RoleSchema,
        table: RoleTable,
    }

    fn fixture() -> Fixture {
        let goals = vec![
            GroundAtom::new("welded", ["s1"]),
            GroundAtom::new("welded", ["s2"]),
            GroundAtom::new("welded", ["s3"]),
            GroundAtom::new("welded", ["s4"]),
        ];
        let facts = vec![
            GroundAtom::new("reachable", ["b1", "s1"]),
            GroundAtom::new("reachable", ["b2", "s2"]),
            GroundAtom::new("reachable", ["b1", "s3"]),
        ];
        let schema = RoleSchema::from_json(
            r#"{
                "roles": [{"name": "base", "extractors": [
                    {"predicate": "reachable", "bindings": {"1": "goal:0"}, "value_arg": 0}
                ]}],
                "cluster_keys": ["base"]
            }"#,
        )
        .unwrap();
        let index = FactIndex::new(&facts);
        let table = RoleExtractionEngine::new(&schema, &index, OnAmbiguous::First)
            .assign_all(&goals)
            .unwrap();
        Fixture { goals, schema, table }
    }

    #[test]
    fn test_groups_by_key_and_isolates_unresolved() {
        let f = fixture();
        let clusters = vec![Cluster::new(vec![0, 1, 2, 3])];
        let landmarks = LandmarkTable::empty(4);
        let outcome = RolePartitioner::new(&f.schema, OnMissing::Partial)
            .partition(&clusters, &f.table, &landmarks, &f.goals)
            .unwrap();

        let groups: Vec<Vec<GoalId>> = outcome.subtasks.iter().map(|s| s.goals.clone()).collect();
        assert_eq!(groups, vec![vec![0, 2], vec![1], vec![3]]);
        assert_eq!(outcome.unresolved_singletons, 1);
        assert!(outcome.subtasks[2].signature.is_empty());
        assert_eq!(outcome.subtasks.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_groups_stay_within_clusters() {
        let f = fixture();
        let clusters = vec![Cluster::new(vec![0, 1]), Cluster::new(vec![2, 3])];
        let landmarks = LandmarkTable::empty(4);
        let outcome = RolePartitioner::new(&f.schema, OnMissing::Partial)
            .partition(&clusters, &f.table, &landmarks, &f.goals)
            .unwrap();
        assert_eq!(outcome.subtasks.len(), 4);
    }

    #[test]
    fn test_missing_key_fails_in_strict_mode() {
        let f = fixture();
        let clusters = vec![Cluster::new(vec![0, 1, 2, 3])];
        let landmarks = LandmarkTable::empty(4);
        let err = RolePartitioner::new(&f.schema, OnMissing::Fail)
            .partition(&clusters, &f.table, &landmarks, &f.goals)
            .unwrap_err();
        assert!(matches!(err, Error::RoleUnresolved { ref role, .. } if role == "base"));
    }
}
