//! Physical merge constraints
//!
//! A merge is allowed only if the combined subtask could still be served by
//! one physical setup: every resource object reachable from a common source
//! for each binary predicate, a single type per type predicate, and an
//! optional role that must keep one value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::config::ConstraintsConfig;
use crate::error::{Error, Result};
use crate::model::{FactIndex, GroundAtom, PlanningModel};
use crate::subtask::SubTask;

/// Why a pair of subtasks was not merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeRejection {
    GoalLimit { size: usize, limit: usize },
    NoCommonSource { predicate: String },
    TypeConflict { predicate: String },
    TypeRoleConflict { role: String },
}

impl fmt::Display for MergeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoalLimit { size, limit } => write!(f, "merged size {} exceeds goal limit {}", size, limit),
            Self::NoCommonSource { predicate } => write!(f, "no common source under '{}'", predicate),
            Self::TypeConflict { predicate } => write!(f, "resources of several types under '{}'", predicate),
            Self::TypeRoleConflict { role } => write!(f, "role '{}' would take several values", role),
        }
    }
}

/// Rejection counters, one per reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub goal_limit: usize,
    pub no_common_source: usize,
    pub type_conflict: usize,
    pub type_role: usize,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: &MergeRejection) {
        match rejection {
            MergeRejection::GoalLimit { .. } => self.goal_limit += 1,
            MergeRejection::NoCommonSource { .. } => self.no_common_source += 1,
            MergeRejection::TypeConflict { .. } => self.type_conflict += 1,
            MergeRejection::TypeRoleConflict { .. } => self.type_role += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.goal_limit + self.no_common_source + self.type_conflict + self.type_role
    }

    pub fn add(&mut self, other: &RejectionCounts) {
        self.goal_limit += other.goal_limit;
        self.no_common_source += other.no_common_source;
        self.type_conflict += other.type_conflict;
        self.type_role += other.type_role;
    }
}

/// Predicate relation keyed by one argument: key → related objects
#[derive(Debug, Clone, Default)]
struct Relation {
    predicate: String,
    related: HashMap<String, BTreeSet<String>>,
}

impl Relation {
    /// `key_arg` selects the lookup position, the other position is collected
    fn build(predicate: &str, facts: &FactIndex, key_arg: usize, value_arg: usize) -> Self {
        let mut related: HashMap<String, BTreeSet<String>> = HashMap::new();
        for tuple in facts.tuples(predicate) {
            if let (Some(key), Some(value)) = (tuple.get(key_arg), tuple.get(value_arg)) {
                related.entry(key.clone()).or_default().insert(value.clone());
            }
        }
        Self {
            predicate: predicate.to_string(),
            related,
        }
    }

    fn of(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.related.get(key)
    }
}

/// Compiled merge constraints
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    goal_limit: Option<usize>,
    resource_arg: usize,
    /// target → sources, per binary predicate
    binary: Vec<Relation>,
    /// target → types, per type predicate
    types: Vec<Relation>,
    type_role: Option<String>,
}

impl ConstraintSet {
    /// No constraint at all; every pair is compatible
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Compile the configured constraints against a model
    ///
    /// Every configured predicate must be declared in the domain or used in
    /// the initial facts.
    pub fn compile(config: &ConstraintsConfig, goal_limit: Option<usize>, model: &PlanningModel) -> Result<Self> {
        for predicate in config.binary_predicates.iter().chain(&config.type_predicates) {
            if !model.knows_predicate(predicate) {
                return Err(Error::UnknownConstraintPredicate(predicate.clone()));
            }
        }

        let facts = model.facts();
        Ok(Self {
            goal_limit,
            resource_arg: config.resource_arg,
            binary: config
                .binary_predicates
                .iter()
                .map(|p| Relation::build(p, facts, 1, 0))
                .collect(),
            types: config
                .type_predicates
                .iter()
                .map(|p| Relation::build(p, facts, 0, 1))
                .collect(),
            type_role: config.type_role.clone(),
        })
    }

    pub fn goal_limit(&self) -> Option<usize> {
        self.goal_limit
    }

    pub fn type_role(&self) -> Option<&str> {
        self.type_role.as_deref()
    }

    /// Whether any check is configured
    pub fn is_empty(&self) -> bool {
        self.goal_limit.is_none() && self.binary.is_empty() && self.types.is_empty() && self.type_role.is_none()
    }

    /// Check whether `a` and `b` may be merged
    pub fn check(&self, a: &SubTask, b: &SubTask, goals: &[GroundAtom]) -> std::result::Result<(), MergeRejection> {
        if let Some(limit) = self.goal_limit {
            let size = a.len() + b.len();
            if size > limit {
                return Err(MergeRejection::GoalLimit { size, limit });
            }
        }

        if !self.binary.is_empty() || !self.types.is_empty() {
            let resources = self.resources(a, b, goals);

            // No resource objects means no provable common source
            for relation in &self.binary {
                if common(relation, &resources).is_empty() {
                    return Err(MergeRejection::NoCommonSource {
                        predicate: relation.predicate.clone(),
                    });
                }
            }

            for relation in &self.types {
                let kinds: BTreeSet<&str> = resources
                    .iter()
                    .filter_map(|r| relation.of(r))
                    .flatten()
                    .map(String::as_str)
                    .collect();
                if kinds.len() > 1 {
                    return Err(MergeRejection::TypeConflict {
                        predicate: relation.predicate.clone(),
                    });
                }
            }
        }

        if let Some(role) = &self.type_role {
            let merged = a.signature.merge(&b.signature);
            if merged.get(role).is_some_and(|v| !v.is_single()) {
                return Err(MergeRejection::TypeRoleConflict { role: role.clone() });
            }
        }

        Ok(())
    }

    /// Sources shared by every resource of the merged pair, summed over binary predicates
    pub fn common_sources(&self, a: &SubTask, b: &SubTask, goals: &[GroundAtom]) -> usize {
        if self.binary.is_empty() {
            return 0;
        }
        let resources = self.resources(a, b, goals);
        if resources.is_empty() {
            return 0;
        }
        self.binary.iter().map(|r| common(r, &resources).len()).sum()
    }

    /// Resource objects of the goals of both subtasks
    fn resources<'g>(&self, a: &SubTask, b: &SubTask, goals: &'g [GroundAtom]) -> BTreeSet<&'g str> {
        a.goals
            .iter()
            .chain(&b.goals)
            .filter_map(|&g| goals.get(g).and_then(|atom| atom.arg(self.resource_arg)))
            .collect()
    }
}

/// Objects related to every resource
fn common<'r>(relation: &'r Relation, resources: &BTreeSet<&str>) -> BTreeSet<&'r str> {
    let mut iter = resources.iter();
    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };
    let mut shared: BTreeSet<&str> = match relation.of(first) {
        Some(set) => set.iter().map(String::as_str).collect(),
        None => return BTreeSet::new(),
    };
    for resource in iter {
        match relation.of(resource) {
            Some(set) => shared.retain(|s| set.contains(*s)),
            None => return BTreeSet::new(),
        }
        if shared.is_empty() {
            break;
        }
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PredicateSchema;
    use crate::subtask::{RoleSignature, RoleValue};

    fn model() -> PlanningModel {
        PlanningModel::builder("weld", "p1")
            .predicate(PredicateSchema::new("reachable", ["base", "spot"]))
            .predicate(PredicateSchema::new("spot_type", ["spot", "kind"]))
            .predicate(PredicateSchema::new("welded", ["spot"]))
            .init(GroundAtom::new("reachable", ["b1", "s1"]))
            .init(GroundAtom::new("reachable", ["b1", "s2"]))
            .init(GroundAtom::new("reachable", ["b2", "s2"]))
            .init(GroundAtom::new("reachable", ["b2", "s3"]))
            .init(GroundAtom::new("spot_type", ["s1", "arc"]))
            .init(GroundAtom::new("spot_type", ["s2", "arc"]))
            .init(GroundAtom::new("spot_type", ["s3", "spot"]))
            .goal(GroundAtom::new("welded", ["s1"]))
            .goal(GroundAtom::new("welded", ["s2"]))
            .goal(GroundAtom::new("welded", ["s3"]))
            .build()
            .unwrap()
    }

    fn single(id: usize, goal: usize) -> SubTask {
        SubTask::new(id, vec![goal], BTreeSet::new(), RoleSignature::default())
    }

    fn config(binary: &[&str], types: &[&str]) -> ConstraintsConfig {
        ConstraintsConfig {
            binary_predicates: binary.iter().map(|s| s.to_string()).collect(),
            type_predicates: types.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unconstrained_accepts_everything() {
        let model = model();
        let set = ConstraintSet::unconstrained();
        assert!(set.is_empty());
        assert!(set.check(&single(0, 0), &single(1, 2), model.goals()).is_ok());
    }

    #[test]
    fn test_binary_common_source() {
        let model = model();
        let set = ConstraintSet::compile(&config(&["reachable"], &[]), None, &model).unwrap();
        let goals = model.goals();

        assert!(set.check(&single(0, 0), &single(1, 1), goals).is_ok());
        assert!(set.check(&single(0, 1), &single(1, 2), goals).is_ok());
        assert_eq!(
            set.check(&single(0, 0), &single(1, 2), goals),
            Err(MergeRejection::NoCommonSource {
                predicate: "reachable".into()
            })
        );
        assert_eq!(set.common_sources(&single(0, 0), &single(1, 1), goals), 1);
    }

    #[test]
    fn test_binary_rejects_goals_without_resources() {
        let model = PlanningModel::builder("weld", "p1")
            .predicate(PredicateSchema::new("reachable", ["base", "spot"]))
            .init(GroundAtom::new("reachable", ["b1", "s1"]))
            .goal(GroundAtom::new("alpha", Vec::<String>::new()))
            .goal(GroundAtom::new("beta", Vec::<String>::new()))
            .build()
            .unwrap();
        let set = ConstraintSet::compile(&config(&["reachable"], &[]), None, &model).unwrap();
        assert_eq!(
            set.check(&single(0, 0), &single(1, 1), model.goals()),
            Err(MergeRejection::NoCommonSource {
                predicate: "reachable".into()
            })
        );

        let out_of_range = ConstraintsConfig {
            resource_arg: 3,
            ..config(&["reachable"], &[])
        };
        let model = self::model();
        let set = ConstraintSet::compile(&out_of_range, None, &model).unwrap();
        assert!(matches!(
            set.check(&single(0, 0), &single(1, 1), model.goals()),
            Err(MergeRejection::NoCommonSource { .. })
        ));
    }

    #[test]
    fn test_type_predicate() {
        let model = model();
        let set = ConstraintSet::compile(&config(&[], &["spot_type"]), None, &model).unwrap();
        let goals = model.goals();
        assert!(set.check(&single(0, 0), &single(1, 1), goals).is_ok());
        assert!(matches!(
            set.check(&single(0, 1), &single(1, 2), goals),
            Err(MergeRejection::TypeConflict { .. })
        ));
    }

    #[test]
    fn test_goal_limit_and_type_role() {
        let model = model();
        let cfg = ConstraintsConfig {
            type_role: Some("tool".into()),
            ..Default::default()
        };
        let set = ConstraintSet::compile(&cfg, Some(1), &model).unwrap();
        let goals = model.goals();
        assert!(matches!(
            set.check(&single(0, 0), &single(1, 1), goals),
            Err(MergeRejection::GoalLimit { size: 2, limit: 1 })
        ));

        let set = ConstraintSet::compile(&cfg, None, &model).unwrap();
        let mut a = single(0, 0);
        let mut b = single(1, 1);
        a.signature.insert("tool", RoleValue::Single("t1".into()));
        b.signature.insert("tool", RoleValue::Single("t2".into()));
        assert!(matches!(
            set.check(&a, &b, goals),
            Err(MergeRejection::TypeRoleConflict { .. })
        ));
        b.signature.insert("tool", RoleValue::Single("t1".into()));
        assert!(set.check(&a, &b, goals).is_ok());
    }

    #[test]
    fn test_unknown_predicate_rejected() {
        let model = model();
        let err = ConstraintSet::compile(&config(&["teleports"], &[]), None, &model).unwrap_err();
        assert!(matches!(err, Error::UnknownConstraintPredicate(ref p) if p == "teleports"));
    }

    #[test]
    fn test_rejection_counts() {
        let mut counts = RejectionCounts::default();
        counts.record(&MergeRejection::GoalLimit { size: 3, limit: 2 });
        counts.record(&MergeRejection::NoCommonSource {
            predicate: "reachable".into(),
        });
        assert_eq!(counts.total(), 2);
    }
}
