//! Subtasks and their role signatures

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::model::GoalId;
use crate::roles::RoleAssignment;

/// Value of a role across the goals of a subtask
///
/// Serialises as a plain string when every member agrees and as an array
/// otherwise, so multi-valued entries never collide with a single value that
/// happens to contain a separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleValue {
    Single(String),
    Multi(BTreeSet<String>),
}

impl RoleValue {
    /// Build from a set of observed values; `None` when the set is empty
    pub fn from_values(mut values: BTreeSet<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop_first().map(Self::Single),
            _ => Some(Self::Multi(values)),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        let (single, multi) = match self {
            Self::Single(v) => (Some(v.as_str()), None),
            Self::Multi(set) => (None, Some(set.iter().map(String::as_str))),
        };
        single.into_iter().chain(multi.into_iter().flatten())
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(v) => v == value,
            Self::Multi(set) => set.contains(value),
        }
    }

    /// Union of two values, collapsed back to `Single` when they agree
    pub fn union(&self, other: &RoleValue) -> RoleValue {
        let set: BTreeSet<String> = self.values().chain(other.values()).map(str::to_string).collect();
        // Both sides are non-empty, so the union is too
        Self::from_values(set).unwrap_or_else(|| self.clone())
    }
}

/// Role name → value for a subtask
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSignature(BTreeMap<String, RoleValue>);

impl RoleSignature {
    /// Signature covering every role resolved by at least one assignment
    pub fn from_assignments<'a>(assignments: impl IntoIterator<Item = &'a RoleAssignment>) -> Self {
        let mut observed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for assignment in assignments {
            for (role, resolved) in assignment.iter() {
                observed
                    .entry(role.to_string())
                    .or_default()
                    .insert(resolved.value.clone());
            }
        }
        Self(
            observed
                .into_iter()
                .filter_map(|(role, values)| RoleValue::from_values(values).map(|v| (role, v)))
                .collect(),
        )
    }

    pub fn get(&self, role: &str) -> Option<&RoleValue> {
        self.0.get(role)
    }

    pub fn insert(&mut self, role: impl Into<String>, value: RoleValue) {
        self.0.insert(role.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Roles whose value is `Multi`
    pub fn multi_valued(&self) -> usize {
        self.0.values().filter(|v| !v.is_single()).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Role-wise union of two signatures
    pub fn merge(&self, other: &RoleSignature) -> RoleSignature {
        let mut merged = self.0.clone();
        for (role, value) in &other.0 {
            merged
                .entry(role.clone())
                .and_modify(|existing| *existing = existing.union(value))
                .or_insert_with(|| value.clone());
        }
        Self(merged)
    }
}

/// A disjoint group of goals planned and executed by one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: usize,
    pub goals: Vec<GoalId>,
    /// Landmark predicates of all member goals
    pub landmarks: BTreeSet<String>,
    pub signature: RoleSignature,
}

impl SubTask {
    pub fn new(id: usize, goals: Vec<GoalId>, landmarks: BTreeSet<String>, signature: RoleSignature) -> Self {
        Self {
            id,
            goals,
            landmarks,
            signature,
        }
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Combined subtask keeping this subtask's id
    pub fn merged(&self, other: &SubTask) -> SubTask {
        let mut goals = self.goals.clone();
        goals.extend_from_slice(&other.goals);
        SubTask {
            id: self.id,
            goals,
            landmarks: self.landmarks.union(&other.landmarks).cloned().collect(),
            signature: self.signature.merge(&other.signature),
        }
    }
}

/// Assign ids `0..n` in list order
pub fn renumber(subtasks: &mut [SubTask]) {
    for (id, subtask) in subtasks.iter_mut().enumerate() {
        subtask.id = id;
    }
}

/// Check that subtasks are non-empty, pairwise disjoint and cover `0..goal_count`
pub fn verify_partition(subtasks: &[SubTask], goal_count: usize) -> Result<()> {
    let mut owner: Vec<Option<usize>> = vec![None; goal_count];
    for subtask in subtasks {
        if subtask.is_empty() {
            return Err(Error::InvariantViolation(format!("subtask {} is empty", subtask.id)));
        }
        for &goal in &subtask.goals {
            let slot = owner.get_mut(goal).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "subtask {} references goal {} outside 0..{}",
                    subtask.id, goal, goal_count
                ))
            })?;
            if let Some(previous) = slot.replace(subtask.id) {
                return Err(Error::InvariantViolation(format!(
                    "goal {} appears in subtasks {} and {}",
                    goal, previous, subtask.id
                )));
            }
        }
    }
    if let Some(missing) = owner.iter().position(Option::is_none) {
        return Err(Error::InvariantViolation(format!("goal {} is not covered", missing)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(v: &str) -> RoleValue {
        RoleValue::Single(v.to_string())
    }

    fn subtask(id: usize, goals: Vec<GoalId>, base: &str) -> SubTask {
        let mut signature = RoleSignature::default();
        signature.insert("base", single(base));
        SubTask::new(id, goals, BTreeSet::from(["at".to_string()]), signature)
    }

    #[test]
    fn test_role_value_collapse() {
        assert_eq!(RoleValue::from_values(BTreeSet::new()), None);
        assert_eq!(
            RoleValue::from_values(BTreeSet::from(["b1".to_string()])),
            Some(single("b1"))
        );
        let merged = single("b1").union(&single("b2"));
        assert!(!merged.is_single());
        assert!(merged.contains("b2"));
        assert_eq!(single("b1").union(&single("b1")), single("b1"));
    }

    #[test]
    fn test_role_value_serialization() {
        let multi = single("b1").union(&single("b2"));
        assert_eq!(serde_json::to_string(&multi).unwrap(), r#"["b1","b2"]"#);
        assert_eq!(serde_json::to_string(&single("b|1")).unwrap(), r#""b|1""#);
        let back: RoleValue = serde_json::from_str(r#"["b1","b2"]"#).unwrap();
        assert_eq!(back, multi);
    }

    #[test]
    fn test_merge_keeps_first_id() {
        let a = subtask(3, vec![0, 1], "b1");
        let b = subtask(5, vec![2], "b2");
        let merged = a.merged(&b);
        assert_eq!(merged.id, 3);
        assert_eq!(merged.goals, vec![0, 1, 2]);
        assert_eq!(merged.signature.multi_valued(), 1);
    }

    #[test]
    fn test_verify_partition() {
        let ok = vec![subtask(0, vec![0, 2], "b1"), subtask(1, vec![1], "b1")];
        assert!(verify_partition(&ok, 3).is_ok());

        let duplicate = vec![subtask(0, vec![0, 1], "b1"), subtask(1, vec![1], "b1")];
        assert!(matches!(verify_partition(&duplicate, 2), Err(Error::InvariantViolation(_))));

        let missing = vec![subtask(0, vec![0], "b1")];
        assert!(verify_partition(&missing, 2).is_err());

        let out_of_range = vec![subtask(0, vec![0, 9], "b1")];
        assert!(verify_partition(&out_of_range, 1).is_err());
    }

    #[test]
    fn test_renumber() {
        let mut list = vec![subtask(4, vec![0], "b1"), subtask(9, vec![1], "b1")];
        renumber(&mut list);
        assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1]);
    }
}
