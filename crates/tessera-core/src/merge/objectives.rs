//! Multi-objective merge scoring
//!
//! Each objective scores a candidate merge through a cheap local proxy: the
//! change the merge would cause in the objective's global quantity. The
//! goal-size variance in particular is tracked through the count, sum and sum
//! of squares of subtask sizes, so its delta costs O(1) per pair.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::subtask::SubTask;

/// Quantity an objective tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    SubtaskCount,
    GoalVariance,
    MaxGoals,
    LandmarkOverlap,
    RoleDiversity,
    ResourceSharing,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 6] = [
        Self::SubtaskCount,
        Self::GoalVariance,
        Self::MaxGoals,
        Self::LandmarkOverlap,
        Self::RoleDiversity,
        Self::ResourceSharing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubtaskCount => "subtask_count",
            Self::GoalVariance => "goal_variance",
            Self::MaxGoals => "max_goals",
            Self::LandmarkOverlap => "landmark_overlap",
            Self::RoleDiversity => "role_diversity",
            Self::ResourceSharing => "resource_sharing",
        }
    }

    /// Direction used when none is given
    pub fn natural_direction(&self) -> Direction {
        match self {
            Self::LandmarkOverlap | Self::ResourceSharing => Direction::Maximize,
            _ => Direction::Minimize,
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("Unknown objective '{}'. Valid objectives: {}", s, names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    fn sign(self) -> f64 {
        match self {
            Self::Maximize => 1.0,
            Self::Minimize => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Maximize => "maximize",
            Self::Minimize => "minimize",
        })
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A weighted objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub direction: Direction,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Objective {
    pub fn new(kind: ObjectiveKind, direction: Direction, weight: f64) -> Self {
        Self {
            kind,
            direction,
            weight,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.direction, self.weight)
    }
}

/// Parses `kind[:direction[:weight]]`
impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':').map(str::trim);
        let kind: ObjectiveKind = parts.next().unwrap_or_default().parse()?;
        let direction = match parts.next() {
            None | Some("") => kind.natural_direction(),
            Some("maximize" | "max") => Direction::Maximize,
            Some("minimize" | "min") => Direction::Minimize,
            Some(other) => return Err(format!("Unknown direction '{}' for objective {}", other, kind)),
        };
        let weight = match parts.next() {
            None | Some("") => default_weight(),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite())
                .ok_or_else(|| format!("Invalid weight '{}' for objective {}", raw, kind))?,
        };
        if parts.next().is_some() {
            return Err(format!("Objective '{}' has too many fields", s));
        }
        Ok(Self::new(kind, direction, weight))
    }
}

/// Named objective sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyPreset {
    /// Favour large merges that cut the subtask count fastest
    MinimizeSubtasks,
    /// Trade subtask count against even sizes and shared resources
    Balanced,
    /// Keep subtask sizes even
    DistributeGoals,
    /// One of the three above, chosen from the run seed
    Auto,
}

impl StrategyPreset {
    /// Replace `Auto` with a concrete preset drawn from `rng`
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> StrategyPreset {
        match self {
            Self::Auto => match rng.gen_range(0..3) {
                0 => Self::MinimizeSubtasks,
                1 => Self::Balanced,
                _ => Self::DistributeGoals,
            },
            other => other,
        }
    }

    /// Objectives of a resolved preset; `Auto` falls back to `Balanced`
    pub fn objectives(self) -> Vec<Objective> {
        use Direction::*;
        use ObjectiveKind::*;
        match self {
            Self::MinimizeSubtasks => vec![
                Objective::new(SubtaskCount, Minimize, 10.0),
                Objective::new(MaxGoals, Maximize, 5.0),
                Objective::new(LandmarkOverlap, Maximize, 1.0),
            ],
            Self::Balanced | Self::Auto => vec![
                Objective::new(SubtaskCount, Minimize, 5.0),
                Objective::new(GoalVariance, Minimize, 1.0),
                Objective::new(ResourceSharing, Maximize, 2.0),
                Objective::new(LandmarkOverlap, Maximize, 0.5),
            ],
            Self::DistributeGoals => vec![
                Objective::new(SubtaskCount, Minimize, 4.0),
                Objective::new(GoalVariance, Minimize, 2.0),
                Objective::new(MaxGoals, Minimize, 1.0),
                Objective::new(LandmarkOverlap, Maximize, 0.8),
            ],
        }
    }
}

/// Running size statistics of a subtask list
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
    max: usize,
}

impl SizeStats {
    pub fn of(subtasks: &[SubTask]) -> Self {
        let mut stats = Self::default();
        for subtask in subtasks {
            let n = subtask.len();
            stats.count += 1;
            stats.sum += n as f64;
            stats.sum_sq += (n * n) as f64;
            stats.max = stats.max.max(n);
        }
        stats
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Population variance of subtask sizes
    pub fn variance(&self) -> f64 {
        variance(self.count, self.sum, self.sum_sq)
    }

    /// Variance after merging subtasks of sizes `a` and `b`
    pub fn variance_after_merge(&self, a: usize, b: usize) -> f64 {
        variance(
            self.count.saturating_sub(1),
            self.sum,
            self.sum_sq + (2 * a * b) as f64,
        )
    }

    /// Largest size after merging subtasks of sizes `a` and `b`
    pub fn max_after_merge(&self, a: usize, b: usize) -> usize {
        self.max.max(a + b)
    }

    /// Account for a merge that was carried out
    pub fn apply_merge(&mut self, a: usize, b: usize) {
        self.sum_sq += (2 * a * b) as f64;
        self.count = self.count.saturating_sub(1);
        self.max = self.max_after_merge(a, b);
    }
}

fn variance(count: usize, sum: f64, sum_sq: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Local facts about a candidate pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairFeatures {
    pub left_size: usize,
    pub right_size: usize,
    pub shared_landmarks: usize,
    /// Multi-valued roles in the merged signature
    pub multi_valued_roles: usize,
    /// Sources shared by every resource of the merged subtask
    pub common_sources: usize,
}

/// Weighted sum of objective proxies with a seeded multiplicative jitter
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveScorer {
    objectives: Vec<Objective>,
    randomness: f64,
}

impl ObjectiveScorer {
    pub fn new(objectives: Vec<Objective>, randomness: f64) -> Self {
        Self {
            objectives,
            randomness: randomness.clamp(0.0, 1.0),
        }
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Change in an objective's global quantity if the pair were merged
    pub fn proxy(kind: ObjectiveKind, pair: &PairFeatures, stats: &SizeStats) -> f64 {
        let (a, b) = (pair.left_size, pair.right_size);
        match kind {
            ObjectiveKind::SubtaskCount => -1.0,
            ObjectiveKind::GoalVariance => stats.variance_after_merge(a, b) - stats.variance(),
            ObjectiveKind::MaxGoals => (stats.max_after_merge(a, b) - stats.max()) as f64,
            ObjectiveKind::LandmarkOverlap => pair.shared_landmarks as f64,
            ObjectiveKind::RoleDiversity => pair.multi_valued_roles as f64,
            ObjectiveKind::ResourceSharing => pair.common_sources as f64,
        }
    }

    /// Score of a pair, higher is better
    pub fn score<R: Rng + ?Sized>(&self, pair: &PairFeatures, stats: &SizeStats, rng: &mut R) -> f64 {
        let base: f64 = self
            .objectives
            .iter()
            .map(|o| o.direction.sign() * o.weight * Self::proxy(o.kind, pair, stats))
            .sum();
        if self.randomness > 0.0 {
            let u: f64 = rng.gen_range(0.0..1.0);
            base * (1.0 + (u - 0.5) * self.randomness)
        } else {
            base
        }
    }
}
