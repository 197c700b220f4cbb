//! Run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::allocation::AllocationFailure;
use crate::merge::{MergeStats, RejectionCounts, StrategyPreset};
use crate::model::{GoalId, GroundAtom};
use crate::roles::RoleDiagnostics;
use crate::subtask::RoleSignature;

/// A finished subtask with its assigned agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskRecord {
    pub id: usize,
    pub goal_ids: Vec<GoalId>,
    pub goals: Vec<GroundAtom>,
    pub landmarks: BTreeSet<String>,
    pub signature: RoleSignature,
    /// `None` when allocation failed for this subtask
    pub agent: Option<String>,
    pub cost: Option<f64>,
}

/// One pass of the retry loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub epsilon: f64,
    /// Clusters after splitting
    pub clusters: usize,
    /// Oversize clusters shuffled before splitting
    pub shuffled: usize,
    /// Oversize clusters split in structural order
    pub structural: usize,
    /// Subtasks after role partitioning
    pub partitioned: usize,
    /// Subtasks after reduction
    pub subtasks: usize,
    /// Goals isolated for lack of a cluster key
    pub unresolved_singletons: usize,
    pub merges: MergeStats,
}

/// Final state of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The bound was met; subtasks may still carry allocation failures
    Solved {
        subtasks: Vec<SubtaskRecord>,
        failures: Vec<AllocationFailure>,
    },
    /// Every attempt ended above the bound
    Unsatisfiable {
        last_count: usize,
        k_max: usize,
        epsilon_schedule: Vec<f64>,
    },
    /// Stopped between attempts on request
    Cancelled { attempts: u32 },
}

/// Counters and per-attempt history of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub goals: usize,
    pub agents: usize,
    pub causal_edges: usize,
    pub goal_edges: usize,
    pub components: usize,
    /// Landmark depth actually used, 0 when landmarks are disabled
    pub landmark_depth: u8,
    /// Objective preset in effect, after resolving `auto`
    pub strategy: Option<StrategyPreset>,
    pub roles: RoleDiagnostics,
    /// Rejections summed over every attempt
    pub rejections: RejectionCounts,
    pub attempts: Vec<AttemptRecord>,
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub domain: String,
    pub problem: String,
    pub seed: u64,
    pub outcome: Outcome,
    pub diagnostics: Diagnostics,
}

impl PlanReport {
    pub fn new(domain: impl Into<String>, problem: impl Into<String>, seed: u64, outcome: Outcome, diagnostics: Diagnostics) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            domain: domain.into(),
            problem: problem.into(),
            seed,
            outcome,
            diagnostics,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self.outcome, Outcome::Solved { .. })
    }

    /// Subtasks of a solved run, empty otherwise
    pub fn subtasks(&self) -> &[SubtaskRecord] {
        match &self.outcome {
            Outcome::Solved { subtasks, .. } => subtasks,
            _ => &[],
        }
    }

    /// Allocation failures of a solved run, empty otherwise
    pub fn failures(&self) -> &[AllocationFailure] {
        match &self.outcome {
            Outcome::Solved { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
