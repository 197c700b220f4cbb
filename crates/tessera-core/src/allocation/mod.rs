//! Cost-based assignment of subtasks to agents

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::capability::CapabilityIndex;
use crate::model::GroundAtom;
use crate::roles::RoleAssignment;
use crate::subtask::SubTask;

/// Cost of giving a subtask to an agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// `1 / (1 + |capabilities|)`: specialised agents are cheaper
    #[default]
    InverseCapabilitySize,
}

impl CostModel {
    pub fn cost(&self, capability_count: usize) -> f64 {
        match self {
            Self::InverseCapabilitySize => 1.0 / (1.0 + capability_count as f64),
        }
    }
}

/// A subtask given to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub subtask_id: usize,
    pub agent: String,
    pub cost: f64,
}

/// A subtask no agent can execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationFailure {
    pub subtask_id: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub assignments: Vec<Assignment>,
    pub failures: Vec<AllocationFailure>,
}

impl Allocation {
    /// Agent assigned to a subtask
    pub fn agent_for(&self, subtask_id: usize) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.subtask_id == subtask_id)
            .map(|a| a.agent.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Allocator<'a> {
    capabilities: &'a CapabilityIndex,
    agent_roles: &'a BTreeMap<String, RoleAssignment>,
    cost: CostModel,
}

impl<'a> Allocator<'a> {
    /// `agent_roles` holds the resolved agent roles; agents without an entry are unrestricted
    pub fn new(
        capabilities: &'a CapabilityIndex,
        agent_roles: &'a BTreeMap<String, RoleAssignment>,
        cost: CostModel,
    ) -> Self {
        Self {
            capabilities,
            agent_roles,
            cost,
        }
    }

    /// Whether `agent` can execute `subtask`
    ///
    /// The agent must hold an achiever of every goal that has one, and each
    /// of its role values must fit the subtask's value for the same role.
    pub fn is_capable(&self, agent: &str, subtask: &SubTask, goals: &[GroundAtom]) -> bool {
        let members = subtask.goals.iter().filter_map(|&g| goals.get(g));
        if !self.capabilities.covers(agent, members) {
            return false;
        }
        let Some(roles) = self.agent_roles.get(agent) else {
            return true;
        };
        roles.iter().all(|(role, resolved)| {
            subtask
                .signature
                .get(role)
                .is_none_or(|required| required.contains(&resolved.value))
        })
    }

    /// Assign each subtask to a cheapest capable agent
    ///
    /// Ties are broken uniformly at random among the tied agents in name
    /// order. A subtask with no capable agent is reported as a failure and
    /// does not affect the others.
    pub fn allocate<R: Rng + ?Sized>(&self, subtasks: &[SubTask], goals: &[GroundAtom], rng: &mut R) -> Allocation {
        let mut allocation = Allocation::default();

        for subtask in subtasks {
            let mut best_cost = f64::INFINITY;
            let mut best: Vec<&str> = Vec::new();
            for agent in self.capabilities.agents() {
                if !self.is_capable(agent, subtask, goals) {
                    continue;
                }
                let cost = self.cost.cost(self.capabilities.capability_count(agent));
                if cost < best_cost {
                    best_cost = cost;
                    best.clear();
                    best.push(agent);
                } else if cost == best_cost {
                    best.push(agent);
                }
            }

            if best.is_empty() {
                let reason = if self.capabilities.agents().next().is_none() {
                    "no agents available".to_string()
                } else {
                    format!("no capable agent for {} goal(s)", subtask.len())
                };
                warn!(subtask = subtask.id, %reason, "Allocation failed");
                allocation.failures.push(AllocationFailure {
                    subtask_id: subtask.id,
                    reason,
                });
                continue;
            }

            best.sort_unstable();
            let chosen = if best.len() == 1 {
                best[0]
            } else {
                best[rng.gen_range(0..best.len())]
            };
            allocation.assignments.push(Assignment {
                subtask_id: subtask.id,
                agent: chosen.to_string(),
                cost: best_cost,
            });
        }

        allocation
    }
}
