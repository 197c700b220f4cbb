//! Agent capabilities
//!
//! An agent can execute an action when at least one of the action's
//! parameters is declared with the agent's type. The index is derived once
//! per run and only read afterwards.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Agent, GroundAtom, PlanningModel};

/// Mapping agent → executable action names
#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    by_agent: BTreeMap<String, BTreeSet<String>>,
    achievers: BTreeMap<String, BTreeSet<String>>,
}

impl CapabilityIndex {
    /// Derive capabilities for every agent
    ///
    /// Agents whose type matches no action parameter get an empty set; that is
    /// surfaced later as an allocation failure, not here.
    pub fn build(model: &PlanningModel, agents: &[Agent]) -> Self {
        let mut by_agent: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for agent in agents {
            let actions = model
                .actions()
                .values()
                .filter(|action| action.has_parameter_type(&agent.type_name))
                .map(|action| action.name.clone())
                .collect();
            by_agent.insert(agent.name.clone(), actions);
        }

        let mut achievers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for action in model.actions().values() {
            for effect in &action.add_effects {
                achievers
                    .entry(effect.predicate.clone())
                    .or_default()
                    .insert(action.name.clone());
            }
        }

        Self {
            by_agent,
            achievers,
        }
    }

    /// Actions executable by an agent (empty for unknown agents)
    pub fn capabilities(&self, agent: &str) -> Option<&BTreeSet<String>> {
        self.by_agent.get(agent)
    }

    /// Number of actions an agent can execute
    pub fn capability_count(&self, agent: &str) -> usize {
        self.by_agent.get(agent).map(BTreeSet::len).unwrap_or(0)
    }

    /// Agent names in sorted order
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.by_agent.keys().map(String::as_str)
    }

    /// Actions whose add effects contain `predicate`
    pub fn achievers(&self, predicate: &str) -> Option<&BTreeSet<String>> {
        self.achievers.get(predicate)
    }

    /// Whether the agent can execute some achiever of every goal
    ///
    /// Goals no action achieves place no requirement on the agent.
    pub fn covers<'a>(&self, agent: &str, goals: impl IntoIterator<Item = &'a GroundAtom>) -> bool {
        let empty = BTreeSet::new();
        let caps = self.by_agent.get(agent).unwrap_or(&empty);
        goals.into_iter().all(|goal| match self.achievers.get(&goal.predicate) {
            Some(required) if !required.is_empty() => !required.is_disjoint(caps),
            _ => true,
        })
    }

    /// Raw agent → actions map
    pub fn as_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.by_agent
    }
}
