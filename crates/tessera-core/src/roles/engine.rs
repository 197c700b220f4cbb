//! Role extraction interpreter
//!
//! Evaluates a compiled [`RoleSchema`] against the initial facts. Every value
//! it returns carries the fact that proved it, and nothing is ever filled in
//! by default: a role with no matching fact stays unresolved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::schema::{Binding, Extractor, RoleDefinition, RoleSchema};
use crate::error::{Error, Result};
use crate::model::{Agent, FactIndex, GoalId, GroundAtom};

/// What to do when an extractor yields several candidate values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnAmbiguous {
    /// Take the lexicographically smallest candidate and count it
    #[default]
    First,
    /// Abort with [`Error::AmbiguousRole`]
    Fail,
}

/// A role value together with its proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRole {
    pub value: String,
    /// Index of the extractor that produced the value
    pub extractor: usize,
    /// Initial fact matching that extractor
    pub witness: GroundAtom,
}

/// Resolved roles of one goal (or agent)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleAssignment {
    roles: BTreeMap<String, ResolvedRole>,
}

impl RoleAssignment {
    pub fn get(&self, role: &str) -> Option<&ResolvedRole> {
        self.roles.get(role)
    }

    /// Resolved value of a role
    pub fn value(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(|r| r.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedRole)> {
        self.roles.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    fn insert(&mut self, role: &str, resolved: ResolvedRole) {
        self.roles.insert(role.to_string(), resolved);
    }
}

/// Counters collected while extracting goal roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDiagnostics {
    /// Goals outside the schema's goal predicate filter
    pub goals_skipped: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Roles decided by picking the smallest of several candidates
    pub ambiguous: usize,
}

/// Role assignments for every goal, indexed by [`GoalId`]
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    assignments: Vec<RoleAssignment>,
    diagnostics: RoleDiagnostics,
}

impl RoleTable {
    pub fn get(&self, goal: GoalId) -> &RoleAssignment {
        &self.assignments[goal]
    }

    pub fn assignments(&self) -> &[RoleAssignment] {
        &self.assignments
    }

    pub fn diagnostics(&self) -> &RoleDiagnostics {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// What an extractor is evaluated for
#[derive(Debug, Clone, Copy)]
enum Subject<'s> {
    Goal(&'s GroundAtom),
    Agent(&'s str),
}

/// Interpreter for a compiled role schema over an indexed fact set
pub struct RoleExtractionEngine<'a> {
    schema: &'a RoleSchema,
    facts: &'a FactIndex,
    on_ambiguous: OnAmbiguous,
}

impl<'a> RoleExtractionEngine<'a> {
    pub fn new(schema: &'a RoleSchema, facts: &'a FactIndex, on_ambiguous: OnAmbiguous) -> Self {
        Self {
            schema,
            facts,
            on_ambiguous,
        }
    }

    /// Resolve every goal, in goal order
    pub fn assign_all(&self, goals: &[GroundAtom]) -> Result<RoleTable> {
        let mut diagnostics = RoleDiagnostics::default();
        let mut assignments = Vec::with_capacity(goals.len());
        for goal in goals {
            if !self.schema.applies_to(&goal.predicate) {
                diagnostics.goals_skipped += 1;
                assignments.push(RoleAssignment::default());
                continue;
            }
            assignments.push(self.assign(goal, &mut diagnostics)?);
        }
        Ok(RoleTable {
            assignments,
            diagnostics,
        })
    }

    /// Resolve the roles of one goal
    pub fn assign(&self, goal: &GroundAtom, diagnostics: &mut RoleDiagnostics) -> Result<RoleAssignment> {
        let assignment = self.resolve(self.schema.roles(), Subject::Goal(goal), diagnostics)?;
        diagnostics.resolved += assignment.len();
        diagnostics.unresolved += self.schema.roles().len() - assignment.len();
        Ok(assignment)
    }

    /// Resolve agent roles for each agent; agents without any resolved role are omitted
    pub fn agent_roles(&self, agents: &[Agent]) -> Result<BTreeMap<String, RoleAssignment>> {
        let mut out = BTreeMap::new();
        if self.schema.agent_roles().is_empty() {
            return Ok(out);
        }
        let mut diagnostics = RoleDiagnostics::default();
        for agent in agents {
            let assignment = self.resolve(
                self.schema.agent_roles(),
                Subject::Agent(&agent.name),
                &mut diagnostics,
            )?;
            if !assignment.is_empty() {
                out.insert(agent.name.clone(), assignment);
            }
        }
        Ok(out)
    }

    fn resolve(
        &self,
        roles: &[RoleDefinition],
        subject: Subject<'_>,
        diagnostics: &mut RoleDiagnostics,
    ) -> Result<RoleAssignment> {
        let mut assignment = RoleAssignment::default();
        for role in roles {
            for (index, extractor) in role.extractors.iter().enumerate() {
                let candidates = self.candidates(extractor, subject, &assignment);
                let Some((&value, &tuple)) = candidates.iter().next() else {
                    continue;
                };
                if candidates.len() > 1 {
                    let values: Vec<String> = candidates.keys().map(|v| v.to_string()).collect();
                    let subject_name = match subject {
                        Subject::Goal(goal) => goal.to_string(),
                        Subject::Agent(name) => format!("agent {}", name),
                    };
                    if self.on_ambiguous == OnAmbiguous::Fail {
                        return Err(Error::AmbiguousRole {
                            goal: subject_name,
                            role: role.name.clone(),
                            candidates: values,
                        });
                    }
                    debug!(
                        subject = %subject_name,
                        role = %role.name,
                        candidates = ?values,
                        "Ambiguous role, taking smallest candidate"
                    );
                    diagnostics.ambiguous += 1;
                }
                assignment.insert(
                    &role.name,
                    ResolvedRole {
                        value: value.to_string(),
                        extractor: index,
                        witness: GroundAtom::new(extractor.predicate.clone(), tuple.iter().cloned()),
                    },
                );
                break;
            }
        }
        Ok(assignment)
    }

    /// Distinct candidate values of one extractor, each with its first witness tuple
    fn candidates(
        &self,
        extractor: &Extractor,
        subject: Subject<'_>,
        resolved: &RoleAssignment,
    ) -> BTreeMap<&'a str, &'a Vec<String>> {
        let mut out = BTreeMap::new();

        let mut expected: Vec<(usize, &str)> = Vec::with_capacity(extractor.bindings.len());
        for (position, binding) in &extractor.bindings {
            let required = match (binding, subject) {
                (Binding::GoalArg(k), Subject::Goal(goal)) => goal.arg(*k),
                (Binding::Role(name), _) => resolved.value(name),
                (Binding::Agent, Subject::Agent(name)) => Some(name),
                (Binding::Unconstrained, _) => continue,
                _ => None,
            };
            match required {
                Some(value) => expected.push((*position, value)),
                // A binding that cannot be satisfied rules out every fact
                None => return out,
            }
        }

        let arity = extractor.min_arity();
        for tuple in self.facts.tuples(&extractor.predicate) {
            if tuple.len() < arity {
                continue;
            }
            if expected.iter().all(|(pos, value)| tuple[*pos] == *value) {
                out.entry(tuple[extractor.value_arg].as_str()).or_insert(tuple);
            }
        }
        out
    }
}
