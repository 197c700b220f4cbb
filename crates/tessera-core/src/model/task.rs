//! Planning model: typed objects, schemas, initial facts and goals

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::atom::{AtomSchema, GroundAtom};
use super::facts::FactIndex;
use crate::error::{Error, Result};

/// Index of a goal inside [`PlanningModel::goals`]
pub type GoalId = usize;

/// A predicate declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSchema {
    /// Predicate name
    pub name: String,
    /// Declared parameter types, in order
    #[serde(default)]
    pub parameter_types: Vec<String>,
}

impl PredicateSchema {
    pub fn new<I, S>(name: impl Into<String>, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// A typed action parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedParameter {
    /// Variable name (e.g. `?r`)
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypedParameter {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// An action schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
    /// Action name
    pub name: String,
    /// Typed parameters, in order
    #[serde(default)]
    pub parameters: Vec<TypedParameter>,
    /// Precondition atoms (positive and negated atoms alike)
    #[serde(default)]
    pub preconditions: Vec<AtomSchema>,
    /// Add effects
    #[serde(default)]
    pub add_effects: Vec<AtomSchema>,
    /// Delete effects, carried for completeness and never consulted
    #[serde(default)]
    pub delete_effects: Vec<AtomSchema>,
}

impl ActionSchema {
    /// Create an action with no parameters, preconditions or effects
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            preconditions: Vec::new(),
            add_effects: Vec::new(),
            delete_effects: Vec::new(),
        }
    }

    /// Add a typed parameter
    pub fn with_parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.push(TypedParameter::new(name, type_name));
        self
    }

    /// Add a precondition atom
    pub fn with_precondition(mut self, atom: AtomSchema) -> Self {
        self.preconditions.push(atom);
        self
    }

    /// Add an add effect
    pub fn with_add_effect(mut self, atom: AtomSchema) -> Self {
        self.add_effects.push(atom);
        self
    }

    /// Add a delete effect
    pub fn with_delete_effect(mut self, atom: AtomSchema) -> Self {
        self.delete_effects.push(atom);
        self
    }

    /// Whether any parameter has the given declared type
    pub fn has_parameter_type(&self, type_name: &str) -> bool {
        self.parameters.iter().any(|p| p.type_name == type_name)
    }
}

/// An agent taking part in the problem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Agent {
    /// Agent identifier (usually a problem object)
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Treat every object whose type is listed in `agent_types` as an agent
    pub fn from_objects(model: &PlanningModel, agent_types: &[String]) -> Vec<Agent> {
        let mut agents: Vec<Agent> = agent_types
            .iter()
            .flat_map(|t| {
                model
                    .objects_of_type(t)
                    .iter()
                    .map(move |name| Agent::new(name.clone(), t.clone()))
            })
            .collect();
        agents.sort();
        agents.dedup_by(|a, b| a.name == b.name);
        agents
    }
}

/// Structured planning model consumed by the engine
///
/// Built once from a parsed problem and read-only afterwards. Goals are kept
/// sorted and deduplicated; a goal's position in [`goals`](Self::goals) is
/// its [`GoalId`].
#[derive(Debug, Clone)]
pub struct PlanningModel {
    domain: String,
    problem: String,
    objects: BTreeMap<String, Vec<String>>,
    predicates: BTreeMap<String, PredicateSchema>,
    actions: BTreeMap<String, ActionSchema>,
    init: BTreeSet<GroundAtom>,
    goals: Vec<GroundAtom>,
    facts: FactIndex,
}

impl PlanningModel {
    /// Start building a model
    pub fn builder(domain: impl Into<String>, problem: impl Into<String>) -> PlanningModelBuilder {
        PlanningModelBuilder {
            domain: domain.into(),
            problem: problem.into(),
            objects: BTreeMap::new(),
            predicates: BTreeMap::new(),
            actions: BTreeMap::new(),
            init: BTreeSet::new(),
            goals: BTreeSet::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// Objects of a declared type
    pub fn objects_of_type(&self, type_name: &str) -> &[String] {
        self.objects
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Object-by-type index
    pub fn objects(&self) -> &BTreeMap<String, Vec<String>> {
        &self.objects
    }

    pub fn predicates(&self) -> &BTreeMap<String, PredicateSchema> {
        &self.predicates
    }

    pub fn actions(&self) -> &BTreeMap<String, ActionSchema> {
        &self.actions
    }

    pub fn init(&self) -> &BTreeSet<GroundAtom> {
        &self.init
    }

    /// Goals in id order
    pub fn goals(&self) -> &[GroundAtom] {
        &self.goals
    }

    /// Predicate index over the initial facts
    pub fn facts(&self) -> &FactIndex {
        &self.facts
    }

    /// Whether a predicate is declared in the domain or used in the initial facts
    pub fn knows_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name) || self.facts.has_predicate(name)
    }
}

/// Builder for [`PlanningModel`]
#[derive(Debug, Clone)]
pub struct PlanningModelBuilder {
    domain: String,
    problem: String,
    objects: BTreeMap<String, Vec<String>>,
    predicates: BTreeMap<String, PredicateSchema>,
    actions: BTreeMap<String, ActionSchema>,
    init: BTreeSet<GroundAtom>,
    goals: BTreeSet<GroundAtom>,
}

impl PlanningModelBuilder {
    /// Declare an object of a type
    pub fn object(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let names = self.objects.entry(type_name.into()).or_default();
        let name = name.into();
        if !names.contains(&name) {
            names.push(name);
        }
        self
    }

    /// Declare a predicate
    pub fn predicate(mut self, schema: PredicateSchema) -> Self {
        self.predicates.insert(schema.name.clone(), schema);
        self
    }

    /// Declare an action
    pub fn action(mut self, action: ActionSchema) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    /// Add an initial fact
    pub fn init(mut self, fact: GroundAtom) -> Self {
        self.init.insert(fact);
        self
    }

    /// Add a goal fact
    pub fn goal(mut self, goal: GroundAtom) -> Self {
        self.goals.insert(goal);
        self
    }

    /// Validate and freeze the model
    ///
    /// Atoms of declared predicates must match the declared arity.
    pub fn build(self) -> Result<PlanningModel> {
        for atom in self.init.iter().chain(self.goals.iter()) {
            if let Some(schema) = self.predicates.get(&atom.predicate) {
                if schema.parameter_types.len() != atom.args.len() {
                    return Err(Error::InvalidInput(format!(
                        "{} has {} arguments but predicate '{}' declares {}",
                        atom,
                        atom.args.len(),
                        schema.name,
                        schema.parameter_types.len()
                    )));
                }
            }
        }

        let facts = FactIndex::new(&self.init);
        Ok(PlanningModel {
            domain: self.domain,
            problem: self.problem,
            objects: self.objects,
            predicates: self.predicates,
            actions: self.actions,
            init: self.init,
            goals: self.goals.into_iter().collect(),
            facts,
        })
    }
}

/// Problem document exchanged with the parsing collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemDocument {
    /// Domain name
    #[serde(default)]
    pub domain: String,
    /// Problem name
    #[serde(default)]
    pub problem: String,
    /// Objects grouped by type
    #[serde(default)]
    pub objects: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub predicates: Vec<PredicateSchema>,
    #[serde(default)]
    pub actions: Vec<ActionSchema>,
    #[serde(default)]
    pub init: Vec<GroundAtom>,
    #[serde(default)]
    pub goals: Vec<GroundAtom>,
    /// Explicit agents
    #[serde(default)]
    pub agents: Vec<Agent>,
    /// Object types whose instances act as agents
    #[serde(default)]
    pub agent_types: Vec<String>,
}

impl ProblemDocument {
    /// Parse a JSON problem document
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Build the planning model and the agent list
    ///
    /// Explicit agents come first; objects of `agent_types` are added unless
    /// an explicit agent already uses the name.
    pub fn into_model(self) -> Result<(PlanningModel, Vec<Agent>)> {
        let mut builder = PlanningModel::builder(self.domain, self.problem);
        for (type_name, names) in self.objects {
            for name in names {
                builder = builder.object(name, type_name.clone());
            }
        }
        for predicate in self.predicates {
            builder = builder.predicate(predicate);
        }
        for action in self.actions {
            builder = builder.action(action);
        }
        for fact in self.init {
            builder = builder.init(fact);
        }
        for goal in self.goals {
            builder = builder.goal(goal);
        }
        let model = builder.build()?;

        let mut agents = self.agents;
        for derived in Agent::from_objects(&model, &self.agent_types) {
            if !agents.iter().any(|a| a.name == derived.name) {
                agents.push(derived);
            }
        }
        Ok((model, agents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlanningModel {
        PlanningModel::builder("weld", "p1")
            .object("r1", "robot")
            .object("r2", "robot")
            .object("s1", "seam")
            .predicate(PredicateSchema::new("welded", ["seam"]))
            .goal(GroundAtom::new("welded", ["s1"]))
            .goal(GroundAtom::new("welded", ["s1"]))
            .init(GroundAtom::new("reachable", ["r1", "s1"]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_goals_are_deduplicated_and_sorted() {
        let model = PlanningModel::builder("d", "p")
            .goal(GroundAtom::new("b", ["x"]))
            .goal(GroundAtom::new("a", ["y"]))
            .goal(GroundAtom::new("b", ["x"]))
            .build()
            .unwrap();
        assert_eq!(model.goals().len(), 2);
        assert_eq!(model.goals()[0].predicate, "a");
        assert_eq!(sample().goals().len(), 1);
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let result = PlanningModel::builder("d", "p")
            .predicate(PredicateSchema::new("welded", ["seam"]))
            .goal(GroundAtom::new("welded", ["s1", "extra"]))
            .build();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_knows_predicate() {
        let model = sample();
        assert!(model.knows_predicate("welded"));
        assert!(model.knows_predicate("reachable"));
        assert!(!model.knows_predicate("holding"));
    }

    #[test]
    fn test_agents_from_objects() {
        let model = sample();
        let agents = Agent::from_objects(&model, &["robot".to_string()]);
        assert_eq!(agents, vec![Agent::new("r1", "robot"), Agent::new("r2", "robot")]);
    }

    #[test]
    fn test_problem_document_into_model() {
        let json = r#"{
            "domain": "weld",
            "problem": "p1",
            "objects": {"robot": ["r1", "r2"], "seam": ["s1"]},
            "predicates": [{"name": "welded", "parameter_types": ["seam"]}],
            "actions": [{
                "name": "weld",
                "parameters": [{"name": "?r", "type": "robot"}, {"name": "?s", "type": "seam"}],
                "preconditions": [{"predicate": "reachable", "args": ["?r", "?s"]}],
                "add_effects": [{"predicate": "welded", "args": ["?s"]}]
            }],
            "init": [{"predicate": "reachable", "args": ["r1", "s1"]}],
            "goals": [{"predicate": "welded", "args": ["s1"]}],
            "agents": [{"name": "r1", "type": "robot"}],
            "agent_types": ["robot"]
        }"#;
        let (model, agents) = ProblemDocument::from_json(json).unwrap().into_model().unwrap();
        assert_eq!(model.actions().len(), 1);
        assert_eq!(model.facts().len(), 1);
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name, "r1");
    }
}
