//! Declarative role schema
//!
//! A role schema says, per role, which initial-state predicate to look up and
//! how each argument position is tied to the goal, to an earlier role, or
//! left free. Documents are plain data (JSON or TOML); [`RoleSchema::compile`]
//! validates them once and fixes the role evaluation order, so every
//! configuration problem is reported before any goal is processed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::PlanningModel;

/// How one argument position of an extractor predicate is constrained
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Must equal the goal's k-th argument
    GoalArg(usize),
    /// Must equal the value already resolved for the named role
    Role(String),
    /// Must equal the agent being described (agent-role extractors only)
    Agent,
    /// Any value
    Unconstrained,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoalArg(k) => write!(f, "goal:{}", k),
            Self::Role(name) => write!(f, "role:{}", name),
            Self::Agent => write!(f, "agent:self"),
            Self::Unconstrained => write!(f, "any"),
        }
    }
}

impl FromStr for Binding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if matches!(s, "any" | "_" | "*") {
            return Ok(Self::Unconstrained);
        }
        match s.split_once(':') {
            Some(("goal", index)) => index
                .trim()
                .parse()
                .map(Self::GoalArg)
                .map_err(|_| format!("Invalid goal argument index in binding '{}'", s)),
            Some(("role", name)) if !name.trim().is_empty() => Ok(Self::Role(name.trim().to_string())),
            Some(("agent", "self")) => Ok(Self::Agent),
            _ => Err(format!(
                "Unknown binding '{}'. Expected goal:<index>, role:<name>, agent:self or any",
                s
            )),
        }
    }
}

/// A compiled extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    /// Predicate looked up in the initial facts
    pub predicate: String,
    /// Constrained argument positions, sorted by position
    pub bindings: Vec<(usize, Binding)>,
    /// Argument position holding the extracted value
    pub value_arg: usize,
}

impl Extractor {
    /// Roles this extractor reads
    pub fn role_dependencies(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|(_, b)| match b {
            Binding::Role(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Smallest arity a matching fact must have
    pub fn min_arity(&self) -> usize {
        self.bindings
            .iter()
            .map(|(pos, _)| pos + 1)
            .chain(std::iter::once(self.value_arg + 1))
            .max()
            .unwrap_or(0)
    }
}

/// A compiled role with its extractors in evaluation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub name: String,
    pub extractors: Vec<Extractor>,
}

/// Extractor as written in a schema document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorDocument {
    pub predicate: String,
    /// Argument position (as a string key) → binding (`goal:k`, `role:name`, `agent:self`, `any`)
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
    pub value_arg: usize,
}

impl ExtractorDocument {
    pub fn new(predicate: impl Into<String>, value_arg: usize) -> Self {
        Self {
            predicate: predicate.into(),
            bindings: BTreeMap::new(),
            value_arg,
        }
    }

    /// Bind an argument position
    pub fn bind(mut self, position: usize, binding: impl Into<String>) -> Self {
        self.bindings.insert(position.to_string(), binding.into());
        self
    }
}

/// Role as written in a schema document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDocument {
    pub name: String,
    #[serde(default)]
    pub extractors: Vec<ExtractorDocument>,
}

impl RoleDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extractors: Vec::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: ExtractorDocument) -> Self {
        self.extractors.push(extractor);
        self
    }
}

/// Role schema document, as loaded from disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSchemaDocument {
    /// Domain the schema was written for (informational)
    #[serde(default)]
    pub domain: String,
    /// When non-empty, only goals of these predicates receive roles
    #[serde(default)]
    pub goal_predicates: Vec<String>,
    /// Roles in declaration order
    #[serde(default)]
    pub roles: Vec<RoleDocument>,
    /// Roles used as the equivalence key when partitioning clusters
    #[serde(default)]
    pub cluster_keys: Vec<String>,
    /// Roles describing agents, checked against subtask signatures at allocation
    #[serde(default)]
    pub agent_roles: Vec<RoleDocument>,
}

impl RoleSchemaDocument {
    pub fn with_role(mut self, role: RoleDocument) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_cluster_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cluster_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_agent_role(mut self, role: RoleDocument) -> Self {
        self.agent_roles.push(role);
        self
    }
}

/// Validated role schema with a fixed evaluation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSchema {
    domain: String,
    goal_predicates: BTreeSet<String>,
    roles: Vec<RoleDefinition>,
    cluster_keys: Vec<String>,
    agent_roles: Vec<RoleDefinition>,
}

impl RoleSchema {
    /// Validate a document
    ///
    /// Rejects duplicate role names, roles without extractors, malformed or
    /// misplaced bindings, references to undeclared roles, cyclic role
    /// references and unknown cluster keys.
    pub fn compile(doc: RoleSchemaDocument) -> Result<Self> {
        let roles = compile_roles(&doc.roles, RoleScope::Goal)?;

        let mut seen_keys = BTreeSet::new();
        for key in &doc.cluster_keys {
            if !roles.iter().any(|r| &r.name == key) {
                return Err(Error::Configuration(format!(
                    "Cluster key '{}' is not a declared role",
                    key
                )));
            }
            if !seen_keys.insert(key.as_str()) {
                return Err(Error::Configuration(format!("Cluster key '{}' listed twice", key)));
            }
        }

        let agent_roles = compile_roles(&doc.agent_roles, RoleScope::Agent)?;

        Ok(Self {
            domain: doc.domain,
            goal_predicates: doc.goal_predicates.into_iter().collect(),
            roles,
            cluster_keys: doc.cluster_keys,
            agent_roles,
        })
    }

    /// Parse and compile a JSON document
    pub fn from_json(contents: &str) -> Result<Self> {
        Self::compile(serde_json::from_str(contents)?)
    }

    /// Parse and compile a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::compile(toml::from_str(contents)?)
    }

    /// Load a schema file; `.toml` files are read as TOML, anything else as JSON
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    /// Check extractor predicates and argument positions against a model
    pub fn check_against(&self, model: &PlanningModel) -> Result<()> {
        for role in self.roles.iter().chain(self.agent_roles.iter()) {
            for extractor in &role.extractors {
                if !model.knows_predicate(&extractor.predicate) {
                    return Err(Error::Configuration(format!(
                        "Role '{}' uses predicate '{}', which the model does not know",
                        role.name, extractor.predicate
                    )));
                }
                if let Some(schema) = model.predicates().get(&extractor.predicate) {
                    if extractor.min_arity() > schema.parameter_types.len() {
                        return Err(Error::Configuration(format!(
                            "Role '{}' addresses argument {} of '{}', which has {} parameters",
                            role.name,
                            extractor.min_arity() - 1,
                            extractor.predicate,
                            schema.parameter_types.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Goal roles in evaluation order
    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    /// Look up a goal role
    pub fn role(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn cluster_keys(&self) -> &[String] {
        &self.cluster_keys
    }

    /// Agent roles in evaluation order
    pub fn agent_roles(&self) -> &[RoleDefinition] {
        &self.agent_roles
    }

    /// Whether a goal predicate receives roles at all
    pub fn applies_to(&self, predicate: &str) -> bool {
        self.goal_predicates.is_empty() || self.goal_predicates.contains(predicate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleScope {
    Goal,
    Agent,
}

fn compile_roles(docs: &[RoleDocument], scope: RoleScope) -> Result<Vec<RoleDefinition>> {
    let mut names = BTreeSet::new();
    for doc in docs {
        if !names.insert(doc.name.as_str()) {
            return Err(Error::Configuration(format!("Role '{}' declared twice", doc.name)));
        }
    }

    let mut compiled = Vec::with_capacity(docs.len());
    for doc in docs {
        if doc.extractors.is_empty() {
            return Err(Error::Configuration(format!(
                "Role '{}' has no extractor",
                doc.name
            )));
        }
        let mut extractors = Vec::with_capacity(doc.extractors.len());
        for ex in &doc.extractors {
            extractors.push(compile_extractor(&doc.name, ex, scope, &names)?);
        }
        compiled.push(RoleDefinition {
            name: doc.name.clone(),
            extractors,
        });
    }

    order_by_dependencies(compiled)
}

fn compile_extractor(
    role: &str,
    doc: &ExtractorDocument,
    scope: RoleScope,
    declared: &BTreeSet<&str>,
) -> Result<Extractor> {
    let mut bindings = Vec::with_capacity(doc.bindings.len());
    for (position, raw) in &doc.bindings {
        let position: usize = position.trim().parse().map_err(|_| {
            Error::Configuration(format!(
                "Role '{}': binding position '{}' is not an argument index",
                role, position
            ))
        })?;
        let binding: Binding = raw
            .parse()
            .map_err(|e: String| Error::Configuration(format!("Role '{}': {}", role, e)))?;

        match (&binding, scope) {
            (Binding::Role(name), _) if !declared.contains(name.as_str()) => {
                return Err(Error::Configuration(format!(
                    "Role '{}' references undeclared role '{}'",
                    role, name
                )));
            }
            (Binding::Role(name), _) if name == role => {
                return Err(Error::Configuration(format!(
                    "Role '{}' references itself",
                    role
                )));
            }
            (Binding::GoalArg(_), RoleScope::Agent) => {
                return Err(Error::Configuration(format!(
                    "Agent role '{}' cannot bind goal arguments",
                    role
                )));
            }
            (Binding::Agent, RoleScope::Goal) => {
                return Err(Error::Configuration(format!(
                    "Goal role '{}' cannot bind agent:self",
                    role
                )));
            }
            _ => {}
        }
        bindings.push((position, binding));
    }
    bindings.sort_by_key(|(pos, _)| *pos);

    Ok(Extractor {
        predicate: doc.predicate.clone(),
        bindings,
        value_arg: doc.value_arg,
    })
}

/// Topological order over role references, ties broken by declaration order
fn order_by_dependencies(roles: Vec<RoleDefinition>) -> Result<Vec<RoleDefinition>> {
    let index: BTreeMap<&str, usize> = roles
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();

    let mut deps: Vec<BTreeSet<usize>> = Vec::with_capacity(roles.len());
    for role in &roles {
        let set = role
            .extractors
            .iter()
            .flat_map(Extractor::role_dependencies)
            .filter_map(|name| index.get(name).copied())
            .collect();
        deps.push(set);
    }

    let mut placed = vec![false; roles.len()];
    let mut order = Vec::with_capacity(roles.len());
    while order.len() < roles.len() {
        let ready = (0..roles.len())
            .find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]));
        match ready {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let cyclic: Vec<&str> = (0..roles.len())
                    .filter(|&i| !placed[i])
                    .map(|i| roles[i].name.as_str())
                    .collect();
                return Err(Error::Configuration(format!(
                    "Cyclic role dependency among: {}",
                    cyclic.join(", ")
                )));
            }
        }
    }

    let mut slots: Vec<Option<RoleDefinition>> = roles.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "domain": "weld",
        "goal_predicates": ["welded"],
        "roles": [
            {"name": "tool", "extractors": [
                {"predicate": "tool_at", "bindings": {"1": "role:base"}, "value_arg": 0}
            ]},
            {"name": "base", "extractors": [
                {"predicate": "reachable", "bindings": {"1": "goal:0"}, "value_arg": 0}
            ]}
        ],
        "cluster_keys": ["base", "tool"]
    }"#;

    #[test]
    fn test_binding_parse() {
        assert_eq!("goal:2".parse::<Binding>(), Ok(Binding::GoalArg(2)));
        assert_eq!("role:base".parse::<Binding>(), Ok(Binding::Role("base".into())));
        assert_eq!("agent:self".parse::<Binding>(), Ok(Binding::Agent));
        assert_eq!("any".parse::<Binding>(), Ok(Binding::Unconstrained));
        assert!("goal:x".parse::<Binding>().is_err());
        assert!("slot:1".parse::<Binding>().is_err());
        assert_eq!(Binding::GoalArg(1).to_string(), "goal:1");
    }

    #[test]
    fn test_compile_orders_dependencies() {
        let schema = RoleSchema::from_json(SCHEMA).unwrap();
        let names: Vec<&str> = schema.roles().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["base", "tool"]);
        assert_eq!(schema.cluster_keys(), &["base".to_string(), "tool".to_string()]);
        assert!(schema.applies_to("welded"));
        assert!(!schema.applies_to("painted"));
    }

    #[test]
    fn test_cycle_rejected() {
        let doc = RoleSchemaDocument::default()
            .with_role(RoleDocument::new("a").with_extractor(ExtractorDocument::new("p", 0).bind(1, "role:b")))
            .with_role(RoleDocument::new("b").with_extractor(ExtractorDocument::new("q", 0).bind(1, "role:a")));
        let err = RoleSchema::compile(doc).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("Cyclic")));
    }

    #[test]
    fn test_missing_extractor_rejected() {
        let doc = RoleSchemaDocument::default().with_role(RoleDocument::new("base"));
        assert!(matches!(RoleSchema::compile(doc), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unknown_role_reference_rejected() {
        let doc = RoleSchemaDocument::default()
            .with_role(RoleDocument::new("a").with_extractor(ExtractorDocument::new("p", 0).bind(1, "role:ghost")));
        assert!(RoleSchema::compile(doc).is_err());
    }

    #[test]
    fn test_unknown_cluster_key_rejected() {
        let doc = RoleSchemaDocument::default()
            .with_role(RoleDocument::new("a").with_extractor(ExtractorDocument::new("p", 0)))
            .with_cluster_keys(["b"]);
        assert!(RoleSchema::compile(doc).is_err());
    }

    #[test]
    fn test_scope_checks() {
        let goal_with_agent = RoleSchemaDocument::default()
            .with_role(RoleDocument::new("a").with_extractor(ExtractorDocument::new("p", 0).bind(1, "agent:self")));
        assert!(RoleSchema::compile(goal_with_agent).is_err());

        let agent_with_goal = RoleSchemaDocument::default()
            .with_agent_role(RoleDocument::new("a").with_extractor(ExtractorDocument::new("p", 0).bind(1, "goal:0")));
        assert!(RoleSchema::compile(agent_with_goal).is_err());
    }

    #[test]
    fn test_toml_document() {
        let toml = r#"
            domain = "weld"
            cluster_keys = ["base"]

            [[roles]]
            name = "base"

            [[roles.extractors]]
            predicate = "reachable"
            value_arg = 0
            bindings = { "1" = "goal:0" }
        "#;
        let schema = RoleSchema::from_toml(toml).unwrap();
        assert_eq!(schema.roles()[0].extractors[0].bindings, vec![(1, Binding::GoalArg(0))]);
        assert_eq!(schema.roles()[0].extractors[0].min_arity(), 2);
    }

    #[test]
    fn test_check_against_model() {
        let schema = RoleSchema::from_json(SCHEMA).unwrap();
        let model = PlanningModel::builder("weld", "p").build().unwrap();
        assert!(schema.check_against(&model).is_err());
    }
}
