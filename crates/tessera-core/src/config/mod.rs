//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::allocation::CostModel;
use crate::graph::MAX_LANDMARK_DEPTH;
use crate::merge::{Objective, StrategyPreset};
use crate::roles::{OnAmbiguous, OnMissing};

/// Tessera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed of the run's random stream
    pub seed: u64,
    pub clustering: ClusteringConfig,
    pub landmarks: LandmarkConfig,
    pub retry: RetryConfig,
    pub roles: RolesConfig,
    pub constraints: ConstraintsConfig,
    pub merge: MergeConfig,
    pub allocation: AllocationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub max_cluster_size: usize,
    /// Join goals whose landmark sets intersect
    pub landmark_edges: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    pub enabled: bool,
    /// Backward search depth; 0 draws a depth from 1..=3 once per run
    pub max_depth: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Upper bound on the number of subtasks (K_max)
    pub max_subtasks: usize,
    pub epsilon_start: f64,
    pub epsilon_step: f64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    pub on_missing: OnMissing,
    pub on_ambiguous: OnAmbiguous,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsConfig {
    /// Predicates `P(source, target)`; merged resources need a common source
    pub binary_predicates: Vec<String>,
    /// Predicates `T(target, type)`; merged resources need a single type
    pub type_predicates: Vec<String>,
    /// Goal argument holding the goal's resource object
    pub resource_arg: usize,
    /// Role that must stay single-valued in a merged subtask
    pub type_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// 0 means unlimited
    pub max_goals_per_subtask: usize,
    /// Preset objective set; overrides `objectives` when present
    pub strategy: Option<StrategyPreset>,
    pub objectives: Vec<Objective>,
    /// Amplitude of the multiplicative score perturbation
    pub randomness: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub cost: CostModel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 42,
            clustering: ClusteringConfig::default(),
            landmarks: LandmarkConfig::default(),
            retry: RetryConfig::default(),
            roles: RolesConfig::default(),
            constraints: ConstraintsConfig::default(),
            merge: MergeConfig::default(),
            allocation: AllocationConfig::default(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_cluster_size: 10,
            landmark_edges: true,
        }
    }
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 3,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_subtasks: 30,
            epsilon_start: 0.0,
            epsilon_step: 0.2,
            max_retries: 5,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_goals_per_subtask: 10,
            strategy: None,
            objectives: Vec::new(),
            randomness: 0.1,
        }
    }
}

impl MergeConfig {
    /// Goal limit per subtask, `None` when unlimited
    pub fn goal_limit(&self) -> Option<usize> {
        (self.max_goals_per_subtask > 0).then_some(self.max_goals_per_subtask)
    }

    /// Whether merges are ranked by objectives instead of the structural score
    pub fn uses_objectives(&self) -> bool {
        self.strategy.is_some() || !self.objectives.is_empty()
    }
}

const KEYS: &[&str] = &[
    "seed",
    "clustering.max_cluster_size",
    "clustering.landmark_edges",
    "landmarks.enabled",
    "landmarks.max_depth",
    "retry.max_subtasks",
    "retry.epsilon_start",
    "retry.epsilon_step",
    "retry.max_retries",
    "roles.on_missing",
    "roles.on_ambiguous",
    "constraints.binary_predicates",
    "constraints.type_predicates",
    "constraints.resource_arg",
    "constraints.type_role",
    "merge.max_goals_per_subtask",
    "merge.strategy",
    "merge.objectives",
    "merge.randomness",
    "allocation.cost",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("TESSERA_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("tessera")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.clustering.max_cluster_size == 0 {
            return Err(anyhow!("clustering.max_cluster_size must be at least 1"));
        }
        if self.landmarks.max_depth > MAX_LANDMARK_DEPTH {
            return Err(anyhow!(
                "landmarks.max_depth must be between 0 and {}",
                MAX_LANDMARK_DEPTH
            ));
        }
        if self.retry.max_subtasks == 0 {
            return Err(anyhow!("retry.max_subtasks must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.epsilon_start) {
            return Err(anyhow!("retry.epsilon_start must be between 0.0 and 1.0"));
        }
        if !self.retry.epsilon_step.is_finite() || self.retry.epsilon_step < 0.0 {
            return Err(anyhow!("retry.epsilon_step must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.merge.randomness) {
            return Err(anyhow!("merge.randomness must be between 0.0 and 1.0"));
        }
        if let Some(bad) = self.merge.objectives.iter().find(|o| !o.weight.is_finite()) {
            return Err(anyhow!("Objective {} has a non-finite weight", bad.kind));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let value = match key {
            "seed" => self.seed.to_string(),

            "clustering.max_cluster_size" => self.clustering.max_cluster_size.to_string(),
            "clustering.landmark_edges" => self.clustering.landmark_edges.to_string(),

            "landmarks.enabled" => self.landmarks.enabled.to_string(),
            "landmarks.max_depth" => self.landmarks.max_depth.to_string(),

            "retry.max_subtasks" => self.retry.max_subtasks.to_string(),
            "retry.epsilon_start" => self.retry.epsilon_start.to_string(),
            "retry.epsilon_step" => self.retry.epsilon_step.to_string(),
            "retry.max_retries" => self.retry.max_retries.to_string(),

            "roles.on_missing" => variant_name(&self.roles.on_missing)?,
            "roles.on_ambiguous" => variant_name(&self.roles.on_ambiguous)?,

            "constraints.binary_predicates" => self.constraints.binary_predicates.join(", "),
            "constraints.type_predicates" => self.constraints.type_predicates.join(", "),
            "constraints.resource_arg" => self.constraints.resource_arg.to_string(),
            "constraints.type_role" => self.constraints.type_role.clone().unwrap_or_else(|| "(not set)".to_string()),

            "merge.max_goals_per_subtask" => self.merge.max_goals_per_subtask.to_string(),
            "merge.strategy" => match &self.merge.strategy {
                Some(strategy) => variant_name(strategy)?,
                None => "(not set)".to_string(),
            },
            "merge.objectives" => self
                .merge
                .objectives
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            "merge.randomness" => self.merge.randomness.to_string(),

            "allocation.cost" => variant_name(&self.allocation.cost)?,

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `tessera config list` to see available keys.",
                    key
                ));
            }
        };
        Ok(value)
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "seed" => self.seed = parse(key, value)?,

            "clustering.max_cluster_size" => {
                let size: usize = parse(key, value)?;
                if size == 0 {
                    return Err(anyhow!("Cluster size must be at least 1"));
                }
                self.clustering.max_cluster_size = size;
            }
            "clustering.landmark_edges" => self.clustering.landmark_edges = parse(key, value)?,

            "landmarks.enabled" => self.landmarks.enabled = parse(key, value)?,
            "landmarks.max_depth" => {
                let depth: u8 = parse(key, value)?;
                if depth > MAX_LANDMARK_DEPTH {
                    return Err(anyhow!(
                        "Landmark depth must be between 0 and {} (0 picks a random depth)",
                        MAX_LANDMARK_DEPTH
                    ));
                }
                self.landmarks.max_depth = depth;
            }

            "retry.max_subtasks" => {
                let bound: usize = parse(key, value)?;
                if bound == 0 {
                    return Err(anyhow!("Subtask bound must be at least 1"));
                }
                self.retry.max_subtasks = bound;
            }
            "retry.epsilon_start" => {
                let eps: f64 = parse(key, value)?;
                if !(0.0..=1.0).contains(&eps) {
                    return Err(anyhow!("epsilon_start must be between 0.0 and 1.0"));
                }
                self.retry.epsilon_start = eps;
            }
            "retry.epsilon_step" => {
                let step: f64 = parse(key, value)?;
                if !step.is_finite() || step < 0.0 {
                    return Err(anyhow!("epsilon_step must be non-negative"));
                }
                self.retry.epsilon_step = step;
            }
            "retry.max_retries" => self.retry.max_retries = parse(key, value)?,

            "roles.on_missing" => self.roles.on_missing = parse_variant(key, value, &["partial", "fail"])?,
            "roles.on_ambiguous" => self.roles.on_ambiguous = parse_variant(key, value, &["first", "fail"])?,

            "constraints.binary_predicates" => self.constraints.binary_predicates = split_list(value),
            "constraints.type_predicates" => self.constraints.type_predicates = split_list(value),
            "constraints.resource_arg" => self.constraints.resource_arg = parse(key, value)?,
            "constraints.type_role" => {
                let role = value.trim();
                self.constraints.type_role = (!role.is_empty() && role != "none").then(|| role.to_string());
            }

            "merge.max_goals_per_subtask" => self.merge.max_goals_per_subtask = parse(key, value)?,
            "merge.strategy" => {
                self.merge.strategy = match value.trim() {
                    "" | "none" => None,
                    other => Some(parse_variant(
                        key,
                        other,
                        &["minimize_subtasks", "balanced", "distribute_goals", "auto"],
                    )?),
                };
            }
            "merge.objectives" => {
                self.merge.objectives = split_list(value)
                    .iter()
                    .map(|item| item.parse::<Objective>().map_err(|e| anyhow!(e)))
                    .collect::<anyhow::Result<_>>()?;
            }
            "merge.randomness" => {
                let randomness: f64 = parse(key, value)?;
                if !(0.0..=1.0).contains(&randomness) {
                    return Err(anyhow!("Randomness must be between 0.0 and 1.0"));
                }
                self.merge.randomness = randomness;
            }

            "allocation.cost" => self.allocation.cost = parse_variant(key, value, &["inverse_capability_size"])?,

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `tessera config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

/// Parse a unit enum variant through its serde name
fn parse_variant<T: serde::de::DeserializeOwned>(key: &str, value: &str, valid: &[&str]) -> anyhow::Result<T> {
    let value = value.trim();
    if !valid.contains(&value) {
        return Err(anyhow!(
            "Invalid {} value: {}. Valid options: {}",
            key,
            value,
            valid.join(", ")
        ));
    }
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

fn variant_name<T: Serialize>(value: &T) -> anyhow::Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(name) => Ok(name),
        other => Ok(other.to_string()),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{Direction, ObjectiveKind};
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.clustering.max_cluster_size, 10);
        assert_eq!(config.retry.max_subtasks, 30);
        assert_eq!(config.merge.goal_limit(), Some(10));
        assert!(!config.merge.uses_objectives());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();
        config.set("roles.on_missing", "fail").unwrap();
        config.set("constraints.binary_predicates", "reachable, mounted").unwrap();
        config.set("merge.strategy", "balanced").unwrap();
        config.set("merge.objectives", "goal_variance:minimize:2, landmark_overlap:maximize:1").unwrap();

        assert_eq!(config.get("roles.on_missing").unwrap(), "fail");
        assert_eq!(config.get("constraints.binary_predicates").unwrap(), "reachable, mounted");
        assert_eq!(config.get("merge.strategy").unwrap(), "balanced");
        assert_eq!(config.merge.objectives[0].kind, ObjectiveKind::GoalVariance);
        assert_eq!(config.merge.objectives[0].direction, Direction::Minimize);
        assert_eq!(
            config.get("merge.objectives").unwrap(),
            "goal_variance:minimize:2, landmark_overlap:maximize:1"
        );
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("retry.epsilon_start", "1.5").is_err());
        assert!(config.set("landmarks.max_depth", "4").is_err());
        assert!(config.set("roles.on_ambiguous", "random").is_err());
        assert!(config.set("clustering.max_cluster_size", "zero").is_err());
        assert!(config.set("nope", "1").is_err());
        assert!(config.get("nope").is_err());
    }

    #[test]
    fn test_list_covers_all_keys() {
        let config = Config::default();
        let listed = config.list().unwrap();
        assert_eq!(listed.len(), KEYS.len());
        assert!(listed.iter().any(|(k, v)| k == "allocation.cost" && v == "inverse_capability_size"));
        assert!(listed.iter().any(|(k, v)| k == "constraints.type_role" && v == "(not set)"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.seed = 7;
        config.set("constraints.type_role", "tool").unwrap();
        config.set("merge.objectives", "max_goals:minimize:1").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "seed = 3\n\n[retry]\nmax_subtasks = 4\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.seed, 3);
        assert_eq!(loaded.retry.max_subtasks, 4);
        assert_eq!(loaded.retry.max_retries, 5);
        assert_eq!(loaded.clustering, ClusteringConfig::default());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[merge]\nrandomness = 3.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
