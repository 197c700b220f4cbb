//! Error types for Tessera

use thiserror::Error;

/// Result type alias using Tessera's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Tessera error types with helpful messages and suggestions
///
/// Only failures that abort a run live here. An unsatisfiable subtask bound,
/// rejected merges and unallocatable subtasks are reported as values on the
/// [`PlanReport`](crate::report::PlanReport) instead.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (E600-E699)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown constraint predicate '{0}'. It is neither declared in the domain nor present in the initial facts.")]
    UnknownConstraintPredicate(String),

    // Role errors (E700-E799)
    #[error("Role '{role}' could not be resolved for goal {goal}")]
    RoleUnresolved { goal: String, role: String },

    #[error("Role '{role}' is ambiguous for goal {goal}: candidates {candidates:?}")]
    AmbiguousRole {
        goal: String,
        role: String,
        candidates: Vec<String>,
    },

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Internal errors (E900-E999)
    #[error("Goal partition invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "E600",
            Self::UnknownConstraintPredicate(_) => "E601",
            Self::RoleUnresolved { .. } => "E700",
            Self::AmbiguousRole { .. } => "E701",
            Self::InvalidInput(_) => "E800",
            Self::InvariantViolation(_) => "E900",
            Self::Io(_) | Self::Json(_) | Self::Toml(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::UnknownConstraintPredicate(name) => Some(format!(
                "tessera config set constraints.binary_predicates <list without {}>",
                name
            )),
            Self::RoleUnresolved { .. } => Some("tessera config set roles.on_missing partial".to_string()),
            Self::AmbiguousRole { .. } => Some("tessera config set roles.on_ambiguous first".to_string()),
            _ => None,
        }
    }

    /// Whether this error was raised before any computation started
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnknownConstraintPredicate(_) | Self::Toml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Configuration("x".into()).code(), "E600");
        assert_eq!(Error::UnknownConstraintPredicate("reach".into()).code(), "E601");
        assert_eq!(
            Error::RoleUnresolved {
                goal: "g".into(),
                role: "base".into()
            }
            .code(),
            "E700"
        );
        assert_eq!(Error::InvariantViolation("dup".into()).code(), "E900");
    }

    #[test]
    fn test_error_suggestion() {
        let err = Error::AmbiguousRole {
            goal: "welded(s1)".into(),
            role: "base".into(),
            candidates: vec!["b1".into(), "b2".into()],
        };
        assert!(err.suggestion().unwrap().contains("on_ambiguous"));
        assert!(Error::InvalidInput("bad".into()).suggestion().is_none());
    }

    #[test]
    fn test_is_configuration() {
        assert!(Error::Configuration("cycle".into()).is_configuration());
        assert!(!Error::InvalidInput("x".into()).is_configuration());
    }
}
