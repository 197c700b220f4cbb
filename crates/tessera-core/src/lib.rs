//! Tessera Core Library
//!
//! This crate decomposes the goal set of a multi-agent planning problem into
//! disjoint, physically coherent subtasks and assigns each subtask to a
//! capable agent:
//! - Planning model and fact index
//! - Agent capabilities
//! - Causal graph, landmarks and goal dependency graph
//! - Goal clustering with ε-greedy splitting
//! - Declarative role extraction and role-based partitioning
//! - Constraint-preserving subtask merging, optionally multi-objective
//! - Cost-based allocation
//! - Bounded retry loop producing a plan report

pub mod allocation;
pub mod capability;
pub mod config;
pub mod decomposition;
pub mod error;
pub mod graph;
pub mod merge;
pub mod model;
pub mod planner;
pub mod report;
pub mod roles;
pub mod subtask;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::model::{Agent, GroundAtom, PlanningModel, ProblemDocument};
    pub use crate::planner::Planner;
    pub use crate::report::{Outcome, PlanReport};
    pub use crate::roles::RoleSchema;
}
