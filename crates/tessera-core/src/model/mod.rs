//! Planning model
//!
//! The structured input of the engine: typed objects, predicate and action
//! schemas, the initial state, the goal set and the agents. Parsing raw
//! domain/problem text happens elsewhere; this module only holds the result
//! and a predicate index over the initial facts.

mod atom;
mod facts;
mod task;

pub use atom::{AtomSchema, GroundAtom};
pub use facts::FactIndex;
pub use task::{
    ActionSchema, Agent, GoalId, PlanningModel, PlanningModelBuilder, PredicateSchema,
    ProblemDocument, TypedParameter,
};
