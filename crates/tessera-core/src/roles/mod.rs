//! Declarative role extraction
//!
//! A role is a named fact about a goal that does not appear in the goal
//! atom itself, such as the base a welding target is reachable from. Roles
//! are declared in a [`RoleSchema`], resolved once per goal by the
//! [`RoleExtractionEngine`], and used by the [`RolePartitioner`] to split
//! clusters into subtasks whose goals share the same cluster-key values.

mod engine;
mod partition;
mod schema;

pub use engine::{OnAmbiguous, ResolvedRole, RoleAssignment, RoleDiagnostics, RoleExtractionEngine, RoleTable};
pub use partition::{OnMissing, PartitionOutcome, RolePartitioner};
pub use schema::{
    Binding, Extractor, ExtractorDocument, RoleDefinition, RoleDocument, RoleSchema, RoleSchemaDocument,
};
