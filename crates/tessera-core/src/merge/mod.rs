//! Subtask-count reduction under physical constraints
//!
//! Merges are validated by a [`ConstraintSet`] and ranked either by the
//! structural score or, when objectives are configured, by an
//! [`ObjectiveScorer`].

mod constraints;
mod objectives;
mod reducer;

pub use constraints::{ConstraintSet, MergeRejection, RejectionCounts};
pub use objectives::{
    Direction, Objective, ObjectiveKind, ObjectiveScorer, PairFeatures, SizeStats, StrategyPreset,
};
pub use reducer::{MergeStats, Reduction, SubtaskCountReducer};
