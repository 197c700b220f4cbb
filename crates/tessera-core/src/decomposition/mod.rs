//! Goal clustering and the exploration state of the retry loop

mod cluster;
mod search;

pub use cluster::{Cluster, ClusterDecomposer, SplitOutcome};
pub use search::{EpsilonSchedule, SearchState};
