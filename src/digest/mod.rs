pub mod aggregate;
pub mod dedup;

pub use aggregate::{aggregate, Aggregate, ProblemTally};
pub use dedup::{should_update, sort_by_time, SortOrder};
