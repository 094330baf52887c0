//! Trial results and their aggregation.
//!
//! - `kind` - [`TrialResult`] and the [`ResultKind`] that decides how it combines
//! - `aggregate` - running aggregates and the per-kind combination table
//! - `stats` - running moments and confidence intervals
//! - `set` - [`ResultSet`], everything merged for one combination
//! - `collection` - [`SimulationResults`], the finished outcomes of a sweep

pub mod aggregate;
pub mod collection;
pub mod kind;
pub mod set;
pub mod stats;

pub use aggregate::{Aggregate, AggregateView, RatioView};
pub use collection::{CombinationOutcome, OutcomeCounts, SimulationResults, TerminalReason};
pub use kind::{Payload, ResultKind, TrialResult};
pub use set::{ResultEntry, ResultSet};
pub use stats::{ConfidenceInterval, RunningMoments};
