//! Final per-combination outcomes of a sweep.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointError, CheckpointSerializer, JsonSerializer};
use crate::error::ResultError;
use crate::params::{Combination, ParamValue, ParameterSpace};

use super::aggregate::AggregateView;
use super::set::ResultSet;

/// Why a combination stopped receiving trials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminalReason {
    /// The stopping rule was satisfied after the minimum repetitions.
    Converged,
    /// The repetition budget ran out first.
    Exhausted,
    /// A trial kept failing after all retries.
    Failed {
        /// Message of the last failure.
        error: String,
    },
}

impl TerminalReason {
    /// Whether this is a failure.
    pub fn is_failed(&self) -> bool {
        matches!(self, TerminalReason::Failed { .. })
    }

    /// Short label used in reports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TerminalReason::Converged => "converged",
            TerminalReason::Exhausted => "exhausted",
            TerminalReason::Failed { .. } => "failed",
        }
    }
}

/// The sealed results of one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationOutcome {
    /// Combination the trials ran with.
    pub combination: Combination,
    /// Sealed aggregates. Partial when the combination failed.
    pub result_set: ResultSet,
    /// Why the combination stopped.
    pub reason: TerminalReason,
    /// Accumulated wall-clock time spent in trials, across resumes.
    pub elapsed: Duration,
}

impl CombinationOutcome {
    /// Index of the combination in the expansion order.
    pub fn index(&self) -> usize {
        self.combination.index()
    }

    /// Number of trials merged.
    pub fn trial_count(&self) -> u64 {
        self.result_set.trial_count()
    }
}

/// Outcome totals by terminal reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// Combinations that converged.
    pub converged: usize,
    /// Combinations that exhausted their budget.
    pub exhausted: usize,
    /// Combinations that failed.
    pub failed: usize,
}

/// Every finished combination of a sweep, ordered by combination index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    parameters: ParameterSpace,
    outcomes: Vec<CombinationOutcome>,
}

impl SimulationResults {
    /// Empty results for `parameters`.
    pub fn new(parameters: ParameterSpace) -> Self {
        Self {
            parameters,
            outcomes: Vec::new(),
        }
    }

    /// The parameter space these results cover.
    pub fn parameters(&self) -> &ParameterSpace {
        &self.parameters
    }

    /// Insert an outcome, keeping index order.
    pub fn push(&mut self, outcome: CombinationOutcome) -> Result<(), ResultError> {
        match self
            .outcomes
            .binary_search_by_key(&outcome.index(), CombinationOutcome::index)
        {
            Ok(_) => Err(ResultError::DuplicateOutcome(outcome.index())),
            Err(pos) => {
                self.outcomes.insert(pos, outcome);
                Ok(())
            }
        }
    }

    /// Absorb the outcomes of another partition of the same sweep.
    ///
    /// Fails without modifying `self` if both contain the same index.
    pub fn merge(&mut self, other: SimulationResults) -> Result<(), ResultError> {
        if let Some(dup) = other.outcomes.iter().find(|o| self.get(o.index()).is_some()) {
            return Err(ResultError::DuplicateOutcome(dup.index()));
        }
        for outcome in other.outcomes {
            self.push(outcome)?;
        }
        Ok(())
    }

    /// Outcome of the combination at `index`.
    pub fn get(&self, index: usize) -> Option<&CombinationOutcome> {
        self.outcomes
            .binary_search_by_key(&index, CombinationOutcome::index)
            .ok()
            .map(|pos| &self.outcomes[pos])
    }

    /// All outcomes in index order.
    pub fn outcomes(&self) -> &[CombinationOutcome] {
        &self.outcomes
    }

    /// Number of finished combinations.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no combination has finished.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes whose combination carries all of the given assignments.
    pub fn outcomes_matching<'a>(
        &'a self,
        filter: &'a [(&'a str, ParamValue)],
    ) -> impl Iterator<Item = &'a CombinationOutcome> + 'a {
        self.outcomes
            .iter()
            .filter(move |o| o.combination.matches(filter))
    }

    /// Aggregate of `name` for every outcome, in index order.
    pub fn values_of<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (usize, Option<AggregateView<'a>>)> + 'a {
        self.outcomes
            .iter()
            .map(move |o| (o.index(), o.result_set.value_of(name)))
    }

    /// Per-trial mean of `name` for every outcome, in index order.
    pub fn means_of(&self, name: &str) -> Vec<(usize, Option<f64>)> {
        self.outcomes
            .iter()
            .map(|o| (o.index(), o.result_set.mean(name)))
            .collect()
    }

    /// Totals per terminal reason.
    pub fn counts(&self) -> OutcomeCounts {
        self.outcomes
            .iter()
            .fold(OutcomeCounts::default(), |mut counts, o| {
                match o.reason {
                    TerminalReason::Converged => counts.converged += 1,
                    TerminalReason::Exhausted => counts.exhausted += 1,
                    TerminalReason::Failed { .. } => counts.failed += 1,
                }
                counts
            })
    }

    /// Trials merged across all outcomes.
    pub fn total_trials(&self) -> u64 {
        self.outcomes.iter().map(CombinationOutcome::trial_count).sum()
    }

    /// Write the results to `path` as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let bytes = JsonSerializer::new().serialize(self)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Read results previously written with [`save`](Self::save).
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let bytes = tokio::fs::read(path).await?;
        JsonSerializer::new().deserialize(&bytes)
    }
}
