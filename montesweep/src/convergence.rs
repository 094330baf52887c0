//! Adaptive stopping for the trials of one combination.
//!
//! A [`ConvergenceTracker`] starts out [`Running`](ConvergenceStatus::Running)
//! and is re-evaluated after every merge:
//!
//! 1. fewer than `min_reps` trials: keep running;
//! 2. the [`StoppingRule`] is satisfied: [`Converged`](ConvergenceStatus::Converged);
//! 3. `max_reps` trials reached: [`Exhausted`](ConvergenceStatus::Exhausted);
//! 4. otherwise keep running.
//!
//! Terminal states are final, so a tracker always stops by `max_reps`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DeclarationError;
use crate::results::{AggregateView, ResultSet};

/// State of a [`ConvergenceTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// More trials are needed.
    Running,
    /// The stopping rule was met.
    Converged,
    /// The repetition budget ran out before the rule was met.
    Exhausted,
}

impl ConvergenceStatus {
    /// Whether no further trials will run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceStatus::Running => write!(f, "RUNNING"),
            ConvergenceStatus::Converged => write!(f, "CONVERGED"),
            ConvergenceStatus::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// How the target statistic is compared with the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Stop once the statistic is `>=` the threshold.
    #[default]
    AtLeast,
    /// Stop once the statistic is `<=` the threshold.
    AtMost,
}

impl Comparison {
    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => value >= threshold,
            Comparison::AtMost => value <= threshold,
        }
    }
}

/// Which statistic of the target result is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statistic {
    /// SUM total, RATIO quotient, or UNMERGED element count.
    #[default]
    Value,
    /// Confidence-interval half width relative to the per-trial mean.
    RelativeError {
        /// Confidence level of the interval, e.g. `0.95`.
        level: f64,
    },
}

/// Condition under which a combination has enough trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingRule {
    /// Name of the result the rule reads.
    pub result_name: String,
    /// Threshold the statistic is compared with.
    pub threshold: f64,
    /// Comparison direction.
    #[serde(default)]
    pub comparison: Comparison,
    /// Statistic read from the result.
    #[serde(default)]
    pub statistic: Statistic,
}

impl StoppingRule {
    /// Stop once the value of `result_name` reaches `threshold`.
    pub fn at_least(result_name: impl Into<String>, threshold: f64) -> Self {
        Self {
            result_name: result_name.into(),
            threshold,
            comparison: Comparison::AtLeast,
            statistic: Statistic::Value,
        }
    }

    /// Stop once the value of `result_name` drops to `threshold`.
    pub fn at_most(result_name: impl Into<String>, threshold: f64) -> Self {
        Self {
            comparison: Comparison::AtMost,
            ..Self::at_least(result_name, threshold)
        }
    }

    /// Stop once the relative half width of the `level` confidence interval
    /// of `result_name` drops to `threshold`.
    pub fn relative_error(result_name: impl Into<String>, threshold: f64, level: f64) -> Self {
        Self {
            comparison: Comparison::AtMost,
            statistic: Statistic::RelativeError { level },
            ..Self::at_least(result_name, threshold)
        }
    }

    /// Reject thresholds and levels that can never be compared meaningfully.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        let level_ok = match self.statistic {
            Statistic::Value => true,
            Statistic::RelativeError { level } => level > 0.0 && level < 1.0,
        };
        if !self.threshold.is_finite() || !level_ok {
            return Err(DeclarationError::NonFiniteThreshold(
                self.result_name.clone(),
            ));
        }
        Ok(())
    }

    /// Current value of the target statistic, if it can be computed yet.
    pub fn target_statistic(&self, set: &ResultSet) -> Option<f64> {
        match self.statistic {
            Statistic::Value => match set.value_of(&self.result_name)? {
                AggregateView::Sum(total) => Some(total),
                AggregateView::Ratio(ratio) => ratio.quotient(),
                AggregateView::Unmerged(values) => Some(values.len() as f64),
            },
            Statistic::RelativeError { level } => set
                .confidence_interval(&self.result_name, level)?
                .relative_half_width(),
        }
    }

    /// Whether the rule holds for `set`. A statistic that cannot be computed
    /// yet never satisfies the rule.
    pub fn is_satisfied(&self, set: &ResultSet) -> bool {
        self.target_statistic(set)
            .is_some_and(|value| self.comparison.holds(value, self.threshold))
    }
}

/// Per-combination stopping state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceTracker {
    min_reps: u64,
    max_reps: u64,
    rule: Option<StoppingRule>,
    trial_count: u64,
    status: ConvergenceStatus,
}

impl ConvergenceTracker {
    /// Create a tracker.
    ///
    /// Fails if `max_reps` is zero, `min_reps > max_reps`, or the rule's
    /// threshold is not finite.
    pub fn new(
        min_reps: u64,
        max_reps: u64,
        rule: Option<StoppingRule>,
    ) -> Result<Self, DeclarationError> {
        validate_bounds(min_reps, max_reps)?;
        if let Some(rule) = &rule {
            rule.validate()?;
        }
        Ok(Self {
            min_reps,
            max_reps,
            rule,
            trial_count: 0,
            status: ConvergenceStatus::Running,
        })
    }

    /// Re-evaluate after a merge into `set`.
    pub fn observe(&mut self, set: &ResultSet) -> ConvergenceStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.trial_count = set.trial_count();

        self.status = if self.trial_count < self.min_reps {
            ConvergenceStatus::Running
        } else if self.rule.as_ref().is_some_and(|rule| rule.is_satisfied(set)) {
            ConvergenceStatus::Converged
        } else if self.trial_count >= self.max_reps {
            ConvergenceStatus::Exhausted
        } else {
            ConvergenceStatus::Running
        };
        self.status
    }

    /// Whether another trial should run.
    pub fn should_continue(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Current status.
    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    /// Whether the tracker reached a final state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Trials observed so far.
    pub fn trial_count(&self) -> u64 {
        self.trial_count
    }

    /// Minimum trials before the rule is consulted.
    pub fn min_reps(&self) -> u64 {
        self.min_reps
    }

    /// Trial budget.
    pub fn max_reps(&self) -> u64 {
        self.max_reps
    }

    /// Configured stopping rule.
    pub fn rule(&self) -> Option<&StoppingRule> {
        self.rule.as_ref()
    }
}

pub(crate) fn validate_bounds(min_reps: u64, max_reps: u64) -> Result<(), DeclarationError> {
    if max_reps == 0 {
        return Err(DeclarationError::ZeroMaxReps);
    }
    if min_reps > max_reps {
        return Err(DeclarationError::InvalidRepetitionBounds {
            min: min_reps,
            max: max_reps,
        });
    }
    Ok(())
}
