//! Per-combination accumulation of trial results.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ResultError;

use super::aggregate::{Aggregate, AggregateView};
use super::kind::{Payload, ResultKind, TrialResult};
use super::stats::{ConfidenceInterval, RunningMoments};

/// Aggregate and per-trial statistics for one result name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    aggregate: Aggregate,
    /// SUM: per-trial contribution; RATIO: per-trial quotient;
    /// UNMERGED: each element.
    moments: RunningMoments,
}

impl ResultEntry {
    fn new(kind: ResultKind) -> Self {
        Self {
            aggregate: Aggregate::empty(kind),
            moments: RunningMoments::new(),
        }
    }

    /// Kind of this entry.
    pub fn kind(&self) -> ResultKind {
        self.aggregate.kind()
    }

    /// Current aggregate.
    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// Per-trial observations recorded for this entry.
    pub fn moments(&self) -> &RunningMoments {
        &self.moments
    }

    /// Fold one trial's payloads for this name.
    fn absorb(&mut self, payloads: &[Payload]) {
        for payload in payloads {
            self.aggregate.combine(payload);
        }

        match self.kind() {
            ResultKind::Sum => {
                let contribution: f64 = payloads
                    .iter()
                    .map(|p| match p {
                        Payload::Sum { value } => *value,
                        _ => 0.0,
                    })
                    .sum();
                self.moments.push(contribution);
            }
            ResultKind::Ratio => {
                let (num, den) = payloads.iter().fold((0.0, 0.0), |(n, d), p| match p {
                    Payload::Ratio {
                        numerator,
                        denominator,
                    } => (n + numerator, d + denominator),
                    _ => (n, d),
                });
                if den != 0.0 {
                    self.moments.push(num / den);
                }
            }
            ResultKind::Unmerged => {
                for payload in payloads {
                    if let Payload::Unmerged { value } = payload {
                        self.moments.push(*value);
                    }
                }
            }
        }
    }
}

/// The accumulated results of one parameter combination.
///
/// [`merge`](Self::merge) is the only mutator. Each call folds one trial's
/// batch and advances the trial counter by exactly one. Once
/// [`seal`](Self::seal)ed the set is read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    entries: BTreeMap<String, ResultEntry>,
    trial_count: u64,
    sealed: bool,
}

impl ResultSet {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one trial's batch of results.
    ///
    /// The batch is validated before anything is applied: if any result
    /// conflicts with the kind already established for its name (or with
    /// another result of the same name in the batch) the set is left
    /// untouched and [`ResultError::KindMismatch`] is returned. NaN and
    /// infinite values are rejected the same way with
    /// [`ResultError::NonFinite`].
    pub fn merge(&mut self, batch: &[TrialResult]) -> Result<(), ResultError> {
        if self.sealed {
            return Err(ResultError::Sealed);
        }

        let mut grouped: BTreeMap<&str, Vec<Payload>> = BTreeMap::new();
        for result in batch {
            if !result.payload().is_finite() {
                return Err(ResultError::NonFinite(result.name().to_string()));
            }
            let expected = self
                .entries
                .get(result.name())
                .map(ResultEntry::kind)
                .or_else(|| {
                    grouped
                        .get(result.name())
                        .and_then(|payloads| payloads.first())
                        .map(Payload::kind)
                });
            if let Some(expected) = expected {
                if expected != result.kind() {
                    return Err(ResultError::KindMismatch {
                        name: result.name().to_string(),
                        expected,
                        found: result.kind(),
                    });
                }
            }
            grouped
                .entry(result.name())
                .or_default()
                .push(*result.payload());
        }

        for (name, mut payloads) in grouped {
            // Canonical order so the aggregate does not depend on batch order.
            payloads.sort_by(compare_payloads);
            let kind = payloads[0].kind();
            self.entries
                .entry(name.to_string())
                .or_insert_with(|| ResultEntry::new(kind))
                .absorb(&payloads);
        }

        self.trial_count += 1;
        Ok(())
    }

    /// Number of merged trials.
    pub fn trial_count(&self) -> u64 {
        self.trial_count
    }

    /// Current aggregate for `name`.
    pub fn value_of(&self, name: &str) -> Option<AggregateView<'_>> {
        self.entries.get(name).map(|e| e.aggregate.view())
    }

    /// Entry for `name`, including per-trial moments.
    pub fn entry(&self, name: &str) -> Option<&ResultEntry> {
        self.entries.get(name)
    }

    /// Kind established for `name`.
    pub fn kind_of(&self, name: &str) -> Option<ResultKind> {
        self.entries.get(name).map(ResultEntry::kind)
    }

    /// Result names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether no result has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-trial mean of `name`.
    ///
    /// SUM: total divided by the trial count (trials that did not emit the
    /// name count as zero). RATIO: the pooled quotient. UNMERGED: mean of the
    /// elements.
    pub fn mean(&self, name: &str) -> Option<f64> {
        let entry = self.entries.get(name)?;
        match entry.aggregate.view() {
            AggregateView::Sum(total) => {
                (self.trial_count > 0).then(|| total / self.trial_count as f64)
            }
            AggregateView::Ratio(ratio) => ratio.quotient(),
            AggregateView::Unmerged(_) => entry.moments.mean(),
        }
    }

    /// Normal-approximation confidence interval for the per-trial mean of `name`.
    pub fn confidence_interval(&self, name: &str, level: f64) -> Option<ConfidenceInterval> {
        let entry = self.entries.get(name)?;
        let moments = match entry.kind() {
            ResultKind::Sum => entry
                .moments
                .padded_with_zeros(self.trial_count.saturating_sub(entry.moments.count())),
            ResultKind::Ratio | ResultKind::Unmerged => entry.moments,
        };
        moments.confidence_interval(level)
    }

    /// Make the set read-only.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the set is read-only.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

fn compare_payloads(a: &Payload, b: &Payload) -> Ordering {
    match (a, b) {
        (Payload::Sum { value: x }, Payload::Sum { value: y })
        | (Payload::Unmerged { value: x }, Payload::Unmerged { value: y }) => x.total_cmp(y),
        (
            Payload::Ratio {
                numerator: n1,
                denominator: d1,
            },
            Payload::Ratio {
                numerator: n2,
                denominator: d2,
            },
        ) => n1.total_cmp(n2).then_with(|| d1.total_cmp(d2)),
        _ => Ordering::Equal,
    }
}
