//! Accumulated values and the per-kind combination table.

use serde::{Deserialize, Serialize};

use super::kind::{Payload, ResultKind};

/// Running aggregate for one result name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregate {
    /// Total of all SUM contributions.
    Sum {
        /// Running total.
        total: f64,
    },
    /// Separately summed numerator and denominator.
    Ratio {
        /// Sum of numerators.
        numerator: f64,
        /// Sum of denominators.
        denominator: f64,
    },
    /// Every UNMERGED value in merge order.
    Unmerged {
        /// Collected values.
        values: Vec<f64>,
    },
}

impl Aggregate {
    /// The identity aggregate for `kind`.
    pub fn empty(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Sum => Aggregate::Sum { total: 0.0 },
            ResultKind::Ratio => Aggregate::Ratio {
                numerator: 0.0,
                denominator: 0.0,
            },
            ResultKind::Unmerged => Aggregate::Unmerged { values: Vec::new() },
        }
    }

    /// Kind of this aggregate.
    pub fn kind(&self) -> ResultKind {
        match self {
            Aggregate::Sum { .. } => ResultKind::Sum,
            Aggregate::Ratio { .. } => ResultKind::Ratio,
            Aggregate::Unmerged { .. } => ResultKind::Unmerged,
        }
    }

    /// Fold `payload` into this aggregate using the rule for its kind.
    ///
    /// The caller guarantees that kinds agree.
    pub(crate) fn combine(&mut self, payload: &Payload) {
        debug_assert_eq!(self.kind(), payload.kind());
        (self.kind().combiner())(self, payload)
    }

    /// Read-only view of the aggregate.
    pub fn view(&self) -> AggregateView<'_> {
        match self {
            Aggregate::Sum { total } => AggregateView::Sum(*total),
            Aggregate::Ratio {
                numerator,
                denominator,
            } => AggregateView::Ratio(RatioView {
                numerator: *numerator,
                denominator: *denominator,
            }),
            Aggregate::Unmerged { values } => AggregateView::Unmerged(values),
        }
    }
}

/// Signature of a kind-specific combination function.
pub(crate) type Combiner = fn(&mut Aggregate, &Payload);

/// Combination functions indexed by [`ResultKind`] discriminant.
const COMBINERS: [Combiner; 3] = [combine_sum, combine_ratio, combine_unmerged];

impl ResultKind {
    /// The combination function for this kind.
    pub(crate) fn combiner(self) -> Combiner {
        COMBINERS[self as usize]
    }
}

fn combine_sum(aggregate: &mut Aggregate, payload: &Payload) {
    if let (Aggregate::Sum { total }, Payload::Sum { value }) = (aggregate, payload) {
        *total += value;
    }
}

fn combine_ratio(aggregate: &mut Aggregate, payload: &Payload) {
    if let (
        Aggregate::Ratio {
            numerator,
            denominator,
        },
        Payload::Ratio {
            numerator: n,
            denominator: d,
        },
    ) = (aggregate, payload)
    {
        *numerator += n;
        *denominator += d;
    }
}

fn combine_unmerged(aggregate: &mut Aggregate, payload: &Payload) {
    if let (Aggregate::Unmerged { values }, Payload::Unmerged { value }) = (aggregate, payload) {
        values.push(*value);
    }
}

/// Borrowed view of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateView<'a> {
    /// Current SUM total.
    Sum(f64),
    /// Current RATIO parts.
    Ratio(RatioView),
    /// Current UNMERGED elements.
    Unmerged(&'a [f64]),
}

impl<'a> AggregateView<'a> {
    /// Kind of the viewed aggregate.
    pub fn kind(&self) -> ResultKind {
        match self {
            AggregateView::Sum(_) => ResultKind::Sum,
            AggregateView::Ratio(_) => ResultKind::Ratio,
            AggregateView::Unmerged(_) => ResultKind::Unmerged,
        }
    }

    /// The SUM total, if this is a SUM.
    pub fn as_sum(&self) -> Option<f64> {
        match self {
            AggregateView::Sum(total) => Some(*total),
            _ => None,
        }
    }

    /// The RATIO parts, if this is a RATIO.
    pub fn as_ratio(&self) -> Option<RatioView> {
        match self {
            AggregateView::Ratio(ratio) => Some(*ratio),
            _ => None,
        }
    }

    /// The UNMERGED elements, if this is UNMERGED.
    pub fn as_unmerged(&self) -> Option<&'a [f64]> {
        match self {
            AggregateView::Unmerged(values) => Some(*values),
            _ => None,
        }
    }
}

/// Numerator and denominator totals of a RATIO aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioView {
    /// Sum of numerators.
    pub numerator: f64,
    /// Sum of denominators.
    pub denominator: f64,
}

impl RatioView {
    /// `numerator / denominator`, computed on demand; `None` for a zero denominator.
    pub fn quotient(&self) -> Option<f64> {
        (self.denominator != 0.0).then(|| self.numerator / self.denominator)
    }
}
