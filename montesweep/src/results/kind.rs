//! Per-trial measurements and their combination kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How results sharing a name are combined across trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Additive accumulation, e.g. event counts.
    Sum,
    /// Numerator and denominator summed separately.
    Ratio,
    /// Every value kept as a distinct element.
    Unmerged,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResultKind::Sum => "SUM",
            ResultKind::Ratio => "RATIO",
            ResultKind::Unmerged => "UNMERGED",
        };
        f.write_str(label)
    }
}

/// Value carried by a single [`TrialResult`]; its variant determines the kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Contribution to a running sum.
    Sum {
        /// Value added to the total.
        value: f64,
    },
    /// Contribution to a ratio.
    Ratio {
        /// Value added to the numerator.
        numerator: f64,
        /// Value added to the denominator.
        denominator: f64,
    },
    /// Element appended to a sequence.
    Unmerged {
        /// Value kept as its own element.
        value: f64,
    },
}

impl Payload {
    /// Kind implied by this payload.
    pub fn kind(&self) -> ResultKind {
        match self {
            Payload::Sum { .. } => ResultKind::Sum,
            Payload::Ratio { .. } => ResultKind::Ratio,
            Payload::Unmerged { .. } => ResultKind::Unmerged,
        }
    }

    /// Whether every number carried is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Payload::Sum { value } | Payload::Unmerged { value } => value.is_finite(),
            Payload::Ratio {
                numerator,
                denominator,
            } => numerator.is_finite() && denominator.is_finite(),
        }
    }
}

/// A named measurement emitted by one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    name: String,
    payload: Payload,
}

impl TrialResult {
    /// A SUM result.
    pub fn sum(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Sum { value },
        }
    }

    /// A RATIO result contributing `numerator / denominator`.
    pub fn ratio(name: impl Into<String>, numerator: f64, denominator: f64) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Ratio {
                numerator,
                denominator,
            },
        }
    }

    /// An UNMERGED result.
    pub fn unmerged(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Unmerged { value },
        }
    }

    /// Result name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Result kind.
    pub fn kind(&self) -> ResultKind {
        self.payload.kind()
    }

    /// Result payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}
