//! Running moments and normal-approximation confidence intervals.

use serde::{Deserialize, Serialize};

/// Streaming mean and variance (Welford).
///
/// Tracks the number of observations, the running mean and the sum of squared
/// deviations, so the sample variance is available without keeping values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMoments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    /// Empty moments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Combine with moments computed over a disjoint set of observations.
    pub fn merge(&self, other: &RunningMoments) -> RunningMoments {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * self.count as f64 * other.count as f64 / count as f64;
        RunningMoments { count, mean, m2 }
    }

    /// These moments extended with `extra` observations equal to zero.
    pub fn padded_with_zeros(&self, extra: u64) -> RunningMoments {
        self.merge(&RunningMoments {
            count: extra,
            mean: 0.0,
            m2: 0.0,
        })
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sample mean, `None` without observations.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased sample variance, `None` below two observations.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    /// Standard error of the mean.
    pub fn std_error(&self) -> Option<f64> {
        self.variance()
            .map(|var| (var / self.count as f64).sqrt())
    }

    /// Two-sided confidence interval for the mean at `level` (e.g. `0.95`).
    pub fn confidence_interval(&self, level: f64) -> Option<ConfidenceInterval> {
        if !(level > 0.0 && level < 1.0) {
            return None;
        }
        let mean = self.mean()?;
        let std_error = self.std_error()?;
        let z = normal_quantile(0.5 + level / 2.0);
        Some(ConfidenceInterval {
            mean,
            half_width: z * std_error,
            level,
        })
    }
}

/// Symmetric interval around a sample mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Sample mean.
    pub mean: f64,
    /// Distance from the mean to either bound.
    pub half_width: f64,
    /// Confidence level in `(0, 1)`.
    pub level: f64,
}

impl ConfidenceInterval {
    /// Lower bound.
    pub fn lower(&self) -> f64 {
        self.mean - self.half_width
    }

    /// Upper bound.
    pub fn upper(&self) -> f64 {
        self.mean + self.half_width
    }

    /// Half width relative to the magnitude of the mean.
    pub fn relative_half_width(&self) -> Option<f64> {
        (self.mean != 0.0).then(|| self.half_width / self.mean.abs())
    }
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
///
/// Relative error below 1.2e-9 on `(0, 1)`; returns NaN outside that range.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
