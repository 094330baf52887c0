//! Bit error rate of BPSK over an AWGN channel.
//!
//! Each trial sends `num_bits` random bits as antipodal symbols, adds white
//! Gaussian noise scaled for the combination's `snr_db` (Eb/N0 in dB) and
//! counts hard-decision errors.

use async_trait::async_trait;
use rand::Rng;

use crate::convergence::StoppingRule;
use crate::error::{DeclarationError, TrialError};
use crate::params::ParameterSpace;
use crate::results::TrialResult;
use crate::runner::{SweepConfig, Trial, TrialContext};

/// Name of the SUM result counting wrong bits.
pub const BIT_ERRORS: &str = "bit_errors";
/// Name of the RATIO result `bit_errors / bits`.
pub const BER: &str = "ber";
/// Name of the UNMERGED result holding each trial's error rate.
pub const TRIAL_BER: &str = "trial_ber";

/// BPSK bit error trial. Reads `snr_db` and `num_bits` from the combination.
#[derive(Debug, Clone, Default)]
pub struct BpskTrial;

#[async_trait]
impl Trial for BpskTrial {
    fn name(&self) -> &str {
        "bpsk-awgn"
    }

    async fn run(&self, ctx: &TrialContext<'_>) -> Result<Vec<TrialResult>, TrialError> {
        let combination = ctx.combination();
        let snr_db = combination
            .get_f64("snr_db")
            .ok_or_else(|| TrialError::failed("missing numeric parameter 'snr_db'"))?;
        let num_bits = combination
            .get_i64("num_bits")
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| TrialError::failed("'num_bits' must be a positive integer"))?;

        let errors = count_errors(&mut ctx.rng(), snr_db, num_bits);
        let bits = num_bits as f64;
        Ok(vec![
            TrialResult::sum(BIT_ERRORS, errors as f64),
            TrialResult::ratio(BER, errors as f64, bits),
            TrialResult::unmerged(TRIAL_BER, errors as f64 / bits),
        ])
    }
}

/// Noise standard deviation per real dimension for unit-energy BPSK.
pub fn noise_sigma(snr_db: f64) -> f64 {
    let eb_n0 = 10f64.powf(snr_db / 10.0);
    (1.0 / (2.0 * eb_n0)).sqrt()
}

/// Transmit `num_bits` bits and count decision errors.
pub fn count_errors<R: Rng + ?Sized>(rng: &mut R, snr_db: f64, num_bits: u64) -> u64 {
    let sigma = noise_sigma(snr_db);
    let mut errors = 0;
    for _ in 0..num_bits {
        let bit: bool = rng.random();
        let symbol = if bit { 1.0 } else { -1.0 };
        let received = symbol + sigma * standard_normal(rng);
        if (received >= 0.0) != bit {
            errors += 1;
        }
    }
    errors
}

/// Box-Muller sample from N(0, 1).
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - u keeps the logarithm finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Default sweep: `snr_db` in 0..=8 dB, 1000 bits per trial.
pub fn default_space() -> Result<ParameterSpace, DeclarationError> {
    ParameterSpace::new()
        .with_unpacked("snr_db", [0.0, 2.0, 4.0, 6.0, 8.0])?
        .with_fixed("num_bits", 1000_i64)
}

/// Default settings: stop after 100 bit errors, at most 500 trials.
pub fn default_config() -> SweepConfig {
    SweepConfig {
        min_reps: 10,
        max_reps: 500,
        stopping_rule: Some(StoppingRule::at_least(BIT_ERRORS, 100.0)),
        ..SweepConfig::default()
    }
}
