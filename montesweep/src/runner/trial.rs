//! The trial contract.
//!
//! A [`Trial`] is one independent random experiment run with a parameter
//! combination. The runner calls [`Trial::setup`] once per combination and
//! then [`Trial::run`] repeatedly until the combination stops.
//!
//! Implement the trait directly or use [`trial_fn`] for closures:
//!
//! ```ignore
//! use montesweep::{trial_fn, TrialResult};
//! use rand::Rng;
//!
//! let coin = trial_fn("coin", |ctx| {
//!     let heads = ctx.rng().random_bool(0.5);
//!     Ok(vec![TrialResult::sum("heads", if heads { 1.0 } else { 0.0 })])
//! });
//! ```

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::TrialError;
use crate::params::Combination;
use crate::results::TrialResult;

/// A repeatable random experiment.
///
/// Trials are shared between workers, so they take `&self`; all randomness
/// must come from [`TrialContext::rng`] for runs to be reproducible.
#[async_trait]
pub trait Trial: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called once before the first trial of a combination (also after a
    /// resume). Default implementation is a no-op.
    async fn setup(&self, _combination: &Combination) -> Result<(), TrialError> {
        Ok(())
    }

    /// Run one trial and return its measurements.
    async fn run(&self, ctx: &TrialContext<'_>) -> Result<Vec<TrialResult>, TrialError>;
}

/// What a trial knows about the run it belongs to.
#[derive(Debug, Clone)]
pub struct TrialContext<'a> {
    combination: &'a Combination,
    trial_index: u64,
    attempt: u32,
    seed: u64,
}

impl<'a> TrialContext<'a> {
    pub(crate) fn new(
        combination: &'a Combination,
        trial_index: u64,
        attempt: u32,
        base_seed: u64,
    ) -> Self {
        Self {
            combination,
            trial_index,
            attempt,
            seed: trial_seed(base_seed, combination.index(), trial_index, attempt),
        }
    }

    /// Parameter assignment of this trial.
    pub fn combination(&self) -> &'a Combination {
        self.combination
    }

    /// Zero-based index of the trial within its combination.
    pub fn trial_index(&self) -> u64 {
        self.trial_index
    }

    /// Zero-based retry attempt of this trial.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Seed of this trial's random stream.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A fresh RNG for this trial. Every call restarts the same stream.
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Seed of one trial attempt, a function of nothing but its coordinates.
pub(crate) fn trial_seed(
    base_seed: u64,
    combination: usize,
    trial_index: u64,
    attempt: u32,
) -> u64 {
    let mut h = splitmix64(base_seed);
    h = splitmix64(h ^ combination as u64);
    h = splitmix64(h ^ trial_index);
    splitmix64(h ^ u64::from(attempt))
}

/// Closure-based trial adapter, see [`trial_fn`].
pub struct FnTrial<F> {
    name: String,
    run_fn: F,
}

#[async_trait]
impl<F> Trial for FnTrial<F>
where
    F: Fn(&TrialContext<'_>) -> Result<Vec<TrialResult>, TrialError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &TrialContext<'_>) -> Result<Vec<TrialResult>, TrialError> {
        (self.run_fn)(ctx)
    }
}

/// Create a trial from a synchronous closure.
pub fn trial_fn<F>(name: impl Into<String>, f: F) -> FnTrial<F>
where
    F: Fn(&TrialContext<'_>) -> Result<Vec<TrialResult>, TrialError> + Send + Sync + 'static,
{
    FnTrial {
        name: name.into(),
        run_fn: f,
    }
}
