//! Builder for configuring sweeps.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
use crate::convergence::StoppingRule;
use crate::error::DeclarationError;
use crate::params::ParameterSpace;

use super::config::{validate_sweep_id, SweepConfig, SweepFile};
use super::orchestrator::SweepShared;
use super::simulation::SimulationRunner;
use super::trial::Trial;

/// Builder pattern for configuring a [`SimulationRunner`].
///
/// ```ignore
/// let runner = SweepBuilder::new("ber")
///     .parameters(space)
///     .max_reps(1000)
///     .stopping_rule(StoppingRule::at_least("bit_errors", 100.0))
///     .checkpoint_store(FileCheckpointStore::open("checkpoints").await?)
///     .trial(BerTrial)
///     .build()?;
/// let report = runner.run().await?;
/// ```
pub struct SweepBuilder {
    sweep_id: String,
    parameters: ParameterSpace,
    config: SweepConfig,
    trial: Option<Arc<dyn Trial>>,
    store: Option<Arc<dyn CheckpointStore>>,
    cancel: Option<CancellationToken>,
}

impl SweepBuilder {
    /// Start configuring the sweep `sweep_id`.
    ///
    /// The id keys the checkpoints, so a rerun with the same id resumes.
    pub fn new(sweep_id: impl Into<String>) -> Self {
        Self {
            sweep_id: sweep_id.into(),
            parameters: ParameterSpace::new(),
            config: SweepConfig::default(),
            trial: None,
            store: None,
            cancel: None,
        }
    }

    /// Start from a parsed sweep file.
    pub fn from_file(file: &SweepFile) -> Result<Self, DeclarationError> {
        Ok(Self::new(file.id.clone())
            .parameters(file.parameter_space()?)
            .config(file.sweep.clone()))
    }

    /// Set the parameter space.
    pub fn parameters(mut self, parameters: ParameterSpace) -> Self {
        self.parameters = parameters;
        self
    }

    /// Replace all runner settings.
    pub fn config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    /// Trials each combination runs before the stopping rule is consulted.
    pub fn min_reps(mut self, min_reps: u64) -> Self {
        self.config.min_reps = min_reps;
        self
    }

    /// Trial budget per combination.
    pub fn max_reps(mut self, max_reps: u64) -> Self {
        self.config.max_reps = max_reps;
        self
    }

    /// Stop a combination early once `rule` holds.
    pub fn stopping_rule(mut self, rule: StoppingRule) -> Self {
        self.config.stopping_rule = Some(rule);
        self
    }

    /// Checkpoint after every `trials` trials, or never on trial count.
    pub fn checkpoint_every_trials(mut self, trials: Option<u64>) -> Self {
        self.config.checkpoint.every_trials = trials;
        self
    }

    /// Checkpoint after `interval` of wall time, or never on time.
    ///
    /// The interval is kept at millisecond resolution; shorter ones become
    /// one millisecond.
    pub fn checkpoint_every(mut self, interval: Option<Duration>) -> Self {
        self.config.checkpoint.every_millis = interval.map(|d| {
            u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
        });
        self
    }

    /// Delete checkpoints once the sweep completes.
    pub fn remove_checkpoint_on_completion(mut self, remove: bool) -> Self {
        self.config.checkpoint.remove_on_completion = remove;
        self
    }

    /// Retries of a failing trial before its combination is marked failed.
    pub fn max_trial_retries(mut self, retries: u32) -> Self {
        self.config.max_trial_retries = retries;
        self
    }

    /// Seed all trial RNG streams derive from.
    pub fn base_seed(mut self, seed: u64) -> Self {
        self.config.base_seed = seed;
        self
    }

    /// Number of concurrent workers.
    pub fn parallelism(mut self, workers: usize) -> Self {
        self.config.parallelism = workers;
        self
    }

    /// Trial run for every combination.
    pub fn trial(mut self, trial: impl Trial) -> Self {
        self.trial = Some(Arc::new(trial));
        self
    }

    /// Where checkpoints go. Defaults to an in-memory store.
    pub fn checkpoint_store(mut self, store: impl CheckpointStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Share an existing store, e.g. to inspect it after the run.
    pub fn shared_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `token` to cancel the sweep.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate the configuration and create the runner.
    pub fn build(self) -> Result<SimulationRunner, DeclarationError> {
        validate_sweep_id(&self.sweep_id)?;
        self.config.validate()?;
        let trial = self.trial.ok_or(DeclarationError::MissingTrial)?;

        Ok(SimulationRunner::new(SweepShared {
            sweep_id: self.sweep_id,
            parameters: self.parameters,
            config: self.config,
            trial,
            store: self.store.unwrap_or_else(|| {
                Arc::new(InMemoryCheckpointStore::new()) as Arc<dyn CheckpointStore>
            }),
            cancel: self.cancel.unwrap_or_default(),
        }))
    }
}
