//! The persisted progress of a sweep.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::convergence::{ConvergenceTracker, StoppingRule};
use crate::error::ResumeMismatch;
use crate::params::ParameterSpace;
use crate::results::{CombinationOutcome, ResultSet};

use super::error::CheckpointError;
use super::serializer::CheckpointSerializer;

/// Format version written by this build.
pub const CHECKPOINT_VERSION: u32 = 2;

/// Everything needed to continue a sweep exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version.
    pub version: u32,
    /// Sweep that wrote the checkpoint.
    pub sweep_id: String,
    /// Parameter declaration the indices refer to.
    pub parameters: ParameterSpace,
    /// Seed all trial RNG streams derive from.
    pub base_seed: u64,
    /// `(worker, workers)` partition, `None` for a single runner.
    pub worker: Option<(usize, usize)>,
    /// Settings that decide when a combination ends.
    pub stopping: StoppingTerms,
    /// Finished combinations in completion order.
    pub completed: Vec<CombinationOutcome>,
    /// Combination interrupted mid-way, if any.
    pub in_progress: Option<PartialCombination>,
}

/// The part of a sweep configuration that shapes stored outcomes.
///
/// Resuming under different terms would mix combinations stopped under one
/// rule with combinations stopped under another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingTerms {
    /// Minimum trials per combination.
    pub min_reps: u64,
    /// Trial budget per combination.
    pub max_reps: u64,
    /// Early stopping condition.
    pub stopping_rule: Option<StoppingRule>,
    /// Retries of a failing trial.
    pub max_trial_retries: u32,
}

impl StoppingTerms {
    fn diff(&self, stored: &StoppingTerms) -> Option<String> {
        if self.min_reps != stored.min_reps {
            return Some(format!(
                "min_reps is {} but the checkpoint has {}",
                self.min_reps, stored.min_reps
            ));
        }
        if self.max_reps != stored.max_reps {
            return Some(format!(
                "max_reps is {} but the checkpoint has {}",
                self.max_reps, stored.max_reps
            ));
        }
        if self.stopping_rule != stored.stopping_rule {
            return Some(format!(
                "stopping rule is {:?} but the checkpoint has {:?}",
                self.stopping_rule, stored.stopping_rule
            ));
        }
        if self.max_trial_retries != stored.max_trial_retries {
            return Some(format!(
                "max_trial_retries is {} but the checkpoint has {}",
                self.max_trial_retries, stored.max_trial_retries
            ));
        }
        None
    }
}

/// A combination that has started but not reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCombination {
    /// Combination index.
    pub index: usize,
    /// Results merged so far.
    pub result_set: ResultSet,
    /// Stopping state after the last merge.
    pub convergence: ConvergenceTracker,
    /// Consecutive failed attempts of the next trial.
    pub failed_attempts: u32,
    /// Time spent in trials so far.
    pub elapsed: Duration,
}

impl PartialCombination {
    /// A combination about to run its first trial.
    pub fn new(index: usize, convergence: ConvergenceTracker) -> Self {
        Self {
            index,
            result_set: ResultSet::new(),
            convergence,
            failed_attempts: 0,
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl Checkpoint {
    /// An empty checkpoint for a fresh sweep.
    pub fn new(
        sweep_id: impl Into<String>,
        parameters: ParameterSpace,
        base_seed: u64,
        worker: Option<(usize, usize)>,
        stopping: StoppingTerms,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            sweep_id: sweep_id.into(),
            parameters,
            base_seed,
            worker,
            stopping,
            completed: Vec::new(),
            in_progress: None,
        }
    }

    /// Decode a checkpoint, rejecting other format versions before parsing
    /// the body.
    pub fn decode<S: CheckpointSerializer>(
        serializer: &S,
        data: &[u8],
    ) -> Result<Self, CheckpointError> {
        let probe: VersionProbe = serializer.deserialize(data)?;
        if probe.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: probe.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        serializer.deserialize(data)
    }

    /// Encode the checkpoint.
    pub fn encode<S: CheckpointSerializer>(
        &self,
        serializer: &S,
    ) -> Result<Vec<u8>, CheckpointError> {
        serializer.serialize(self)
    }

    /// Check that this checkpoint was written by the described sweep.
    pub fn verify(
        &self,
        sweep_id: &str,
        parameters: &ParameterSpace,
        base_seed: u64,
        worker: Option<(usize, usize)>,
        stopping: &StoppingTerms,
    ) -> Result<(), ResumeMismatch> {
        if self.sweep_id != sweep_id {
            return Err(ResumeMismatch::SweepId {
                expected: sweep_id.to_string(),
                found: self.sweep_id.clone(),
            });
        }
        parameters.ensure_same_declaration(&self.parameters)?;
        if self.base_seed != base_seed {
            return Err(ResumeMismatch::Seed {
                expected: base_seed,
                found: self.base_seed,
            });
        }
        if self.worker != worker {
            return Err(ResumeMismatch::Worker {
                expected: worker,
                found: self.worker,
            });
        }
        if let Some(diff) = stopping.diff(&self.stopping) {
            return Err(ResumeMismatch::Config(diff));
        }

        let count = parameters.combination_count();
        let indexes = self
            .completed
            .iter()
            .map(CombinationOutcome::index)
            .chain(self.in_progress.as_ref().map(|p| p.index));
        for index in indexes {
            if index >= count {
                return Err(ResumeMismatch::IndexOutOfRange { index, count });
            }
        }
        Ok(())
    }

    /// Indices that need no further trials.
    pub fn completed_indexes(&self) -> BTreeSet<usize> {
        self.completed.iter().map(CombinationOutcome::index).collect()
    }

    /// Index the sweep continues from: the interrupted combination, or the
    /// one after the last completed, or zero.
    pub fn resume_index(&self) -> usize {
        match &self.in_progress {
            Some(partial) => partial.index,
            None => self
                .completed
                .iter()
                .map(|o| o.index() + 1)
                .max()
                .unwrap_or(0),
        }
    }

    /// Trials already merged, including the interrupted combination.
    pub fn trials_done(&self) -> u64 {
        let completed: u64 = self.completed.iter().map(CombinationOutcome::trial_count).sum();
        completed
            + self
                .in_progress
                .as_ref()
                .map_or(0, |p| p.result_set.trial_count())
    }
}
