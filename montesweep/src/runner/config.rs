//! Sweep configuration and TOML sweep definitions.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{is_valid_key, StoppingTerms};
use crate::convergence::{validate_bounds, ConvergenceTracker, StoppingRule};
use crate::error::{ConfigError, DeclarationError};
use crate::params::{ParamValue, ParameterSpace};

/// When the runner persists progress.
///
/// A checkpoint is written when either trigger fires. Combination boundaries
/// and cancellation always write one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointPolicy {
    /// Write after this many trials. Default: 100.
    pub every_trials: Option<u64>,
    /// Write after this many milliseconds of wall time. Default: 30000.
    pub every_millis: Option<u64>,
    /// Delete the checkpoint once the sweep completes. Default: false.
    pub remove_on_completion: bool,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            every_trials: Some(100),
            every_millis: Some(30_000),
            remove_on_completion: false,
        }
    }
}

impl CheckpointPolicy {
    /// Time trigger as a duration.
    pub fn interval(&self) -> Option<Duration> {
        self.every_millis.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), DeclarationError> {
        if self.every_trials == Some(0) || self.every_millis == Some(0) {
            return Err(DeclarationError::ZeroCheckpointInterval);
        }
        Ok(())
    }
}

/// Immutable settings of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Trials every combination runs before the stopping rule is consulted. Default: 1.
    pub min_reps: u64,
    /// Trial budget per combination. Default: 1000.
    pub max_reps: u64,
    /// Early stopping condition; without one every combination exhausts.
    pub stopping_rule: Option<StoppingRule>,
    /// Checkpoint triggers.
    pub checkpoint: CheckpointPolicy,
    /// Retries of a failing trial before its combination is marked failed. Default: 3.
    pub max_trial_retries: u32,
    /// Seed every trial RNG derives from. Default: 0.
    pub base_seed: u64,
    /// Number of concurrent workers. Default: 1.
    pub parallelism: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_reps: 1,
            max_reps: 1000,
            stopping_rule: None,
            checkpoint: CheckpointPolicy::default(),
            max_trial_retries: 3,
            base_seed: 0,
            parallelism: 1,
        }
    }
}

impl SweepConfig {
    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        validate_bounds(self.min_reps, self.max_reps)?;
        if let Some(rule) = &self.stopping_rule {
            rule.validate()?;
        }
        if self.parallelism == 0 {
            return Err(DeclarationError::ZeroParallelism);
        }
        self.checkpoint.validate()
    }

    /// Settings a checkpoint must agree with to be resumed.
    pub fn stopping_terms(&self) -> StoppingTerms {
        StoppingTerms {
            min_reps: self.min_reps,
            max_reps: self.max_reps,
            stopping_rule: self.stopping_rule.clone(),
            max_trial_retries: self.max_trial_retries,
        }
    }

    /// A fresh tracker for one combination.
    pub fn tracker(&self) -> Result<ConvergenceTracker, DeclarationError> {
        ConvergenceTracker::new(self.min_reps, self.max_reps, self.stopping_rule.clone())
    }
}

/// One `[[parameter]]` entry of a sweep file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    /// Parameter name.
    pub name: String,
    /// Single value of a fixed parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ParamValue>,
    /// Values of an unpacked parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ParamValue>,
    /// Sweep over `values` instead of holding one value.
    #[serde(default)]
    pub unpack: bool,
}

/// A sweep described in TOML.
///
/// ```toml
/// id = "ber"
///
/// [sweep]
/// min_reps = 100
/// max_reps = 1000
///
/// [sweep.stopping_rule]
/// result_name = "bit_errors"
/// threshold = 50.0
///
/// [[parameter]]
/// name = "snr_db"
/// values = [0, 2, 4]
/// unpack = true
///
/// [[parameter]]
/// name = "num_bits"
/// value = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFile {
    /// Sweep identifier, also the checkpoint key.
    pub id: String,
    /// Runner settings.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Parameter declarations in order.
    #[serde(default, rename = "parameter")]
    pub parameters: Vec<ParameterEntry>,
}

impl SweepFile {
    /// Parse a sweep definition.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: SweepFile = toml::from_str(source)?;
        file.validate()?;
        Ok(file)
    }

    /// Read and parse a sweep definition from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Build the declared parameter space.
    pub fn parameter_space(&self) -> Result<ParameterSpace, DeclarationError> {
        let mut space = ParameterSpace::new();
        for entry in &self.parameters {
            let values = entry.value.iter().chain(&entry.values).cloned();
            space.add_parameter(entry.name.clone(), values, entry.unpack)?;
        }
        Ok(space)
    }

    fn validate(&self) -> Result<(), DeclarationError> {
        validate_sweep_id(&self.id)?;
        self.sweep.validate()?;
        self.parameter_space().map(|_| ())
    }
}

pub(crate) fn validate_sweep_id(id: &str) -> Result<(), DeclarationError> {
    if is_valid_key(id) {
        Ok(())
    } else {
        Err(DeclarationError::InvalidSweepId(id.to_string()))
    }
}
