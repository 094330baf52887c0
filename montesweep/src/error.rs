//! Error types for sweep declaration, aggregation, trial execution and resume.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::results::ResultKind;

/// Errors in the static declaration of a sweep.
///
/// These are detected while building the parameter space or the sweep
/// configuration and are never silently corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclarationError {
    /// A parameter with this name is already declared.
    #[error("Parameter '{0}' is already declared")]
    DuplicateName(String),

    /// An unpacked parameter was declared without any values to sweep.
    #[error("Unpacked parameter '{0}' has no values")]
    EmptyUnpackDomain(String),

    /// A fixed parameter was declared without a value.
    #[error("Fixed parameter '{0}' has no value")]
    EmptyFixedValue(String),

    /// A fixed parameter was declared with more than one value.
    #[error("Fixed parameter '{name}' has {count} values (unpack it to sweep them)")]
    AmbiguousFixedValue {
        /// Parameter name.
        name: String,
        /// Number of declared values.
        count: usize,
    },

    /// The named parameter is not declared.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Minimum repetitions exceed the maximum.
    #[error("Invalid repetition bounds: min_reps {min} > max_reps {max}")]
    InvalidRepetitionBounds {
        /// Configured minimum repetitions.
        min: u64,
        /// Configured maximum repetitions.
        max: u64,
    },

    /// The repetition budget is zero.
    #[error("max_reps must be at least 1")]
    ZeroMaxReps,

    /// Parallelism is zero.
    #[error("parallelism must be at least 1")]
    ZeroParallelism,

    /// A checkpoint interval of zero trials or zero seconds.
    #[error("Checkpoint interval must be non-zero")]
    ZeroCheckpointInterval,

    /// The stopping rule threshold is NaN or infinite.
    #[error("Stopping rule threshold for '{0}' is not finite")]
    NonFiniteThreshold(String),

    /// The sweep identifier cannot be used as a checkpoint key.
    #[error("Invalid sweep id '{0}' (use letters, digits, '-', '_' or '.')")]
    InvalidSweepId(String),

    /// No trial function was supplied to the builder.
    #[error("No trial function configured")]
    MissingTrial,
}

/// Errors raised while merging trial results into a result set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultError {
    /// A result name was emitted with a kind other than the established one.
    #[error("Result '{name}' emitted as {found} but established as {expected}")]
    KindMismatch {
        /// Result name.
        name: String,
        /// Kind first observed for this name.
        expected: ResultKind,
        /// Kind carried by the offending result.
        found: ResultKind,
    },

    /// A result carried NaN or an infinity, which cannot be checkpointed.
    #[error("Result '{0}' is not finite")]
    NonFinite(String),

    /// The result set was sealed and accepts no further merges.
    #[error("Result set is sealed")]
    Sealed,

    /// Two outcomes for the same combination index were merged.
    #[error("Duplicate outcome for combination {0}")]
    DuplicateOutcome(usize),
}

/// Failure of a single trial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    /// The trial function reported a failure.
    #[error("Trial failed: {0}")]
    Failed(String),

    /// The trial produced results that could not be merged.
    #[error("Result aggregation failed: {0}")]
    Aggregation(#[from] ResultError),
}

impl TrialError {
    /// Create a trial failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        TrialError::Failed(message.into())
    }
}

/// A stored checkpoint does not belong to the sweep being resumed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResumeMismatch {
    /// The checkpoint was written by another sweep.
    #[error("Checkpoint belongs to sweep '{found}', expected '{expected}'")]
    SweepId {
        /// Sweep id of the running sweep.
        expected: String,
        /// Sweep id stored in the checkpoint.
        found: String,
    },

    /// The parameter declarations differ.
    #[error("Parameter declarations differ: {0}")]
    Parameters(String),

    /// The base seed differs, so replay would not be exact.
    #[error("Base seed differs: checkpoint has {found}, sweep has {expected}")]
    Seed {
        /// Seed of the running sweep.
        expected: u64,
        /// Seed stored in the checkpoint.
        found: u64,
    },

    /// The checkpoint was written by a different worker partition.
    #[error("Checkpoint was written by worker {found:?}, expected {expected:?}")]
    Worker {
        /// Worker slot of the running sweep.
        expected: Option<(usize, usize)>,
        /// Worker slot stored in the checkpoint.
        found: Option<(usize, usize)>,
    },

    /// Stopping settings differ from those the checkpoint was written under.
    #[error("Stopping settings differ: {0}")]
    Config(String),

    /// A stored combination index lies outside the parameter space.
    #[error("Checkpoint references combination {index} but the sweep has {count}")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of combinations in the sweep.
        count: usize,
    },
}

/// Errors loading a sweep definition file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for a sweep definition.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file parsed but declares an invalid sweep.
    #[error("Invalid declaration: {0}")]
    Declaration(#[from] DeclarationError),
}

/// Top-level error returned by the sweep runner.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Invalid parameter space or configuration.
    #[error("Declaration error: {0}")]
    Declaration(#[from] DeclarationError),

    /// Checkpoint storage failed; resumability can no longer be guaranteed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The stored checkpoint does not match this sweep.
    #[error("Refusing to resume: {0}")]
    ResumeMismatch(#[from] ResumeMismatch),

    /// Merging worker results failed.
    #[error("Result error: {0}")]
    Result(#[from] ResultError),

    /// A worker task panicked or was aborted.
    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Result alias for runner operations.
pub type SweepResult<T> = Result<T, SweepError>;
