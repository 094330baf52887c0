//! # Montesweep
//!
//! Monte Carlo parameter sweeps with adaptive stopping and resumable
//! checkpoints.
//!
//! A sweep repeats a random experiment (a [`Trial`]) for every combination
//! of a declared [`ParameterSpace`], until each combination either meets its
//! [`StoppingRule`] or exhausts its repetition budget.
//!
//! ## Core Components
//!
//! - [`ParameterSpace`]: fixed and unpacked parameters, expanded in a stable
//!   mixed-radix order so a combination index means the same thing across runs
//! - [`TrialResult`] / [`ResultSet`]: typed measurements folded by kind
//!   (SUM adds, RATIO sums numerator and denominator apart, UNMERGED keeps
//!   every value)
//! - [`ConvergenceTracker`]: per-combination RUNNING → CONVERGED / EXHAUSTED
//! - [`SimulationRunner`]: drives trials, checkpoints progress, resumes,
//!   fans out over workers
//! - [`CheckpointStore`]: where progress lives between runs
//!
//! ## Quick Start
//!
//! ```ignore
//! use montesweep::{trial_fn, ParameterSpace, StoppingRule, SweepBuilder, TrialResult};
//! use rand::Rng;
//!
//! let space = ParameterSpace::new()
//!     .with_unpacked("p", [0.1, 0.01])?
//!     .with_fixed("n", 100_i64)?;
//!
//! let runner = SweepBuilder::new("coin")
//!     .parameters(space)
//!     .min_reps(10)
//!     .max_reps(10_000)
//!     .stopping_rule(StoppingRule::at_least("hits", 50.0))
//!     .trial(trial_fn("coin", |ctx| {
//!         let p = ctx.combination().get_f64("p").unwrap_or(0.5);
//!         let mut rng = ctx.rng();
//!         let hits = (0..100).filter(|_| rng.random_bool(p)).count();
//!         Ok(vec![TrialResult::sum("hits", hits as f64)])
//!     }))
//!     .build()?;
//!
//! let report = runner.run().await?;
//! println!("{report}");
//! ```
//!
//! ## Reproducibility
//!
//! Each trial draws from a ChaCha8 stream seeded by the base seed, the
//! combination index, the trial index and the retry attempt. Together with
//! order-independent merging this makes a resumed sweep produce exactly the
//! results of an uninterrupted one.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod checkpoint;
pub mod convergence;
pub mod error;
pub mod params;
pub mod results;
pub mod runner;
pub mod simulations;

pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointSerializer, CheckpointStore, FileCheckpointStore,
    InMemoryCheckpointStore, JsonSerializer, PartialCombination, StoppingTerms,
    CHECKPOINT_VERSION,
};
pub use convergence::{Comparison, ConvergenceStatus, ConvergenceTracker, Statistic, StoppingRule};
pub use error::{
    ConfigError, DeclarationError, ResultError, ResumeMismatch, SweepError, SweepResult,
    TrialError,
};
pub use params::{Combination, Combinations, ParamValue, Parameter, ParameterSpace};
pub use results::{
    AggregateView, CombinationOutcome, ConfidenceInterval, OutcomeCounts, RatioView, ResultKind,
    ResultSet, SimulationResults, TerminalReason, TrialResult,
};
pub use runner::{
    trial_fn, CheckpointPolicy, SimulationRunner, SweepBuilder, SweepConfig, SweepFile,
    SweepPlan, SweepReport, Trial, TrialContext,
};
