//! Sweep runner and orchestration.
//!
//! ## Submodules
//!
//! - `builder` - [`SweepBuilder`] for configuring sweeps
//! - `config` - [`SweepConfig`], checkpoint policy and TOML sweep files
//! - `trial` - the [`Trial`] contract and its per-trial context
//! - `simulation` - [`SimulationRunner`], the run and plan entry points
//! - `orchestrator` - per-worker combination loop and checkpointing
//! - `parallel` - fan-out over worker stripes
//! - `report` - [`SweepReport`] and [`SweepPlan`]

pub mod builder;
pub mod config;
pub(crate) mod orchestrator;
pub(crate) mod parallel;
pub mod report;
pub mod simulation;
pub mod trial;

pub use builder::SweepBuilder;
pub use config::{CheckpointPolicy, ParameterEntry, SweepConfig, SweepFile};
pub use report::{SweepPlan, SweepReport};
pub use simulation::SimulationRunner;
pub use trial::{trial_fn, FnTrial, Trial, TrialContext};
