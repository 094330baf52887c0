//! The sweep runner.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::SweepResult;
use crate::params::ParameterSpace;
use crate::results::SimulationResults;

use super::config::SweepConfig;
use super::orchestrator::SweepShared;
use super::parallel::run_workers;
use super::report::{SweepPlan, SweepReport};

/// Drives a configured sweep. Created by [`SweepBuilder`](super::SweepBuilder).
#[derive(Clone)]
pub struct SimulationRunner {
    shared: Arc<SweepShared>,
}

impl SimulationRunner {
    pub(crate) fn new(shared: SweepShared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Sweep identifier.
    pub fn sweep_id(&self) -> &str {
        &self.shared.sweep_id
    }

    /// Parameter space being swept.
    pub fn parameters(&self) -> &ParameterSpace {
        &self.shared.parameters
    }

    /// Runner settings.
    pub fn config(&self) -> &SweepConfig {
        &self.shared.config
    }

    /// Token that stops the sweep at the next trial boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Run the sweep to completion or cancellation.
    ///
    /// Resumes from stored checkpoints when present. Failed combinations do
    /// not stop the sweep; checkpoint storage errors and checkpoints from
    /// another sweep do.
    #[instrument(skip_all, fields(sweep_id = %self.shared.sweep_id))]
    pub async fn run(&self) -> SweepResult<SweepReport> {
        let started = Instant::now();
        let combination_count = self.shared.parameters.combination_count();
        let workers = self.shared.slots().len();
        tracing::info!(
            combinations = combination_count,
            workers,
            trial = self.shared.trial.name(),
            "sweep started"
        );
        for key in self.shared.stray_checkpoints().await? {
            tracing::warn!(
                key = %key,
                workers,
                "checkpoint from another worker layout is ignored, rerun with its parallelism to resume it"
            );
        }

        let mut results = SimulationResults::new(self.shared.parameters.clone());
        let mut trials_run = 0;
        let mut trials_resumed = 0;
        let mut cancelled = false;
        for worker in run_workers(self.shared.clone()).await? {
            trials_run += worker.trials_run;
            trials_resumed += worker.trials_resumed;
            cancelled |= worker.cancelled;
            for outcome in worker.outcomes {
                results.push(outcome)?;
            }
        }

        let counts = results.counts();
        let wall_time = started.elapsed();
        tracing::info!(
            finished = results.len(),
            converged = counts.converged,
            exhausted = counts.exhausted,
            failed = counts.failed,
            trials_run,
            ?wall_time,
            "sweep {}",
            if cancelled { "cancelled" } else { "completed" }
        );
        if counts.failed > 0 {
            tracing::warn!(
                "{} combinations failed - check logs above for errors",
                counts.failed
            );
        }

        Ok(SweepReport {
            sweep_id: self.shared.sweep_id.clone(),
            results,
            combination_count,
            counts,
            trials_run,
            trials_resumed,
            wall_time,
            cancelled,
            workers,
        })
    }

    /// Describe what [`run`](Self::run) would do without running any trial.
    ///
    /// Stored checkpoints are loaded and verified exactly as a real run
    /// would, so a mismatching checkpoint is reported here too.
    pub async fn plan(&self) -> SweepResult<SweepPlan> {
        let config = &self.shared.config;
        let combination_count = self.shared.parameters.combination_count();
        let slots = self.shared.slots();

        let mut completed = 0usize;
        let mut trials_done = 0u64;
        let mut in_progress_trials = 0u64;
        let mut resumed_from: Option<usize> = None;
        for slot in &slots {
            if let Some(checkpoint) = self.shared.load_checkpoint(*slot).await? {
                completed += checkpoint.completed.len();
                trials_done += checkpoint.trials_done();
                in_progress_trials += checkpoint
                    .in_progress
                    .as_ref()
                    .map_or(0, |p| p.result_set.trial_count());
                let index = checkpoint.resume_index();
                resumed_from = Some(resumed_from.map_or(index, |r| r.min(index)));
            }
        }

        let stray_checkpoints = self.shared.stray_checkpoints().await?;
        let remaining = combination_count.saturating_sub(completed);
        let per_combination_min = config.min_reps.max(1);
        Ok(SweepPlan {
            sweep_id: self.shared.sweep_id.clone(),
            combination_count,
            completed,
            remaining,
            trials_done,
            min_trials: (remaining as u64)
                .saturating_mul(per_combination_min)
                .saturating_sub(in_progress_trials),
            max_trials: (remaining as u64)
                .saturating_mul(config.max_reps)
                .saturating_sub(in_progress_trials),
            resumed_from,
            workers: slots.len(),
            stray_checkpoints,
        })
    }
}
