//! Per-worker execution of combinations.
//!
//! A worker owns a stripe of combination indices (all of them for a single
//! runner) and a checkpoint key. It restores its checkpoint, then runs each
//! remaining combination trial by trial until the tracker stops it, writing
//! checkpoints as it goes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::checkpoint::{Checkpoint, CheckpointStore, JsonSerializer, PartialCombination};
use crate::convergence::ConvergenceStatus;
use crate::error::{SweepResult, TrialError};
use crate::params::{Combination, ParameterSpace};
use crate::results::{CombinationOutcome, TerminalReason};

use super::config::SweepConfig;
use super::trial::{Trial, TrialContext};

/// `(worker, workers)` partition of the index space.
pub(crate) type WorkerSlot = Option<(usize, usize)>;

/// State shared by every worker of a sweep.
pub(crate) struct SweepShared {
    pub(crate) sweep_id: String,
    pub(crate) parameters: ParameterSpace,
    pub(crate) config: SweepConfig,
    pub(crate) trial: Arc<dyn Trial>,
    pub(crate) store: Arc<dyn CheckpointStore>,
    pub(crate) cancel: CancellationToken,
}

impl SweepShared {
    /// Checkpoint key of a worker.
    pub(crate) fn checkpoint_key(&self, slot: WorkerSlot) -> String {
        match slot {
            None => self.sweep_id.clone(),
            Some((worker, _)) => format!("{}.worker-{}", self.sweep_id, worker),
        }
    }

    /// Worker slots for the configured parallelism.
    pub(crate) fn slots(&self) -> Vec<WorkerSlot> {
        match self.config.parallelism {
            0 | 1 => vec![None],
            n => (0..n).map(|k| Some((k, n))).collect(),
        }
    }

    /// Load and verify the checkpoint of `slot`, if one exists.
    pub(crate) async fn load_checkpoint(
        &self,
        slot: WorkerSlot,
    ) -> SweepResult<Option<Checkpoint>> {
        let key = self.checkpoint_key(slot);
        let Some(bytes) = self.store.load(&key).await? else {
            return Ok(None);
        };
        let checkpoint = Checkpoint::decode(&JsonSerializer, &bytes)?;
        checkpoint.verify(
            &self.sweep_id,
            &self.parameters,
            self.config.base_seed,
            slot,
            &self.config.stopping_terms(),
        )?;
        Ok(Some(checkpoint))
    }

    /// Keys of existing checkpoints that belong to another worker layout.
    ///
    /// A runner only reads the keys of its own layout, so these would be
    /// ignored. A single runner looks for worker 0 of any partition; `n`
    /// workers look for the single-runner key and for worker `n` of a wider
    /// partition. Narrower partitions collide with an owned key and are
    /// refused by [`verify`](Checkpoint::verify) instead.
    pub(crate) async fn stray_checkpoints(&self) -> SweepResult<Vec<String>> {
        let candidates = match self.config.parallelism {
            0 | 1 => vec![self.checkpoint_key(Some((0, 2)))],
            n => vec![self.sweep_id.clone(), self.checkpoint_key(Some((n, n + 1)))],
        };
        let mut found = Vec::new();
        for key in candidates {
            if self.store.load(&key).await?.is_some() {
                found.push(key);
            }
        }
        Ok(found)
    }

    /// Indices owned by `slot`, in order.
    pub(crate) fn owned_indexes(&self, slot: WorkerSlot) -> impl Iterator<Item = usize> {
        let count = self.parameters.combination_count();
        (0..count).filter(move |index| match slot {
            None => true,
            Some((worker, workers)) => index % workers == worker,
        })
    }
}

/// What one worker produced.
#[derive(Debug)]
pub(crate) struct WorkerOutcome {
    pub(crate) outcomes: Vec<CombinationOutcome>,
    pub(crate) trials_run: u64,
    pub(crate) trials_resumed: u64,
    pub(crate) cancelled: bool,
}

/// Decides when progress is persisted and writes it.
struct Checkpointer {
    store: Arc<dyn CheckpointStore>,
    key: String,
    every_trials: Option<u64>,
    interval: Option<Duration>,
    trials_since_write: u64,
    last_write: Instant,
}

impl Checkpointer {
    fn new(shared: &SweepShared, key: String) -> Self {
        Self {
            store: shared.store.clone(),
            key,
            every_trials: shared.config.checkpoint.every_trials,
            interval: shared.config.checkpoint.interval(),
            trials_since_write: 0,
            last_write: Instant::now(),
        }
    }

    fn record_trial(&mut self) {
        self.trials_since_write += 1;
    }

    fn due(&self) -> bool {
        self.every_trials
            .is_some_and(|n| self.trials_since_write >= n)
            || self
                .interval
                .is_some_and(|interval| self.last_write.elapsed() >= interval)
    }

    async fn write(&mut self, checkpoint: &Checkpoint) -> SweepResult<()> {
        let bytes = checkpoint.encode(&JsonSerializer)?;
        self.store.save(&self.key, bytes).await?;
        tracing::debug!(
            key = %self.key,
            completed = checkpoint.completed.len(),
            in_progress = ?checkpoint.in_progress.as_ref().map(|p| p.index),
            "checkpoint written"
        );
        self.trials_since_write = 0;
        self.last_write = Instant::now();
        Ok(())
    }

    /// Write `checkpoint` with `partial` as the combination in progress.
    async fn write_partial(
        &mut self,
        checkpoint: &mut Checkpoint,
        partial: &PartialCombination,
    ) -> SweepResult<()> {
        checkpoint.in_progress = Some(partial.clone());
        let written = self.write(checkpoint).await;
        checkpoint.in_progress = None;
        written
    }
}

/// How a combination run ended.
enum CombinationRun {
    Finished(CombinationOutcome),
    Cancelled(PartialCombination),
}

/// Run every remaining combination of `slot`.
pub(crate) async fn run_worker(
    shared: Arc<SweepShared>,
    slot: WorkerSlot,
    cancel: CancellationToken,
) -> SweepResult<WorkerOutcome> {
    let key = shared.checkpoint_key(slot);
    let mut checkpoint = match shared.load_checkpoint(slot).await? {
        Some(checkpoint) => {
            tracing::info!(
                key = %key,
                completed = checkpoint.completed.len(),
                resume_index = checkpoint.resume_index(),
                "resuming from checkpoint"
            );
            checkpoint
        }
        None => Checkpoint::new(
            shared.sweep_id.clone(),
            shared.parameters.clone(),
            shared.config.base_seed,
            slot,
            shared.config.stopping_terms(),
        ),
    };

    let trials_resumed = checkpoint.trials_done();
    let completed: BTreeSet<usize> = checkpoint.completed_indexes();
    let mut resumed = checkpoint.in_progress.take();
    let mut checkpointer = Checkpointer::new(&shared, key.clone());
    let mut trials_run = 0u64;
    let mut cancelled = false;

    for index in shared.owned_indexes(slot) {
        if completed.contains(&index) {
            continue;
        }
        if cancel.is_cancelled() {
            checkpoint.in_progress = resumed.take();
            cancelled = true;
            break;
        }
        let Some(combination) = shared.parameters.combination_at(index) else {
            break;
        };

        let partial = match resumed.take() {
            Some(partial) if partial.index == index => partial,
            other => {
                resumed = other;
                PartialCombination::new(index, shared.config.tracker()?)
            }
        };

        let run = run_combination(
            &shared,
            &combination,
            partial,
            &cancel,
            &mut checkpoint,
            &mut checkpointer,
            &mut trials_run,
        )
        .await?;

        match run {
            CombinationRun::Finished(outcome) => {
                checkpoint.completed.push(outcome);
                checkpointer.write(&checkpoint).await?;
            }
            CombinationRun::Cancelled(partial) => {
                checkpoint.in_progress = Some(partial);
                cancelled = true;
                break;
            }
        }
    }

    if cancelled {
        checkpointer.write(&checkpoint).await?;
        tracing::info!(key = %key, "worker cancelled, progress saved");
    } else if shared.config.checkpoint.remove_on_completion {
        shared.store.remove(&key).await?;
        tracing::debug!(key = %key, "checkpoint removed");
    }

    Ok(WorkerOutcome {
        outcomes: checkpoint.completed,
        trials_run,
        trials_resumed,
        cancelled,
    })
}

async fn run_combination(
    shared: &SweepShared,
    combination: &Combination,
    mut partial: PartialCombination,
    cancel: &CancellationToken,
    checkpoint: &mut Checkpoint,
    checkpointer: &mut Checkpointer,
    trials_run: &mut u64,
) -> SweepResult<CombinationRun> {
    tracing::info!(
        index = combination.index(),
        trials = partial.result_set.trial_count(),
        "combination {} started",
        combination
    );

    if let Err(e) = shared.trial.setup(combination).await {
        tracing::error!(index = combination.index(), error = %e, "trial setup failed");
        return Ok(CombinationRun::Finished(finish(
            combination,
            partial,
            TerminalReason::Failed {
                error: e.to_string(),
            },
        )));
    }

    while partial.convergence.should_continue() {
        if cancel.is_cancelled() {
            return Ok(CombinationRun::Cancelled(partial));
        }

        let ctx = TrialContext::new(
            combination,
            partial.result_set.trial_count(),
            partial.failed_attempts,
            shared.config.base_seed,
        );
        let started = Instant::now();
        // A batch that cannot be merged leaves the set untouched and counts
        // as a failed attempt.
        let attempt = match shared.trial.run(&ctx).await {
            Ok(batch) => partial.result_set.merge(&batch).map_err(TrialError::from),
            Err(e) => Err(e),
        };
        partial.elapsed += started.elapsed();

        match attempt {
            Ok(()) => {
                partial.failed_attempts = 0;
                partial.convergence.observe(&partial.result_set);
                *trials_run += 1;
                checkpointer.record_trial();
                if partial.convergence.should_continue() && checkpointer.due() {
                    checkpointer.write_partial(checkpoint, &partial).await?;
                }
            }
            Err(error) => {
                partial.failed_attempts += 1;
                if partial.failed_attempts > shared.config.max_trial_retries {
                    tracing::error!(
                        index = combination.index(),
                        trial = ctx.trial_index(),
                        attempts = partial.failed_attempts,
                        error = %error,
                        "trial failed after retries, giving up on combination"
                    );
                    return Ok(CombinationRun::Finished(finish(
                        combination,
                        partial,
                        TerminalReason::Failed {
                            error: error.to_string(),
                        },
                    )));
                }
                tracing::warn!(
                    index = combination.index(),
                    trial = ctx.trial_index(),
                    attempt = partial.failed_attempts,
                    error = %error,
                    "trial failed, retrying"
                );
            }
        }
    }

    let reason = match partial.convergence.status() {
        ConvergenceStatus::Converged => TerminalReason::Converged,
        ConvergenceStatus::Exhausted | ConvergenceStatus::Running => TerminalReason::Exhausted,
    };
    Ok(CombinationRun::Finished(finish(combination, partial, reason)))
}

fn finish(
    combination: &Combination,
    partial: PartialCombination,
    reason: TerminalReason,
) -> CombinationOutcome {
    let PartialCombination {
        mut result_set,
        elapsed,
        ..
    } = partial;
    result_set.seal();

    tracing::info!(
        index = combination.index(),
        trials = result_set.trial_count(),
        reason = reason.label(),
        elapsed = ?elapsed,
        "combination finished"
    );

    CombinationOutcome {
        combination: combination.clone(),
        result_set,
        reason,
        elapsed,
    }
}
