//! Sweep reports and dry-run plans.

use std::fmt;
use std::time::Duration;

use crate::results::{OutcomeCounts, SimulationResults, TerminalReason};

/// Summary of a finished (or cancelled) sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Sweep identifier
    pub sweep_id: String,
    /// Outcomes of every finished combination, in index order
    pub results: SimulationResults,
    /// Number of combinations in the parameter space
    pub combination_count: usize,
    /// Outcome totals
    pub counts: OutcomeCounts,
    /// Trials executed by this run
    pub trials_run: u64,
    /// Trials restored from checkpoints
    pub trials_resumed: u64,
    /// Wall-clock time of this run
    pub wall_time: Duration,
    /// Whether the sweep stopped on cancellation
    pub cancelled: bool,
    /// Number of workers
    pub workers: usize,
}

impl SweepReport {
    /// Whether every combination finished.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.results.len() == self.combination_count
    }

    /// Trials merged across all outcomes, including restored ones.
    pub fn total_trials(&self) -> u64 {
        self.results.total_trials()
    }

    /// Share of finished combinations that did not fail, as a percentage.
    pub fn success_rate(&self) -> f64 {
        let finished = self.results.len();
        if finished == 0 {
            0.0
        } else {
            ((finished - self.counts.failed) as f64 / finished as f64) * 100.0
        }
    }

    /// Average wall time per trial executed by this run.
    pub fn average_trial_time(&self) -> Duration {
        match u32::try_from(self.trials_run) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.wall_time / n,
        }
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sweep Report ===")?;
        writeln!(f, "Sweep: {}", self.sweep_id)?;
        writeln!(
            f,
            "Combinations: {}/{}",
            self.results.len(),
            self.combination_count
        )?;
        writeln!(f, "Converged: {}", self.counts.converged)?;
        writeln!(f, "Exhausted: {}", self.counts.exhausted)?;
        writeln!(f, "Failed: {}", self.counts.failed)?;
        writeln!(f, "Success Rate: {:.2}%", self.success_rate())?;
        writeln!(f)?;
        writeln!(
            f,
            "Trials: {} run, {} resumed",
            self.trials_run, self.trials_resumed
        )?;
        writeln!(f, "Workers: {}", self.workers)?;
        writeln!(f, "Wall Time: {:?}", self.wall_time)?;
        writeln!(f, "Average Trial Time: {:?}", self.average_trial_time())?;

        let failures: Vec<_> = self
            .results
            .outcomes()
            .iter()
            .filter(|o| o.reason.is_failed())
            .collect();
        if !failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Failed Combinations ===")?;
            for outcome in failures {
                if let TerminalReason::Failed { error } = &outcome.reason {
                    writeln!(f, "  - {}: {}", outcome.combination, error)?;
                }
            }
        }

        if self.cancelled {
            writeln!(f)?;
            writeln!(f, "Cancelled: progress saved to checkpoint")?;
        }

        writeln!(f)?;

        Ok(())
    }
}

/// What a sweep would do, computed without running any trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    /// Sweep identifier
    pub sweep_id: String,
    /// Number of combinations in the parameter space
    pub combination_count: usize,
    /// Combinations already finished according to checkpoints
    pub completed: usize,
    /// Combinations still to run
    pub remaining: usize,
    /// Trials already recorded in checkpoints
    pub trials_done: u64,
    /// Fewest trials needed to finish
    pub min_trials: u64,
    /// Most trials needed to finish
    pub max_trials: u64,
    /// Lowest index a worker continues from, if any checkpoint exists
    pub resumed_from: Option<usize>,
    /// Number of workers
    pub workers: usize,
    /// Checkpoints of another worker layout that a run would ignore
    pub stray_checkpoints: Vec<String>,
}

impl fmt::Display for SweepPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sweep Plan ===")?;
        writeln!(f, "Sweep: {}", self.sweep_id)?;
        writeln!(f, "Combinations: {}", self.combination_count)?;
        writeln!(f, "Completed: {}", self.completed)?;
        writeln!(f, "Remaining: {}", self.remaining)?;
        match self.resumed_from {
            Some(index) => writeln!(f, "Resume from: #{}", index)?,
            None => writeln!(f, "Resume from: (fresh start)")?,
        }
        writeln!(
            f,
            "Trials: {} done, {}..={} to go",
            self.trials_done, self.min_trials, self.max_trials
        )?;
        writeln!(f, "Workers: {}", self.workers)?;
        for key in &self.stray_checkpoints {
            writeln!(f, "Ignored checkpoint: {} (other worker layout)", key)?;
        }
        Ok(())
    }
}
