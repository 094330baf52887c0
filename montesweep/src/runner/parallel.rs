//! Fan-out of workers over disjoint index stripes.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::{SweepError, SweepResult};

use super::orchestrator::{run_worker, SweepShared, WorkerOutcome};

/// Run one worker per slot and collect their outcomes.
///
/// With a single slot the worker runs on the current task. Otherwise each
/// worker is spawned; the first error stops the others at their next trial
/// boundary (they still write their checkpoints) and is returned once all
/// have wound down.
pub(crate) async fn run_workers(shared: Arc<SweepShared>) -> SweepResult<Vec<WorkerOutcome>> {
    let slots = shared.slots();
    if let [slot] = slots.as_slice() {
        let cancel = shared.cancel.clone();
        return Ok(vec![run_worker(shared, *slot, cancel).await?]);
    }

    let stop = shared.cancel.child_token();
    let mut workers = JoinSet::new();
    for slot in slots {
        workers.spawn(run_worker(shared.clone(), slot, stop.clone()));
    }

    let mut outcomes = Vec::new();
    let mut first_error = None;
    while let Some(joined) = workers.join_next().await {
        let result = joined.map_err(|e| SweepError::Worker(e.to_string())).and_then(|r| r);
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!(error = %e, "worker failed, stopping the others");
                stop.cancel();
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}
