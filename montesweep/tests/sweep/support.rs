//! Shared fixtures for sweep tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use montesweep::{
    trial_fn, CheckpointError, CheckpointStore, InMemoryCheckpointStore, ParameterSpace,
    SimulationResults, Trial, TrialContext, TrialError, TrialResult,
};
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Store that keeps every write it receives.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryCheckpointStore,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for RecordingStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, data: Vec<u8>) -> Result<(), CheckpointError> {
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), data.clone()));
        self.inner.save(key, data).await
    }

    async fn remove(&self, key: &str) -> Result<(), CheckpointError> {
        self.inner.remove(key).await
    }
}

/// Store whose writes always fail.
pub struct FailingStore;

#[async_trait]
impl CheckpointStore for FailingStore {
    async fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        Ok(None)
    }

    async fn save(&self, _key: &str, _data: Vec<u8>) -> Result<(), CheckpointError> {
        Err(CheckpointError::Io(std::io::Error::other("disk full")))
    }

    async fn remove(&self, _key: &str) -> Result<(), CheckpointError> {
        Ok(())
    }
}

/// `SNR` fixed at 10, `blockSize` swept over 4, 8 and 16.
pub fn block_size_space() -> ParameterSpace {
    ParameterSpace::new()
        .with_fixed("SNR", 10_i64)
        .unwrap()
        .with_unpacked("blockSize", [4_i64, 8, 16])
        .unwrap()
}

/// Trial emitting a constant number of errors and counting its calls.
pub fn constant_errors(errors: f64, calls: Arc<AtomicU64>) -> impl Trial {
    trial_fn("constant-errors", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![TrialResult::sum("errors", errors)])
    })
}

/// Trial whose output depends only on its random stream.
///
/// Emits a SUM `hits`, a RATIO `rate` and an UNMERGED `draw`, so replays
/// exercise every kind.
pub fn noisy_trial() -> impl Trial {
    trial_fn("noisy", |ctx| {
        let p = ctx.combination().get_f64("p").unwrap_or(0.5);
        let mut rng = ctx.rng();
        let n = 20;
        let hits = (0..n).filter(|_| rng.random_bool(p)).count() as f64;
        Ok(vec![
            TrialResult::sum("hits", hits),
            TrialResult::ratio("rate", hits, n as f64),
            TrialResult::unmerged("draw", rng.random::<f64>()),
        ])
    })
}

/// Wraps a trial and cancels a token once it has completed `after` calls.
pub struct CancelAfter<T> {
    inner: T,
    token: CancellationToken,
    after: u64,
    calls: AtomicU64,
}

pub fn cancel_after<T: Trial>(inner: T, token: CancellationToken, after: u64) -> CancelAfter<T> {
    CancelAfter {
        inner,
        token,
        after,
        calls: AtomicU64::new(0),
    }
}

#[async_trait]
impl<T: Trial> Trial for CancelAfter<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, ctx: &TrialContext<'_>) -> Result<Vec<TrialResult>, TrialError> {
        let results = self.inner.run(ctx).await;
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        results
    }
}

/// Three combinations with hit probabilities 0.1, 0.3 and 0.6.
pub fn probability_space() -> ParameterSpace {
    ParameterSpace::new()
        .with_unpacked("p", [0.1, 0.3, 0.6])
        .unwrap()
        .with_fixed("label", "noisy")
        .unwrap()
}

/// Assert that two result collections hold the same outcomes, ignoring
/// wall-clock time.
pub fn assert_same_outcomes(actual: &SimulationResults, expected: &SimulationResults) {
    assert_eq!(actual.len(), expected.len(), "number of outcomes");
    for (a, e) in actual.outcomes().iter().zip(expected.outcomes()) {
        assert_eq!(a.combination, e.combination);
        assert_eq!(a.reason, e.reason, "reason of {}", e.combination);
        assert_eq!(a.result_set, e.result_set, "results of {}", e.combination);
    }
}
