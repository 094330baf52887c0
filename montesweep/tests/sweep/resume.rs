//! Interrupting and resuming sweeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use montesweep::{
    trial_fn, Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore,
    InMemoryCheckpointStore, JsonSerializer, ParameterSpace, ResumeMismatch, SimulationRunner,
    StoppingRule, SweepBuilder, SweepError, SweepReport, Trial, TrialResult, CHECKPOINT_VERSION,
};
use tokio_util::sync::CancellationToken;

use super::support::{
    assert_same_outcomes, cancel_after, noisy_trial, probability_space, RecordingStore,
};

fn noisy_sweep(id: &str) -> SweepBuilder {
    SweepBuilder::new(id)
        .parameters(probability_space())
        .min_reps(5)
        .max_reps(15)
        .stopping_rule(StoppingRule::at_least("hits", 30.0))
        .base_seed(42)
}

async fn baseline(id: &str) -> SweepReport {
    noisy_sweep(id)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_resume_from_every_checkpoint_matches_uninterrupted_run() {
    let recording = Arc::new(RecordingStore::default());
    let expected = noisy_sweep("replay")
        .checkpoint_every_trials(Some(1))
        .checkpoint_every(None)
        .shared_checkpoint_store(recording.clone())
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(expected.is_complete());
    assert_same_outcomes(&expected.results, &baseline("replay").await.results);

    let writes = recording.writes();
    // One write per trial, at the trial or at the combination boundary.
    assert_eq!(writes.len() as u64, expected.trials_run);
    for (position, (key, bytes)) in writes.into_iter().enumerate() {
        assert_eq!(key, "replay");
        let store = InMemoryCheckpointStore::new();
        store.save(&key, bytes).await.unwrap();

        let resumed = noisy_sweep("replay")
            .checkpoint_store(store)
            .trial(noisy_trial())
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(resumed.is_complete(), "resume from write {position}");
        assert_same_outcomes(&resumed.results, &expected.results);
        assert_eq!(
            resumed.trials_resumed + resumed.trials_run,
            expected.trials_run,
            "trial accounting after write {position}"
        );
    }
}

#[tokio::test]
async fn test_cancel_then_resume_matches_uninterrupted_run() {
    let expected = baseline("cancel").await;
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());

    let token = CancellationToken::new();
    let interrupted = noisy_sweep("cancel")
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(noisy_trial(), token, 12))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(interrupted.cancelled);
    assert!(!interrupted.is_complete());
    assert_eq!(interrupted.trials_run, 12);
    assert!(store.load("cancel").await.unwrap().is_some());

    let resumed = noisy_sweep("cancel")
        .shared_checkpoint_store(store)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(resumed.is_complete());
    assert_eq!(resumed.trials_resumed, 12);
    assert_eq!(resumed.trials_run + 12, expected.trials_run);
    assert_same_outcomes(&resumed.results, &expected.results);
}

#[tokio::test]
async fn test_pre_cancelled_run_keeps_checkpoint_intact() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let token = CancellationToken::new();
    noisy_sweep("twice")
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(noisy_trial(), token, 7))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    let saved = store.load("twice").await.unwrap().unwrap();

    // Cancelled before the first trial: nothing runs and nothing is lost.
    let token = CancellationToken::new();
    token.cancel();
    let report = noisy_sweep("twice")
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.trials_run, 0);
    assert_eq!(report.trials_resumed, 7);
    let rewritten = store.load("twice").await.unwrap().unwrap();
    assert_eq!(
        Checkpoint::decode(&JsonSerializer, &rewritten).unwrap(),
        Checkpoint::decode(&JsonSerializer, &saved).unwrap()
    );
}

#[tokio::test]
async fn test_file_store_resume_and_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let expected = baseline("on-disk").await;

    let store = FileCheckpointStore::open(dir.path()).await.unwrap();
    let path = store.path_for("on-disk").unwrap();
    let token = CancellationToken::new();
    let interrupted = noisy_sweep("on-disk")
        .checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .remove_checkpoint_on_completion(true)
        .trial(cancel_after(noisy_trial(), token, 20))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(interrupted.cancelled);
    assert!(path.exists());

    let resumed = noisy_sweep("on-disk")
        .checkpoint_store(FileCheckpointStore::open(dir.path()).await.unwrap())
        .remove_checkpoint_on_completion(true)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(resumed.is_complete());
    assert_same_outcomes(&resumed.results, &expected.results);
    assert!(!path.exists());
}

async fn interrupted_store(id: &str) -> Arc<dyn CheckpointStore> {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let token = CancellationToken::new();
    noisy_sweep(id)
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(noisy_trial(), token, 3))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    store
}

fn expect_mismatch(result: Result<SweepReport, SweepError>) -> ResumeMismatch {
    match result {
        Err(SweepError::ResumeMismatch(mismatch)) => mismatch,
        other => panic!("expected a resume mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resume_with_other_seed_is_refused() {
    let store = interrupted_store("seeded").await;
    let runner: SimulationRunner = noisy_sweep("seeded")
        .base_seed(7)
        .shared_checkpoint_store(store.clone())
        .trial(noisy_trial())
        .build()
        .unwrap();

    let mismatch = expect_mismatch(runner.run().await);
    assert_eq!(
        mismatch,
        ResumeMismatch::Seed {
            expected: 7,
            found: 42
        }
    );
    assert!(matches!(
        runner.plan().await,
        Err(SweepError::ResumeMismatch(ResumeMismatch::Seed { .. }))
    ));
}

#[tokio::test]
async fn test_resume_with_other_parameters_is_refused() {
    let store = interrupted_store("params").await;
    let space = ParameterSpace::new()
        .with_unpacked("p", [0.1, 0.3, 0.9])
        .unwrap()
        .with_fixed("label", "noisy")
        .unwrap();
    let result = noisy_sweep("params")
        .parameters(space)
        .shared_checkpoint_store(store)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await;
    assert!(matches!(
        expect_mismatch(result),
        ResumeMismatch::Parameters(_)
    ));
}

#[tokio::test]
async fn test_resume_with_other_stopping_settings_is_refused() {
    let store = interrupted_store("budget").await;
    let saved = store.load("budget").await.unwrap().unwrap();

    let result = noisy_sweep("budget")
        .max_reps(5)
        .shared_checkpoint_store(store.clone())
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await;
    match expect_mismatch(result) {
        ResumeMismatch::Config(msg) => assert!(msg.contains("max_reps"), "{msg}"),
        other => panic!("expected a config mismatch, got {other:?}"),
    }

    let result = noisy_sweep("budget")
        .stopping_rule(StoppingRule::at_least("hits", 10.0))
        .shared_checkpoint_store(store.clone())
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await;
    assert!(matches!(
        expect_mismatch(result),
        ResumeMismatch::Config(_)
    ));

    // Refused resumes leave the checkpoint untouched.
    assert_eq!(store.load("budget").await.unwrap().unwrap(), saved);
}

#[tokio::test]
async fn test_checkpoint_of_another_sweep_is_refused() {
    let store = interrupted_store("first").await;
    let bytes = store.load("first").await.unwrap().unwrap();
    store.save("second", bytes).await.unwrap();

    let result = noisy_sweep("second")
        .shared_checkpoint_store(store)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await;
    assert_eq!(
        expect_mismatch(result),
        ResumeMismatch::SweepId {
            expected: "second".to_string(),
            found: "first".to_string(),
        }
    );
}

#[tokio::test]
async fn test_unknown_checkpoint_version_is_rejected() {
    let store = InMemoryCheckpointStore::new();
    store
        .save("future", br#"{"version": 99}"#.to_vec())
        .await
        .unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let result = noisy_sweep("future")
        .checkpoint_store(store)
        .trial(trial_fn("counted", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![TrialResult::sum("hits", 1.0)])
        }))
        .build()
        .unwrap()
        .run()
        .await;

    assert!(matches!(
        result,
        Err(SweepError::Checkpoint(CheckpointError::UnsupportedVersion {
            found: 99,
            expected: CHECKPOINT_VERSION
        }))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Emits NaN on the first attempt of trial 1, finite values otherwise.
fn nan_once() -> impl Trial {
    trial_fn("nan-once", |ctx| {
        let value = if ctx.trial_index() == 1 && ctx.attempt() == 0 {
            f64::NAN
        } else {
            0.5
        };
        Ok(vec![
            TrialResult::unmerged("x", value),
            TrialResult::sum("hits", 1.0),
        ])
    })
}

#[tokio::test]
async fn test_non_finite_result_never_reaches_checkpoint() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let token = CancellationToken::new();
    let interrupted = noisy_sweep("finite")
        .checkpoint_every_trials(Some(1))
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(nan_once(), token, 3))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(interrupted.cancelled);
    // Trial 0, the rejected NaN attempt of trial 1, then its retry.
    assert_eq!(interrupted.trials_run, 2);

    let resumed = noisy_sweep("finite")
        .shared_checkpoint_store(store)
        .trial(nan_once())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(resumed.is_complete());
    assert_eq!(resumed.trials_resumed, 2);
    assert_eq!(resumed.counts.failed, 0);
    for outcome in resumed.results.outcomes() {
        let values = outcome.result_set.value_of("x").and_then(|v| v.as_unmerged());
        assert!(values.unwrap().iter().all(|v| v.is_finite()));
    }
}

/// Single combination of exactly four trials, each taking 20ms.
fn slow_sweep(id: &str, interval: Option<Duration>) -> SweepBuilder {
    SweepBuilder::new(id)
        .parameters(ParameterSpace::new().with_fixed("p", 0.5).unwrap())
        .min_reps(4)
        .max_reps(4)
        .checkpoint_every_trials(None)
        .checkpoint_every(interval)
        .trial(trial_fn("slow", |_| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(vec![TrialResult::sum("hits", 1.0)])
        }))
}

#[tokio::test]
async fn test_wall_time_trigger_writes_mid_combination() {
    let recording = Arc::new(RecordingStore::default());
    let report = slow_sweep("timed", Some(Duration::from_millis(5)))
        .shared_checkpoint_store(recording.clone())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(report.is_complete());

    let checkpoints: Vec<Checkpoint> = recording
        .writes()
        .iter()
        .map(|(_, bytes)| Checkpoint::decode(&JsonSerializer, bytes).unwrap())
        .collect();
    // Trials 1 to 3 each outlast the interval; trial 4 ends the combination.
    assert_eq!(checkpoints.len(), 4);
    for (position, checkpoint) in checkpoints[..3].iter().enumerate() {
        let partial = checkpoint.in_progress.as_ref().unwrap();
        assert_eq!(partial.result_set.trial_count(), position as u64 + 1);
        assert!(checkpoint.completed.is_empty());
    }
    assert!(checkpoints[3].in_progress.is_none());
    assert_eq!(checkpoints[3].completed.len(), 1);

    // Without the time trigger only the combination boundary writes.
    let quiet = Arc::new(RecordingStore::default());
    slow_sweep("untimed", None)
        .shared_checkpoint_store(quiet.clone())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(quiet.writes().len(), 1);
}
