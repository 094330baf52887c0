//! Sweeps split across parallel workers.

use std::collections::BTreeSet;
use std::sync::Arc;

use montesweep::{
    CheckpointStore, InMemoryCheckpointStore, ParameterSpace, ResumeMismatch, StoppingRule,
    SweepBuilder, SweepError, SweepReport,
};
use tokio_util::sync::CancellationToken;

use super::support::{assert_same_outcomes, cancel_after, noisy_trial, RecordingStore};

fn wide_space() -> ParameterSpace {
    ParameterSpace::new()
        .with_unpacked("p", [0.05, 0.1, 0.2, 0.3, 0.5, 0.7, 0.9])
        .unwrap()
}

fn wide_sweep(id: &str, parallelism: usize) -> SweepBuilder {
    SweepBuilder::new(id)
        .parameters(wide_space())
        .min_reps(3)
        .max_reps(12)
        .stopping_rule(StoppingRule::at_least("hits", 40.0))
        .base_seed(9)
        .parallelism(parallelism)
}

async fn sequential(id: &str) -> SweepReport {
    wide_sweep(id, 1)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn test_parallel_sweep_matches_sequential() {
    let expected = sequential("wide").await;
    for workers in [2, 3, 7, 10] {
        let report = wide_sweep("wide", workers)
            .trial(noisy_trial())
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(report.is_complete(), "{workers} workers");
        assert_eq!(report.workers, workers);
        assert_eq!(report.trials_run, expected.trials_run);
        assert_same_outcomes(&report.results, &expected.results);
    }
}

#[tokio::test]
async fn test_each_worker_writes_its_own_checkpoint() {
    let recording = Arc::new(RecordingStore::default());
    wide_sweep("striped", 3)
        .shared_checkpoint_store(recording.clone())
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    let keys: BTreeSet<String> = recording.writes().into_iter().map(|(key, _)| key).collect();
    let expected: BTreeSet<String> = (0..3).map(|k| format!("striped.worker-{k}")).collect();
    assert_eq!(keys, expected);
    assert!(recording.load("striped").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parallel_cancel_then_resume() {
    let expected = sequential("resume-wide").await;
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());

    let token = CancellationToken::new();
    let interrupted = wide_sweep("resume-wide", 2)
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(noisy_trial(), token, 15))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(interrupted.cancelled);
    assert!(interrupted.results.len() < 7);

    let plan = wide_sweep("resume-wide", 2)
        .shared_checkpoint_store(store.clone())
        .trial(noisy_trial())
        .build()
        .unwrap()
        .plan()
        .await
        .unwrap();
    assert_eq!(plan.completed, interrupted.results.len());
    assert_eq!(plan.trials_done, interrupted.trials_run);

    let resumed = wide_sweep("resume-wide", 2)
        .shared_checkpoint_store(store)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(resumed.is_complete());
    assert_eq!(resumed.trials_resumed, interrupted.trials_run);
    assert_eq!(resumed.trials_resumed + resumed.trials_run, expected.trials_run);
    assert_same_outcomes(&resumed.results, &expected.results);
}

#[tokio::test]
async fn test_changing_parallelism_refuses_resume() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let token = CancellationToken::new();
    wide_sweep("regrid", 2)
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(noisy_trial(), token, 4))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    let result = wide_sweep("regrid", 3)
        .shared_checkpoint_store(store)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await;
    match result {
        Err(SweepError::ResumeMismatch(ResumeMismatch::Worker { expected, found })) => {
            assert_eq!(expected.map(|(_, n)| n), Some(3));
            assert_eq!(found.map(|(_, n)| n), Some(2));
        }
        other => panic!("expected a worker mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_checkpoints_of_other_layout_are_reported() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let token = CancellationToken::new();
    wide_sweep("layout", 1)
        .shared_checkpoint_store(store.clone())
        .cancellation_token(token.clone())
        .trial(cancel_after(noisy_trial(), token, 4))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    // Workers never read the single-runner key, so it is listed as ignored.
    let parallel = wide_sweep("layout", 2)
        .shared_checkpoint_store(store.clone())
        .trial(noisy_trial())
        .build()
        .unwrap();
    let plan = parallel.plan().await.unwrap();
    assert_eq!(plan.stray_checkpoints, vec!["layout".to_string()]);
    assert_eq!(plan.resumed_from, None);
    assert!(plan.to_string().contains("Ignored checkpoint: layout"));

    let report = parallel.run().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.trials_resumed, 0);

    // Now both layouts exist; each sees the other's checkpoints.
    let plan = wide_sweep("layout", 1)
        .shared_checkpoint_store(store.clone())
        .trial(noisy_trial())
        .build()
        .unwrap()
        .plan()
        .await
        .unwrap();
    assert_eq!(plan.stray_checkpoints, vec!["layout.worker-0".to_string()]);
    assert_eq!(plan.resumed_from, Some(0));

    // Narrowing four workers to two leaves workers 2 and 3 unread.
    store.save("wide.worker-2", b"{}".to_vec()).await.unwrap();
    let plan = wide_sweep("wide", 2)
        .shared_checkpoint_store(store)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .plan()
        .await
        .unwrap();
    assert_eq!(plan.stray_checkpoints, vec!["wide.worker-2".to_string()]);
}
