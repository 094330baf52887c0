//! Stopping behaviour, ordering and dry runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use montesweep::simulations::ber::{self, BpskTrial};
use montesweep::{
    ParamValue, ParameterSpace, ResultKind, StoppingRule, SweepBuilder, TerminalReason,
};

use super::support::{block_size_space, constant_errors, noisy_trial, probability_space};

#[tokio::test]
async fn test_min_reps_floor_before_target() {
    let calls = Arc::new(AtomicU64::new(0));
    let report = SweepBuilder::new("floor")
        .parameters(block_size_space())
        .min_reps(100)
        .max_reps(1000)
        .stopping_rule(StoppingRule::at_least("errors", 50.0))
        .trial(constant_errors(1.0, calls.clone()))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.results.len(), 3);
    for outcome in report.results.outcomes() {
        assert_eq!(outcome.reason, TerminalReason::Converged);
        assert_eq!(outcome.trial_count(), 100);
        assert_eq!(
            outcome.result_set.value_of("errors").and_then(|v| v.as_sum()),
            Some(100.0)
        );
        assert!(outcome.result_set.is_sealed());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 300);
    assert_eq!(report.counts.converged, 3);
}

#[tokio::test]
async fn test_converges_at_target_above_min_reps() {
    let report = SweepBuilder::new("target")
        .parameters(block_size_space())
        .min_reps(50)
        .max_reps(1000)
        .stopping_rule(StoppingRule::at_least("errors", 50.0))
        .trial(constant_errors(1.0, Arc::default()))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    for outcome in report.results.outcomes() {
        assert_eq!(outcome.reason, TerminalReason::Converged);
        assert_eq!(outcome.trial_count(), 50);
        assert_eq!(
            outcome.result_set.value_of("errors").and_then(|v| v.as_sum()),
            Some(50.0)
        );
    }
}

#[tokio::test]
async fn test_exhausts_at_exactly_max_reps() {
    let report = SweepBuilder::new("exhaust")
        .parameters(block_size_space())
        .min_reps(100)
        .max_reps(1000)
        .stopping_rule(StoppingRule::at_least("errors", 50.0))
        .trial(constant_errors(0.0, Arc::default()))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.counts.exhausted, 3);
    for outcome in report.results.outcomes() {
        assert_eq!(outcome.reason, TerminalReason::Exhausted);
        assert_eq!(outcome.trial_count(), 1000);
    }
    assert_eq!(report.trials_run, 3000);
    assert_eq!(report.total_trials(), 3000);
}

#[tokio::test]
async fn test_outcomes_follow_declaration_order() {
    let space = ParameterSpace::new()
        .with_unpacked("a", [1_i64, 2])
        .unwrap()
        .with_fixed("f", true)
        .unwrap()
        .with_unpacked("b", ["x", "y", "z"])
        .unwrap();
    assert_eq!(space.combination_count(), 6);

    let report = SweepBuilder::new("order")
        .parameters(space)
        .max_reps(1)
        .trial(constant_errors(1.0, Arc::default()))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    let assignments: Vec<(i64, String)> = report
        .results
        .outcomes()
        .iter()
        .map(|o| {
            (
                o.combination.get_i64("a").unwrap(),
                o.combination.get("b").unwrap().to_string(),
            )
        })
        .collect();
    let expected: Vec<(i64, String)> = [(1, "x"), (1, "y"), (1, "z"), (2, "x"), (2, "y"), (2, "z")]
        .into_iter()
        .map(|(a, b)| (a, b.to_string()))
        .collect();
    assert_eq!(assignments, expected);
    assert!(report
        .results
        .outcomes()
        .iter()
        .all(|o| o.combination.get("f") == Some(&ParamValue::Bool(true))));
}

#[tokio::test]
async fn test_space_without_unpacked_parameters_runs_once() {
    let space = ParameterSpace::new().with_fixed("n", 3_i64).unwrap();
    let report = SweepBuilder::new("single")
        .parameters(space)
        .max_reps(4)
        .trial(constant_errors(2.0, Arc::default()))
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.combination_count, 1);
    assert_eq!(report.results.len(), 1);
    let outcome = &report.results.outcomes()[0];
    assert_eq!(outcome.trial_count(), 4);
    assert_eq!(outcome.result_set.mean("errors"), Some(2.0));
}

#[tokio::test]
async fn test_dry_run_plans_without_trials() {
    let calls = Arc::new(AtomicU64::new(0));
    let runner = SweepBuilder::new("plan")
        .parameters(block_size_space())
        .min_reps(100)
        .max_reps(1000)
        .trial(constant_errors(1.0, calls.clone()))
        .build()
        .unwrap();

    let plan = runner.plan().await.unwrap();
    assert_eq!(plan.combination_count, 3);
    assert_eq!(plan.remaining, 3);
    assert_eq!(plan.completed, 0);
    assert_eq!(plan.min_trials, 300);
    assert_eq!(plan.max_trials, 3000);
    assert_eq!(plan.resumed_from, None);
    assert!(plan.stray_checkpoints.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(plan.to_string().contains("=== Sweep Plan ==="));
}

#[tokio::test]
async fn test_result_kinds_aggregate_across_trials() {
    let report = SweepBuilder::new("kinds")
        .parameters(probability_space())
        .max_reps(25)
        .base_seed(3)
        .trial(noisy_trial())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    for outcome in report.results.outcomes() {
        let set = &outcome.result_set;
        assert_eq!(set.kind_of("hits"), Some(ResultKind::Sum));
        assert_eq!(set.kind_of("rate"), Some(ResultKind::Ratio));
        assert_eq!(set.kind_of("draw"), Some(ResultKind::Unmerged));

        let hits = set.value_of("hits").and_then(|v| v.as_sum()).unwrap();
        let rate = set.value_of("rate").and_then(|v| v.as_ratio()).unwrap();
        assert_eq!(rate.numerator, hits);
        assert_eq!(rate.denominator, 25.0 * 20.0);
        assert_eq!(set.value_of("draw").and_then(|v| v.as_unmerged()).unwrap().len(), 25);
    }

    // More hits for higher probabilities.
    let means: Vec<f64> = report
        .results
        .means_of("rate")
        .into_iter()
        .map(|(_, m)| m.unwrap())
        .collect();
    assert!(means[0] < means[1] && means[1] < means[2], "{means:?}");
}

#[tokio::test]
async fn test_ber_sweep_end_to_end() {
    let space = ParameterSpace::new()
        .with_unpacked("snr_db", [0.0, 4.0])
        .unwrap()
        .with_fixed("num_bits", 500_i64)
        .unwrap();
    let report = SweepBuilder::new("ber")
        .parameters(space)
        .min_reps(2)
        .max_reps(200)
        .stopping_rule(StoppingRule::at_least(ber::BIT_ERRORS, 100.0))
        .trial(BpskTrial)
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.counts.failed, 0);
    let low = report.results.get(0).unwrap();
    let high = report.results.get(1).unwrap();
    // About 39 errors per trial at 0 dB, 6 at 4 dB.
    assert_eq!(low.reason, TerminalReason::Converged);
    assert!(low.trial_count() < high.trial_count());

    let ber_low = low.result_set.mean(ber::BER).unwrap();
    let ber_high = high.result_set.mean(ber::BER).unwrap();
    assert!(ber_low > ber_high);
    assert!((0.05..0.11).contains(&ber_low), "ber at 0 dB = {ber_low}");
    assert!(report.to_string().contains("=== Sweep Report ==="));
}
