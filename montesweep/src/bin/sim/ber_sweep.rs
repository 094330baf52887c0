//! Binary target for a BPSK bit error rate sweep.
//!
//! Sweeps Eb/N0 and estimates the bit error rate of BPSK over AWGN, stopping
//! each point once enough errors were seen. Progress is checkpointed so an
//! interrupted run (Ctrl-C) resumes where it left off.
//!
//! ```bash
//! # Built-in sweep, checkpoints in ./checkpoints
//! cargo run --bin sim-ber-sweep
//!
//! # Sweep file, four workers
//! cargo run --bin sim-ber-sweep -- --config ber.toml --parallelism 4
//!
//! # Show what would run
//! cargo run --bin sim-ber-sweep -- --dry-run
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use montesweep::simulations::ber::{self, BpskTrial};
use montesweep::{FileCheckpointStore, SweepBuilder, SweepFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "sim-ber-sweep")]
#[command(about = "BPSK bit error rate Monte Carlo sweep")]
struct Args {
    /// TOML sweep definition; the built-in sweep is used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for checkpoint files
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,

    /// Number of concurrent workers (overrides the sweep file)
    #[arg(long)]
    parallelism: Option<usize>,

    /// Base seed (overrides the sweep file)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the plan and exit without running trials
    #[arg(long)]
    dry_run: bool,

    /// Write the final results as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let mut builder = match &args.config {
        Some(path) => SweepBuilder::from_file(&SweepFile::load(path)?)?,
        None => SweepBuilder::new("ber")
            .parameters(ber::default_space()?)
            .config(ber::default_config()),
    };
    if let Some(parallelism) = args.parallelism {
        builder = builder.parallelism(parallelism);
    }
    if let Some(seed) = args.seed {
        builder = builder.base_seed(seed);
    }

    let store = FileCheckpointStore::open(&args.checkpoint_dir).await?;
    let runner = builder.checkpoint_store(store).trial(BpskTrial).build()?;

    if args.dry_run {
        let plan = runner.plan().await?;
        eprintln!("{plan}");
        return Ok(());
    }

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping at the next trial boundary");
            cancel.cancel();
        }
    });

    let report = runner.run().await?;
    eprintln!("{report}");

    for (index, mean) in report.results.means_of(ber::BER) {
        if let Some(outcome) = report.results.get(index) {
            let ci = outcome.result_set.confidence_interval(ber::TRIAL_BER, 0.95);
            match (mean, ci) {
                (Some(ber), Some(ci)) => println!(
                    "{}  BER = {:.3e}  (95% CI of per-trial BER: {:.3e}..{:.3e}, {} trials)",
                    outcome.combination,
                    ber,
                    ci.lower(),
                    ci.upper(),
                    outcome.trial_count()
                ),
                (Some(ber), None) => println!("{}  BER = {:.3e}", outcome.combination, ber),
                (None, _) => println!("{}  no bits sent", outcome.combination),
            }
        }
    }

    if let Some(path) = &args.output {
        report.results.save(path).await?;
        tracing::info!(path = %path.display(), "results written");
    }

    if report.counts.failed > 0 {
        process::exit(1);
    }
    Ok(())
}
