mod cli;
mod workload;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::LocalSet;
use tracing::{info, warn};

use coslice_core::{load_dotenv, SchedulerConfig};
use coslice_scheduler::{Scheduler, TokioHost};

use crate::cli::CliArgs;
use crate::workload::{Workload, WorkloadSpec};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let config = SchedulerConfig::from_env();
    config.log_summary();

    // The scheduler is single-threaded: one current-thread runtime, one LocalSet.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let local = LocalSet::new();
    let output = local.block_on(&runtime, run(args, config))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(args: CliArgs, config: SchedulerConfig) -> Result<serde_json::Value> {
    let scheduler = Scheduler::with_config(TokioHost::new(), config)
        .context("invalid scheduler configuration")?;
    if let Some(fps) = args.frame_rate {
        scheduler.force_frame_rate(fps);
    }

    let spec = WorkloadSpec {
        tasks: args.tasks,
        steps: args.steps,
        work: Duration::from_millis(args.work_ms),
        delay: Duration::from_millis(args.delay_ms),
    };
    info!(
        "Running {} tasks x {} steps (slice: {:?})",
        spec.tasks,
        spec.steps,
        scheduler.yield_interval()
    );

    let started = scheduler.now();
    let workload = Workload::submit(&scheduler, &spec);

    let drained = tokio::time::timeout(Duration::from_secs(args.timeout_secs), async {
        while scheduler.has_pending_work() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!("Queue did not drain within {}s", args.timeout_secs);
    }

    let report = workload.report();
    info!(
        "Completed {}/{} tasks in {}ms ({} failed turns)",
        report.completed,
        report.submitted,
        scheduler.now() - started,
        scheduler.host().failed_turns()
    );

    Ok(serde_json::json!({
        "workload": report,
        "metrics": scheduler.metrics(),
    }))
}
