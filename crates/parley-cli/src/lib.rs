//! `parley-replay`: replays a turn fixture through a telemetry-instrumented
//! turn against the dry-run transport and prints a JSON report.

mod bootstrap;
mod cli_args;
pub mod fixture;
pub mod replay;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parley_core::{write_text_atomic, LogRotationPolicy};
use parley_telemetry::{BufferedTelemetrySink, JsonlTelemetrySink, TelemetrySink};

pub use bootstrap::init_tracing;
pub use cli_args::Cli;
pub use fixture::{load_replay_fixture, ReplayFixture, ReplayOperation};
pub use replay::{replay_fixture, ReplayReport};

const TELEMETRY_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run_cli(cli: Cli) -> Result<()> {
    let report = run_replay(&cli).await?;
    let rendered =
        serde_json::to_string_pretty(&report).context("failed to encode replay report")?;
    println!("{rendered}");
    Ok(())
}

/// Loads, replays and reports one fixture; writes `--report-out` when set.
pub async fn run_replay(cli: &Cli) -> Result<ReplayReport> {
    let fixture = load_replay_fixture(&cli.fixture)?;
    let log_sink = match &cli.telemetry_log {
        Some(path) => {
            let writer = JsonlTelemetrySink::open(path, LogRotationPolicy::from_env())?;
            Some(Arc::new(BufferedTelemetrySink::spawn(
                Arc::new(writer),
                cli.telemetry_queue_capacity,
            )))
        }
        None => None,
    };

    let extra_sink = log_sink
        .clone()
        .map(|sink| sink as Arc<dyn TelemetrySink>);
    let report = replay_fixture(&fixture, cli.telemetry_options(), extra_sink).await?;

    if let Some(sink) = log_sink {
        let (flushed, metrics) = tokio::task::spawn_blocking(move || {
            let flushed = sink.flush(TELEMETRY_FLUSH_TIMEOUT);
            (flushed, sink.metrics())
        })
        .await
        .context("telemetry flush task failed")?;
        if !flushed || metrics.dropped_full > 0 || metrics.failed > 0 {
            tracing::warn!(
                flushed,
                dropped = metrics.dropped_full,
                failed = metrics.failed,
                "telemetry log is incomplete"
            );
        }
    }

    if let Some(path) = &cli.report_out {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to encode replay report")?;
        write_text_atomic(path, &format!("{rendered}\n"))
            .with_context(|| format!("failed to write replay report {}", path.display()))?;
    }
    Ok(report)
}
