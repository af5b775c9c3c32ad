//! # Tide Curve Application Entry Point
//!
//! Loads the configuration, feeds a recorded tide data file through the
//! refresh coordinator and prints what it derives as JSON.
//!
//! ```text
//! tide-curve --data recording.json [--config tide-curve.toml] [--unwindowed] [--smooth] [--watch]
//! ```
//!
//! - one-shot (default): refresh once, print the current state, interval
//!   predictions and chart series, exit
//! - `--watch`: keep both refresh cadences running and print the current state
//!   on every local update until Ctrl-C
//!
//! Logging goes to stderr through `tracing`; set `RUST_LOG` to change the
//! level (default `info`).


use anyhow::{bail, Context};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tide_curve_lib::{
    config::Config,
    coordinator::{CoordinatorStatus, RefreshCoordinator},
    provider::RecordedProvider,
    synthetic::SMOOTH_INTERVAL_MINUTES,
    CurrentState, IntervalPrediction, Sample,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: tide-curve --data <recording.json> [--config <file>] [--unwindowed] [--smooth] [--watch]";

/// Command line options.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Args {
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
    /// Replay the whole recording instead of the window around now
    pub unwindowed: bool,
    /// Chart the spline-resampled series
    pub smooth: bool,
    pub watch: bool,
}

pub(crate) fn parse_args<I>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(path.into());
            }
            "--data" => {
                let path = args.next().context("--data needs a path")?;
                parsed.data = Some(path.into());
            }
            "--unwindowed" => parsed.unwindowed = true,
            "--smooth" => parsed.smooth = true,
            "--watch" => parsed.watch = true,
            other => bail!("unknown argument {other}\n{USAGE}"),
        }
    }
    Ok(parsed)
}

/// One-shot output.
#[derive(Debug, Serialize)]
pub(crate) struct Report {
    pub station: String,
    pub status: String,
    pub state: Option<CurrentState>,
    pub predictions: Vec<IntervalPrediction>,
    pub chart: Vec<Sample>,
}

pub(crate) fn build_report(coordinator: &RefreshCoordinator, smooth: bool) -> Report {
    let config = coordinator.config();
    let chart = &config.chart;
    let status = match coordinator.status() {
        CoordinatorStatus::Uninitialized => "uninitialized".to_string(),
        CoordinatorStatus::Populated { fetched_at } => format!("fetched {}", fetched_at.to_rfc3339()),
    };
    let series = if smooth {
        coordinator.smooth_chart_series(chart.history_hours, chart.future_hours, SMOOTH_INTERVAL_MINUTES)
    } else {
        coordinator.chart_series(chart.history_hours, chart.future_hours)
    };

    Report {
        station: config.station.name.clone(),
        status,
        state: coordinator.current_state(),
        predictions: coordinator.interval_predictions().into_values().collect(),
        chart: series,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let Some(data) = &args.data else {
        bail!("no tide data source given\n{USAGE}");
    };

    let mut provider = RecordedProvider::new(data);
    if args.unwindowed {
        provider = provider.unwindowed();
    }
    let coordinator = Arc::new(RefreshCoordinator::new(Arc::new(provider), config));

    // Create Tokio runtime for the provider and the refresh cadences
    let rt = tokio::runtime::Runtime::new()?;

    if args.watch {
        return rt.block_on(watch(coordinator));
    }

    rt.block_on(coordinator.refresh())
        .with_context(|| format!("loading {}", data.display()))?;
    let report = build_report(&coordinator, args.smooth);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn watch(coordinator: Arc<RefreshCoordinator>) -> anyhow::Result<()> {
    let handle = coordinator.start();
    let mut ticker = tokio::time::interval(coordinator.config().refresh.local_interval());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Some(state) = coordinator.current_state() {
                    println!("{}", serde_json::to_string(&state)?);
                }
            }
        }
    }

    handle.stop().await;
    Ok(())
}
