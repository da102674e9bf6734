//! Cadence engine binary.
//!
//! Runs the fixed-time baseline and the fuzzy adaptive controller against
//! the same generated demand, each on its own copy of the junction, and
//! writes both strategies' wait-time series side by side.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `cadence-config.yaml` (or `$CADENCE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Generate the demand and write the route file
//! 4. Run the fixed and fuzzy sessions concurrently
//! 5. Merge their samples and write the CSV series and summary
//! 6. Log the comparison

mod error;
mod intersection;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use cadence_core::config::SimulationConfig;
use cadence_core::demand::Demand;
use cadence_core::metrics::RunSummary;
use cadence_core::{MetricsAggregator, export, runner};
use cadence_types::Strategy;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point.
///
/// Results are written even when a session fails part-way, so the samples
/// recorded before the failure are kept; the failure is returned afterwards.
///
/// # Errors
///
/// Returns an error if configuration, a session, or writing results fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet; errors surface via main.
    let (config, loaded_from) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("cadence-engine starting");
    match &loaded_from {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        car_count = config.simulation.car_count,
        step_count = config.simulation.step_count,
        seed = config.simulation.random_seed,
        fixed_cycle_time = config.simulation.fixed_cycle_time,
        max_steps = config.simulation.max_steps,
        signal = config.intersection.signal_id,
        custom_fuzzy_system = config.fuzzy.is_some(),
        "Run parameters"
    );

    // 3. Demand and route file.
    let demand = Demand::generate(&config.simulation);
    export::write_route_file(&demand, &config.output.route_path()).map_err(EngineError::from)?;

    // 4. Both sessions, each on a blocking thread with its own junction.
    let config = Arc::new(config);
    let demand = Arc::new(demand);
    let handles = Strategy::ALL.map(|strategy| {
        let config = Arc::clone(&config);
        let demand = Arc::clone(&demand);
        tokio::task::spawn_blocking(move || session::run_strategy(strategy, &config, &demand))
    });

    // 5. Merge, keeping the first failure for after the export.
    let mut metrics = MetricsAggregator::new();
    let mut failure: Option<EngineError> = None;
    for handle in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(error = %join_error, "Session task failed");
                failure.get_or_insert(EngineError::from(join_error));
                continue;
            }
        };
        metrics.absorb(outcome.metrics);
        match outcome.result {
            Ok(result) => runner::log_session_end(&result, &metrics),
            Err(session_error) => {
                error!(strategy = %outcome.strategy, error = %session_error, "Session failed");
                failure.get_or_insert(session_error);
            }
        }
    }

    let statistics_dir = config.output.statistics_dir();
    export::write_statistics(&metrics, &statistics_dir).map_err(EngineError::from)?;
    let summary = metrics.summary();
    export::write_summary(&summary, &statistics_dir).map_err(EngineError::from)?;

    // 6. Log the comparison.
    log_summary(&summary);

    if let Some(failure) = failure {
        return Err(failure.into());
    }

    info!(
        samples = metrics.total_samples(),
        statistics_dir = %statistics_dir.display(),
        "cadence-engine shutdown complete"
    );
    Ok(())
}

/// Load the configuration from `$CADENCE_CONFIG` or `cadence-config.yaml`.
///
/// Returns the path it was read from, or `None` when the file does not
/// exist and defaults are used.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    let config_path = SimulationConfig::path_from_env();
    if config_path.exists() {
        let config = SimulationConfig::from_file(&config_path)?;
        Ok((config, Some(config_path)))
    } else {
        Ok((SimulationConfig::default(), None))
    }
}

fn log_summary(summary: &RunSummary) {
    for lane in &summary.lanes {
        info!(
            lane = %lane.lane,
            fixed_mean = ?lane.fixed.mean,
            fuzzy_mean = ?lane.fuzzy.mean,
            fixed_samples = lane.fixed.samples,
            fuzzy_samples = lane.fuzzy.samples,
            relative_change = ?lane.relative_change,
            "Lane comparison"
        );
    }
    for (strategy, stats) in &summary.overall {
        info!(
            %strategy,
            mean = ?stats.mean,
            max = ?stats.max,
            samples = stats.samples,
            "Overall waiting time"
        );
    }
}
