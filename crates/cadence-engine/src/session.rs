//! One strategy against its own copy of the junction.

use cadence_core::demand::Demand;
use cadence_core::{
    AdaptiveController, MetricsAggregator, SessionResult, SimulationConfig, run_session,
};
use cadence_types::Strategy;
use tracing::info;

use crate::error::EngineError;
use crate::intersection::IntersectionModel;

/// What a session left behind, successful or not.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Strategy the session ran.
    pub strategy: Strategy,
    /// Samples recorded up to the end (or the failure).
    pub metrics: MetricsAggregator,
    /// How the session ended.
    pub result: Result<SessionResult, EngineError>,
}

/// Run `strategy` on a fresh intersection fed with `demand`.
///
/// Blocking; the engine runs one of these per strategy on its own thread.
pub fn run_strategy(
    strategy: Strategy,
    config: &SimulationConfig,
    demand: &Demand,
) -> SessionOutcome {
    let mut metrics = MetricsAggregator::new();
    let result = run_into(strategy, config, demand, &mut metrics);
    SessionOutcome {
        strategy,
        metrics,
        result,
    }
}

fn run_into(
    strategy: Strategy,
    config: &SimulationConfig,
    demand: &Demand,
    metrics: &mut MetricsAggregator,
) -> Result<SessionResult, EngineError> {
    let mut controller = AdaptiveController::from_config(strategy, config)?;
    let mut model = IntersectionModel::new(config.intersection.clone(), demand);
    let result = run_session(&mut model, &mut controller, metrics, config.simulation.max_steps)?;
    info!(
        %strategy,
        discharged = model.discharged(),
        departures = demand.len(),
        "Intersection closed"
    );
    Ok(result)
}
