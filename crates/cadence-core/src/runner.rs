//! Session loop.
//!
//! [`run_session`] steps a [`TrafficSimulation`] until it reports no more
//! activity (or the configured step bound is hit) and runs one controller
//! tick after every step. One session is one strategy against one
//! simulator; sessions share nothing and can run on separate threads.

use cadence_types::{SessionId, Strategy};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::controller::{AdaptiveController, ControllerError};
use crate::metrics::MetricsAggregator;
use crate::simulation::{SimulationError, TrafficSimulation};

/// Errors that can end a session early.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Stepping or polling the simulator failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulator error.
        #[from]
        source: SimulationError,
    },

    /// A controller tick failed.
    #[error("controller error at step {step}: {source}")]
    Controller {
        /// Step of the failed tick.
        step: u64,
        /// The underlying controller error.
        source: ControllerError,
    },
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// Every vehicle departed and left the network.
    Drained,
    /// The `max_steps` bound was reached first.
    MaxStepsReached,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    /// Unique id of this session.
    pub session_id: SessionId,
    /// Strategy the session ran.
    pub strategy: Strategy,
    /// Why the session stopped.
    pub end_reason: SessionEndReason,
    /// Number of simulation steps executed.
    pub steps: u64,
    /// Number of steps on which the controller sent a phase duration.
    pub adjustments: u64,
    /// Simulated time when the session stopped, in seconds.
    pub simulated_time: f64,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
}

/// Run one session to completion.
///
/// Samples go straight into `metrics`, which the caller owns, so a session
/// that fails part-way still leaves everything it recorded up to the
/// failure. `max_steps` of 0 means unbounded.
///
/// # Errors
///
/// Returns [`RunnerError`] on the first simulator or controller failure.
pub fn run_session(
    sim: &mut dyn TrafficSimulation,
    controller: &mut AdaptiveController,
    metrics: &mut MetricsAggregator,
    max_steps: u64,
) -> Result<SessionResult, RunnerError> {
    let session_id = SessionId::new();
    let strategy = controller.strategy();
    let started_at = Utc::now();
    let mut steps: u64 = 0;
    let mut adjustments: u64 = 0;

    info!(%session_id, %strategy, max_steps, "Session starting");

    let end_reason = loop {
        if !sim.has_more_activity()? {
            break SessionEndReason::Drained;
        }
        if max_steps > 0 && steps >= max_steps {
            warn!(%session_id, %strategy, steps, "Step limit reached before the network drained");
            break SessionEndReason::MaxStepsReached;
        }

        sim.advance_one_step()?;
        let report = controller
            .tick(steps, sim, metrics)
            .map_err(|source| RunnerError::Controller {
                step: steps,
                source,
            })?;
        if report.applied.is_some() {
            adjustments = adjustments.saturating_add(1);
        }
        steps = steps.saturating_add(1);
    };

    Ok(SessionResult {
        session_id,
        strategy,
        end_reason,
        steps,
        adjustments,
        simulated_time: sim.current_simulated_time()?,
        started_at,
        finished_at: Utc::now(),
    })
}

/// Log how a session ended.
pub fn log_session_end(result: &SessionResult, metrics: &MetricsAggregator) {
    let samples: usize = metrics
        .keys()
        .filter(|&(_, strategy)| strategy == result.strategy)
        .map(|(lane, strategy)| metrics.export(lane, strategy).len())
        .sum();
    info!(
        session_id = %result.session_id,
        strategy = %result.strategy,
        reason = ?result.end_reason,
        steps = result.steps,
        adjustments = result.adjustments,
        simulated_time = result.simulated_time,
        samples,
        elapsed_ms = result
            .finished_at
            .signed_duration_since(result.started_at)
            .num_milliseconds(),
        "Session ended"
    );
}
