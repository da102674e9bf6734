//! The boundary to the traffic simulator.
//!
//! The controller never touches simulator internals: it reads lane and
//! signal state through [`TrafficSimulation`] and writes back a single
//! command, [`TrafficSimulation::set_phase_duration`]. The engine binary
//! provides an in-process implementation; tests use scripted ones.

use cadence_types::SignalState;

/// Errors reported by a simulator implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    /// The signal id is not known to the simulator.
    #[error("unknown traffic light: {signal}")]
    UnknownSignal {
        /// The requested signal id.
        signal: String,
    },

    /// The lane id is not known to the simulator.
    #[error("unknown lane: {lane}")]
    UnknownLane {
        /// The requested lane id.
        lane: String,
    },

    /// A phase duration was negative or not finite.
    #[error("invalid phase duration {duration} for traffic light {signal}")]
    InvalidDuration {
        /// The signal the command targeted.
        signal: String,
        /// The rejected duration in seconds.
        duration: f64,
    },

    /// The simulator failed internally.
    #[error("simulator error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// A microscopic traffic simulation driven one step at a time.
///
/// Steps are one simulated second. All queries refer to the state after the
/// most recent [`advance_one_step`](Self::advance_one_step).
pub trait TrafficSimulation {
    /// Advance the simulation by one step.
    fn advance_one_step(&mut self) -> Result<(), SimulationError>;

    /// Whether vehicles are still running or scheduled to depart.
    fn has_more_activity(&self) -> Result<bool, SimulationError>;

    /// Index of the signal's current program phase.
    fn current_phase(&self, signal: &str) -> Result<u32, SimulationError>;

    /// Number of vehicles on the lane during the last step.
    fn last_step_vehicle_count(&self, lane: &str) -> Result<u32, SimulationError>;

    /// Sum of the current waiting times of the vehicles on the lane, in
    /// seconds.
    fn accumulated_waiting_time(&self, lane: &str) -> Result<f64, SimulationError>;

    /// Set the remaining duration of the signal's current phase, counted
    /// from now.
    ///
    /// Implementations reject negative or non-finite durations with
    /// [`SimulationError::InvalidDuration`].
    fn set_phase_duration(&mut self, signal: &str, duration: f64) -> Result<(), SimulationError>;

    /// Seconds until the signal's next scheduled phase switch.
    fn time_until_next_switch(&self, signal: &str) -> Result<f64, SimulationError>;

    /// Current simulated time in seconds.
    fn current_simulated_time(&self) -> Result<f64, SimulationError>;

    /// Snapshot of the signal's phase and switch timing.
    fn signal_state(&self, signal: &str) -> Result<SignalState, SimulationError> {
        Ok(SignalState {
            phase: self.current_phase(signal)?,
            time_until_switch: self.time_until_next_switch(signal)?,
            simulated_time: self.current_simulated_time()?,
        })
    }
}

/// Reject a phase duration that is negative or not finite.
///
/// Shared by [`TrafficSimulation`] implementations.
///
/// # Errors
///
/// Returns [`SimulationError::InvalidDuration`] for a bad duration.
pub fn check_duration(signal: &str, duration: f64) -> Result<(), SimulationError> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidDuration {
            signal: signal.to_owned(),
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_must_be_finite_and_non_negative() {
        assert!(check_duration("J2", 0.0).is_ok());
        assert!(check_duration("J2", 12.5).is_ok());
        assert!(check_duration("J2", -0.5).is_err());
        assert!(check_duration("J2", f64::NAN).is_err());
        assert!(check_duration("J2", f64::INFINITY).is_err());
    }
}
