//! Plain data structs shared across the workspace.

use serde::{Deserialize, Serialize};

/// One wait-time observation: average waiting time per vehicle on a lane at
/// a simulation step.
///
/// Samples are immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaitTimeSample {
    /// Simulation step at which the sample was taken.
    pub timestep: u64,
    /// Accumulated lane waiting time divided by the lane's vehicle count.
    pub value: f64,
}

impl WaitTimeSample {
    /// Create a sample.
    pub const fn new(timestep: u64, value: f64) -> Self {
        Self { timestep, value }
    }
}

/// Snapshot of the controlled signal as reported by the simulator.
///
/// The controller reads this each tick and never mutates it directly; the
/// only write path is a phase-duration command back to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    /// Index of the current phase in the signal program.
    pub phase: u32,
    /// Seconds until the next scheduled phase switch.
    pub time_until_switch: f64,
    /// Current simulated time in seconds.
    pub simulated_time: f64,
}
