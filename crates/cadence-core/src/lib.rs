//! Control loop and session orchestration for the Cadence adaptive signal
//! controller.
//!
//! Each simulation step the [`AdaptiveController`] observes the signal and
//! its lanes through the [`TrafficSimulation`] boundary, turns the lane
//! counts into a green time, clamps it to the remaining phase time, and
//! records per-lane wait samples in a [`MetricsAggregator`].
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration and defaults
//! - [`simulation`] -- The simulator boundary trait
//! - [`controller`] -- Fixed-time and fuzzy per-tick control
//! - [`metrics`] -- Append-only wait-time series and run summary
//! - [`runner`] -- Session loop with step bound
//! - [`demand`] -- Seeded demand and route file generation
//! - [`export`] -- CSV series, JSON summary, and route file writers

pub mod config;
pub mod controller;
pub mod demand;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod simulation;

pub use config::SimulationConfig;
pub use controller::{AdaptiveController, ControllerError, TickReport, clamp_to_remaining};
pub use metrics::MetricsAggregator;
pub use runner::{RunnerError, SessionEndReason, SessionResult, run_session};
pub use simulation::{SimulationError, TrafficSimulation};
