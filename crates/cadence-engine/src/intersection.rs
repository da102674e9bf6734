//! In-process model of the controlled junction.
//!
//! A small queue model standing in for a microscopic simulator:
//!
//! - each generated vehicle enters its approach lane at its departure step
//!   and reaches the stop line `approach_steps` later
//! - vehicles at or behind the stop line are halted until their lane has
//!   green; a green lane discharges one vehicle per `discharge_headway`
//!   steps, first in first out
//! - the signal cycles green A, yellow, green B, yellow; a phase-duration
//!   command moves the next switch to `now + duration`
//!
//! Lane waiting time is the sum over halted vehicles of the time since they
//! stopped, which is what the controller's per-vehicle samples are built on.

use std::collections::{BTreeMap, VecDeque};

use cadence_core::config::IntersectionConfig;
use cadence_core::demand::{Demand, Departure};
use cadence_core::simulation::check_duration;
use cadence_core::{SimulationError, TrafficSimulation};
use cadence_types::{Lane, PhaseGroup};
use tracing::trace;

/// One entry of the signal program.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProgramPhase {
    /// Phase index reported to the controller.
    index: u32,
    /// Group with right-of-way, or `None` for yellow.
    green: Option<PhaseGroup>,
    /// Scheduled duration in seconds.
    duration: f64,
}

/// A vehicle on an approach lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Vehicle {
    /// Step at which it reaches the stop line (or the queue tail).
    arrives_at: u64,
    /// Step at which it stopped, once halted.
    halted_since: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct LaneState {
    vehicles: VecDeque<Vehicle>,
    last_discharge: Option<u64>,
    discharged: u64,
}

/// The junction: four approach lanes and one two-phase signal.
#[derive(Debug, Clone)]
pub struct IntersectionModel {
    config: IntersectionConfig,
    program: Vec<ProgramPhase>,
    current: usize,
    next_switch: f64,
    now: u64,
    pending: VecDeque<Departure>,
    lanes: BTreeMap<Lane, LaneState>,
}

impl IntersectionModel {
    /// A model at time 0 in the first green of group A, with `demand` still
    /// to depart.
    pub fn new(config: IntersectionConfig, demand: &Demand) -> Self {
        let program = build_program(&config);
        let next_switch = program.first().map_or(0.0, |phase| phase.duration);
        Self {
            program,
            current: 0,
            next_switch,
            now: 0,
            pending: demand.departures().iter().copied().collect(),
            lanes: Lane::ALL
                .into_iter()
                .map(|lane| (lane, LaneState::default()))
                .collect(),
            config,
        }
    }

    /// Vehicles that have crossed the stop line so far.
    pub fn discharged(&self) -> u64 {
        self.lanes.values().map(|lane| lane.discharged).sum()
    }

    fn phase(&self) -> Option<&ProgramPhase> {
        self.program.get(self.current)
    }

    fn check_signal(&self, signal: &str) -> Result<(), SimulationError> {
        if signal == self.config.signal_id {
            Ok(())
        } else {
            Err(SimulationError::UnknownSignal {
                signal: signal.to_owned(),
            })
        }
    }

    fn lane(&self, id: &str) -> Result<&LaneState, SimulationError> {
        self.config
            .lanes
            .lane(id)
            .and_then(|lane| self.lanes.get(&lane))
            .ok_or_else(|| SimulationError::UnknownLane {
                lane: id.to_owned(),
            })
    }

    fn time(&self) -> f64 {
        steps_as_seconds(self.now)
    }

    fn advance_signal(&mut self) {
        // At most one full cycle per step, even for zero-length phases.
        for _ in 0..self.program.len() {
            if self.time() < self.next_switch {
                break;
            }
            self.current = match self.current.checked_add(1) {
                Some(next) if next < self.program.len() => next,
                _ => 0,
            };
            let duration = self.phase().map_or(0.0, |phase| phase.duration);
            self.next_switch += duration;
            trace!(time = self.now, phase = ?self.phase(), "Signal switched");
        }
    }

    fn admit_departures(&mut self) {
        while let Some(departure) = self.pending.front().copied() {
            if departure.step > self.now {
                break;
            }
            self.pending.pop_front();
            let arrives_at = departure.step.saturating_add(self.config.approach_steps);
            if let Some(lane) = self.lanes.get_mut(&departure.route.entry_lane()) {
                lane.vehicles.push_back(Vehicle {
                    arrives_at,
                    halted_since: None,
                });
            }
        }
    }

    fn move_vehicles(&mut self) {
        let now = self.now;
        let headway = self.config.discharge_headway;
        let green = self.phase().and_then(|phase| phase.green);

        for (lane, state) in &mut self.lanes {
            let has_green = green == Some(lane.phase_group());
            let headway_clear = state
                .last_discharge
                .is_none_or(|last| now.saturating_sub(last) >= headway);
            let head_at_line = state
                .vehicles
                .front()
                .is_some_and(|vehicle| vehicle.arrives_at <= now);
            if has_green && headway_clear && head_at_line {
                state.vehicles.pop_front();
                state.last_discharge = Some(now);
                state.discharged = state.discharged.saturating_add(1);
            }

            for vehicle in &mut state.vehicles {
                if vehicle.arrives_at > now {
                    break;
                }
                if vehicle.halted_since.is_none() {
                    vehicle.halted_since = Some(now);
                }
            }
        }
    }
}

/// Green A, yellow, green B, yellow. Yellow phases take the lowest indices
/// not used by the configured green phases.
fn build_program(config: &IntersectionConfig) -> Vec<ProgramPhase> {
    let mut spare =
        (0..=u32::MAX).filter(|index| *index != config.phase_a && *index != config.phase_b);
    let yellow_after_a = spare.next().unwrap_or(u32::MAX);
    let yellow_after_b = spare.next().unwrap_or(u32::MAX);
    vec![
        ProgramPhase {
            index: config.phase_a,
            green: Some(PhaseGroup::A),
            duration: config.green_time,
        },
        ProgramPhase {
            index: yellow_after_a,
            green: None,
            duration: config.yellow_time,
        },
        ProgramPhase {
            index: config.phase_b,
            green: Some(PhaseGroup::B),
            duration: config.green_time,
        },
        ProgramPhase {
            index: yellow_after_b,
            green: None,
            duration: config.yellow_time,
        },
    ]
}

impl TrafficSimulation for IntersectionModel {
    fn advance_one_step(&mut self) -> Result<(), SimulationError> {
        self.now = self.now.checked_add(1).ok_or_else(|| SimulationError::Backend {
            message: "step counter overflow".to_owned(),
        })?;
        self.advance_signal();
        self.admit_departures();
        self.move_vehicles();
        Ok(())
    }

    fn has_more_activity(&self) -> Result<bool, SimulationError> {
        let on_lanes = self.lanes.values().any(|lane| !lane.vehicles.is_empty());
        Ok(on_lanes || !self.pending.is_empty())
    }

    fn current_phase(&self, signal: &str) -> Result<u32, SimulationError> {
        self.check_signal(signal)?;
        self.phase()
            .map(|phase| phase.index)
            .ok_or_else(|| SimulationError::Backend {
                message: "empty signal program".to_owned(),
            })
    }

    fn last_step_vehicle_count(&self, lane: &str) -> Result<u32, SimulationError> {
        let count = self.lane(lane)?.vehicles.len();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn accumulated_waiting_time(&self, lane: &str) -> Result<f64, SimulationError> {
        let now = self.now;
        Ok(self
            .lane(lane)?
            .vehicles
            .iter()
            .filter_map(|vehicle| vehicle.halted_since)
            .map(|since| steps_as_seconds(now.saturating_sub(since)))
            .sum())
    }

    fn set_phase_duration(&mut self, signal: &str, duration: f64) -> Result<(), SimulationError> {
        self.check_signal(signal)?;
        check_duration(signal, duration)?;
        self.next_switch = self.time() + duration;
        Ok(())
    }

    fn time_until_next_switch(&self, signal: &str) -> Result<f64, SimulationError> {
        self.check_signal(signal)?;
        Ok(self.next_switch - self.time())
    }

    fn current_simulated_time(&self) -> Result<f64, SimulationError> {
        Ok(self.time())
    }
}

/// Steps are bounded by the run length, so the conversion is exact.
#[allow(clippy::cast_precision_loss)]
const fn steps_as_seconds(steps: u64) -> f64 {
    steps as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use cadence_core::demand::Route;

    use super::*;

    fn lane_id(lane: Lane) -> String {
        IntersectionConfig::default().lanes.id(lane).to_owned()
    }

    fn one_vehicle(route: Route) -> Demand {
        Demand::new(vec![Departure {
            vehicle: 0,
            route,
            step: 0,
        }])
    }

    fn step(model: &mut IntersectionModel, steps: u32) {
        for _ in 0..steps {
            model.advance_one_step().unwrap();
        }
    }

    #[test]
    fn green_lane_vehicle_passes_without_waiting() {
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &one_vehicle(Route::Right));
        let lane1 = lane_id(Lane::Lane1);

        step(&mut model, 5);
        assert_eq!(model.last_step_vehicle_count(&lane1).unwrap(), 1);
        assert_eq!(model.accumulated_waiting_time(&lane1).unwrap(), 0.0);

        step(&mut model, 6);
        assert_eq!(model.last_step_vehicle_count(&lane1).unwrap(), 0);
        assert_eq!(model.discharged(), 1);
        assert!(!model.has_more_activity().unwrap());
    }

    #[test]
    fn red_lane_vehicle_accumulates_waiting_time() {
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &one_vehicle(Route::Down));
        let lane2 = lane_id(Lane::Lane2);

        // Arrives at the stop line at step 10, then waits through green A.
        step(&mut model, 20);
        assert_eq!(model.last_step_vehicle_count(&lane2).unwrap(), 1);
        assert_eq!(model.accumulated_waiting_time(&lane2).unwrap(), 10.0);

        // Green B starts at 31 + 4 = 35.
        step(&mut model, 15);
        assert_eq!(model.current_phase("J2").unwrap(), 2);
        assert_eq!(model.last_step_vehicle_count(&lane2).unwrap(), 0);
    }

    #[test]
    fn signal_follows_its_program() {
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &Demand::default());
        let mut phases = Vec::new();
        for _ in 0..75 {
            model.advance_one_step().unwrap();
            phases.push(model.current_phase("J2").unwrap());
        }
        assert_eq!(phases.get(29), Some(&0));
        assert_eq!(phases.get(30), Some(&1));
        assert_eq!(phases.get(34), Some(&2));
        assert_eq!(phases.get(65), Some(&3));
        assert_eq!(phases.get(69), Some(&0));
        assert_eq!(model.time_until_next_switch("J2").unwrap(), 101.0 - 75.0);
    }

    #[test]
    fn phase_duration_command_moves_the_next_switch() {
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &Demand::default());
        step(&mut model, 3);
        model.set_phase_duration("J2", 2.0).unwrap();
        assert_eq!(model.time_until_next_switch("J2").unwrap(), 2.0);

        step(&mut model, 1);
        assert_eq!(model.current_phase("J2").unwrap(), 0);
        step(&mut model, 1);
        assert_eq!(model.current_phase("J2").unwrap(), 1);
        assert_eq!(model.time_until_next_switch("J2").unwrap(), 4.0);
    }

    #[test]
    fn zero_duration_switches_on_the_next_step() {
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &Demand::default());
        step(&mut model, 1);
        model.set_phase_duration("J2", 0.0).unwrap();
        step(&mut model, 1);
        assert_eq!(model.current_phase("J2").unwrap(), 1);
    }

    #[test]
    fn invalid_commands_are_rejected() {
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &Demand::default());
        assert!(matches!(
            model.set_phase_duration("J2", -1.0),
            Err(SimulationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            model.set_phase_duration("J2", f64::NAN),
            Err(SimulationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            model.current_phase("J9"),
            Err(SimulationError::UnknownSignal { .. })
        ));
        assert!(matches!(
            model.last_step_vehicle_count("E7_0"),
            Err(SimulationError::UnknownLane { .. })
        ));
    }

    #[test]
    fn headway_limits_discharge_rate() {
        let config = IntersectionConfig {
            discharge_headway: 2,
            ..IntersectionConfig::default()
        };
        let departures = (0..4)
            .map(|vehicle| Departure {
                vehicle,
                route: Route::Left,
                step: 0,
            })
            .collect();
        let mut model = IntersectionModel::new(config, &Demand::new(departures));

        // All four reach the line at step 10; one leaves every other step.
        step(&mut model, 10);
        assert_eq!(model.discharged(), 1);
        step(&mut model, 4);
        assert_eq!(model.discharged(), 3);
        step(&mut model, 2);
        assert_eq!(model.discharged(), 4);
    }

    #[test]
    fn drains_generated_demand() {
        let demand = Demand::generate_with(200, 300, 42);
        let mut model = IntersectionModel::new(IntersectionConfig::default(), &demand);
        let mut steps = 0_u32;
        while model.has_more_activity().unwrap() && steps < 5_000 {
            model.advance_one_step().unwrap();
            steps = steps.saturating_add(1);
        }
        assert!(!model.has_more_activity().unwrap());
        assert_eq!(model.discharged(), u64::try_from(demand.len()).unwrap());
    }
}
