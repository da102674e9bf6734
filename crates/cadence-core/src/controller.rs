//! The per-tick adaptive signal controller.
//!
//! Each tick the controller:
//!
//! 1. reads the signal's current phase; transition phases are ignored
//! 2. counts vehicles on the green lanes ("arriving") and the red lanes
//!    ("queuing")
//! 3. records `waiting time / count` for every green lane with traffic
//! 4. asks its [`Timing`] for a green time
//! 5. applies `max(0, min(remaining, recommended))`
//!
//! The applied value never exceeds the time left before the scheduled
//! switch, so the controller can only shorten a phase.

use cadence_fuzzy::{FuzzyError, InferenceEngine, cycle_time};
use cadence_types::{PhaseGroup, Strategy};
use tracing::{debug, warn};

use crate::config::{IntersectionConfig, NoRuleFiredPolicy, SimulationConfig};
use crate::metrics::MetricsAggregator;
use crate::simulation::{SimulationError, TrafficSimulation};

/// Errors that end a controller tick.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The simulator rejected a query or command.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulator error.
        #[from]
        source: SimulationError,
    },

    /// Fuzzy inference failed.
    #[error("inference error: {source}")]
    Inference {
        /// The underlying inference error.
        #[from]
        source: FuzzyError,
    },

    /// A custom fuzzy system does not take exactly the arriving and queuing
    /// counts as inputs.
    #[error("fuzzy system inputs {inputs:?} must be exactly arriving_vehicles and queuing_vehicles")]
    IncompatibleSystem {
        /// Input variable names the system declares.
        inputs: Vec<String>,
    },
}

/// How a controller chooses green times.
#[derive(Debug, Clone)]
pub enum Timing {
    /// Apply a constant green time once, at the onset of each green phase.
    Fixed {
        /// Green time in seconds.
        cycle_time: f64,
    },
    /// Infer a green time from the lane counts on every green tick.
    Fuzzy {
        /// The cycle-time inference engine.
        engine: InferenceEngine,
        /// Reaction to an all-zero output profile.
        on_no_rule_fired: NoRuleFiredPolicy,
    },
}

/// What one tick observed and did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Step the tick ran at.
    pub timestep: u64,
    /// Program phase index observed.
    pub phase: u32,
    /// Phase group with green, or `None` during a transition phase.
    pub group: Option<PhaseGroup>,
    /// Vehicles on the green lanes.
    pub arriving: u32,
    /// Vehicles on the red lanes.
    pub queuing: u32,
    /// Green time the timing asked for, before clamping.
    pub recommended: Option<f64>,
    /// Duration sent to the simulator.
    pub applied: Option<f64>,
}

/// Clamp a recommended green time to the time remaining before the
/// scheduled switch, and to zero from below.
pub const fn clamp_to_remaining(remaining: f64, recommended: f64) -> f64 {
    recommended.min(remaining).max(0.0)
}

/// Drives one signal through a [`TrafficSimulation`].
///
/// The only state carried between ticks is the last observed phase, used
/// to detect green onsets for the fixed-time baseline.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    strategy: Strategy,
    timing: Timing,
    intersection: IntersectionConfig,
    last_phase: Option<u32>,
}

impl AdaptiveController {
    /// A fixed-time baseline controller.
    pub const fn fixed(intersection: IntersectionConfig, cycle_time: f64) -> Self {
        Self {
            strategy: Strategy::Fixed,
            timing: Timing::Fixed { cycle_time },
            intersection,
            last_phase: None,
        }
    }

    /// A fuzzy adaptive controller.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::IncompatibleSystem`] unless the engine's
    /// inputs are exactly the arriving and queuing counts.
    pub fn fuzzy(
        intersection: IntersectionConfig,
        engine: InferenceEngine,
        on_no_rule_fired: NoRuleFiredPolicy,
    ) -> Result<Self, ControllerError> {
        if !cycle_time::has_cycle_time_inputs(&engine) {
            return Err(ControllerError::IncompatibleSystem {
                inputs: engine.input_names().map(str::to_owned).collect(),
            });
        }
        Ok(Self {
            strategy: Strategy::Fuzzy,
            timing: Timing::Fuzzy {
                engine,
                on_no_rule_fired,
            },
            intersection,
            last_phase: None,
        })
    }

    /// Build the controller for `strategy` from configuration. The fuzzy
    /// strategy uses `config.fuzzy` if set, otherwise the shipped system.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Inference`] if the fuzzy system is
    /// malformed, or [`ControllerError::IncompatibleSystem`].
    pub fn from_config(
        strategy: Strategy,
        config: &SimulationConfig,
    ) -> Result<Self, ControllerError> {
        let intersection = config.intersection.clone();
        match strategy {
            Strategy::Fixed => Ok(Self::fixed(
                intersection,
                config.simulation.fixed_cycle_time,
            )),
            Strategy::Fuzzy => {
                let engine = match &config.fuzzy {
                    Some(spec) => spec.build()?,
                    None => cycle_time::engine()?,
                };
                Self::fuzzy(intersection, engine, config.controller.on_no_rule_fired)
            }
        }
    }

    /// The strategy this controller implements.
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// How green times are chosen.
    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Phase index seen on the previous tick.
    pub const fn last_phase(&self) -> Option<u32> {
        self.last_phase
    }

    /// Run one control step against the simulator's current state.
    ///
    /// Wait-time samples go to `metrics` as they are observed, so a tick that
    /// fails part-way still leaves its earlier samples recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Simulation`] if the simulator fails, or
    /// [`ControllerError::Inference`] if inference fails and the policy does
    /// not absorb it.
    pub fn tick(
        &mut self,
        timestep: u64,
        sim: &mut dyn TrafficSimulation,
        metrics: &mut MetricsAggregator,
    ) -> Result<TickReport, ControllerError> {
        let signal = self.intersection.signal_id.as_str();
        let phase = sim.current_phase(signal)?;
        let onset = self.last_phase != Some(phase);
        self.last_phase = Some(phase);

        let mut report = TickReport {
            timestep,
            phase,
            group: self.intersection.phase_group(phase),
            arriving: 0,
            queuing: 0,
            recommended: None,
            applied: None,
        };
        let Some(group) = report.group else {
            return Ok(report);
        };

        for lane in group.lanes() {
            let id = self.intersection.lanes.id(lane);
            let count = sim.last_step_vehicle_count(id)?;
            report.arriving = report.arriving.saturating_add(count);
            if count > 0 {
                let waiting = sim.accumulated_waiting_time(id)?;
                metrics.record(lane, self.strategy, timestep, waiting / f64::from(count));
            }
        }
        for lane in group.opposing().lanes() {
            let count = sim.last_step_vehicle_count(self.intersection.lanes.id(lane))?;
            report.queuing = report.queuing.saturating_add(count);
        }

        report.recommended = match &self.timing {
            Timing::Fixed { cycle_time } => onset.then_some(*cycle_time),
            Timing::Fuzzy {
                engine,
                on_no_rule_fired,
            } => recommend(engine, *on_no_rule_fired, &report)?,
        };

        if let Some(recommended) = report.recommended {
            let remaining = sim.time_until_next_switch(signal)?;
            let applied = clamp_to_remaining(remaining, recommended);
            sim.set_phase_duration(signal, applied)?;
            report.applied = Some(applied);
        }

        debug!(
            timestep,
            strategy = %self.strategy,
            phase,
            arriving = report.arriving,
            queuing = report.queuing,
            recommended = report.recommended,
            applied = report.applied,
            "Controller tick"
        );
        Ok(report)
    }
}

fn recommend(
    engine: &InferenceEngine,
    policy: NoRuleFiredPolicy,
    report: &TickReport,
) -> Result<Option<f64>, ControllerError> {
    let arriving = f64::from(report.arriving);
    let queuing = f64::from(report.queuing);
    match cycle_time::recommend(engine, arriving, queuing) {
        Ok(result) => Ok(Some(result.output)),
        Err(FuzzyError::NoRuleFired) if policy == NoRuleFiredPolicy::KeepSchedule => {
            warn!(
                timestep = report.timestep,
                arriving, queuing, "No rule fired, keeping the scheduled phase duration"
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::collections::BTreeMap;

    use cadence_fuzzy::cycle_time::{ARRIVING, QUEUING};
    use cadence_fuzzy::{SystemSpec, TermSpec, VariableSpec};
    use cadence_types::Lane;

    use super::*;
    use crate::config::LaneIds;
    use crate::simulation::check_duration;

    /// A simulator frozen at one instant, with settable readings.
    #[derive(Debug, Default)]
    struct FrozenSimulation {
        phase: u32,
        counts: BTreeMap<String, u32>,
        waiting: BTreeMap<String, f64>,
        remaining: f64,
        applied: Vec<f64>,
    }

    impl FrozenSimulation {
        fn new(phase: u32, remaining: f64) -> Self {
            Self {
                phase,
                remaining,
                ..Self::default()
            }
        }

        fn lane(mut self, lane: Lane, count: u32, waiting: f64) -> Self {
            let id = LaneIds::default().id(lane).to_owned();
            self.counts.insert(id.clone(), count);
            self.waiting.insert(id, waiting);
            self
        }
    }

    impl TrafficSimulation for FrozenSimulation {
        fn advance_one_step(&mut self) -> Result<(), SimulationError> {
            Ok(())
        }

        fn has_more_activity(&self) -> Result<bool, SimulationError> {
            Ok(true)
        }

        fn current_phase(&self, _signal: &str) -> Result<u32, SimulationError> {
            Ok(self.phase)
        }

        fn last_step_vehicle_count(&self, lane: &str) -> Result<u32, SimulationError> {
            Ok(self.counts.get(lane).copied().unwrap_or(0))
        }

        fn accumulated_waiting_time(&self, lane: &str) -> Result<f64, SimulationError> {
            Ok(self.waiting.get(lane).copied().unwrap_or(0.0))
        }

        fn set_phase_duration(
            &mut self,
            signal: &str,
            duration: f64,
        ) -> Result<(), SimulationError> {
            check_duration(signal, duration)?;
            self.remaining = duration;
            self.applied.push(duration);
            Ok(())
        }

        fn time_until_next_switch(&self, _signal: &str) -> Result<f64, SimulationError> {
            Ok(self.remaining)
        }

        fn current_simulated_time(&self) -> Result<f64, SimulationError> {
            Ok(0.0)
        }
    }

    fn fuzzy_controller() -> AdaptiveController {
        AdaptiveController::fuzzy(
            IntersectionConfig::default(),
            cycle_time::engine().unwrap(),
            NoRuleFiredPolicy::Abort,
        )
        .unwrap()
    }

    /// A cycle-time system whose "arriving" terms stop at 40 vehicles.
    fn gappy_spec() -> SystemSpec {
        let variable = |name: &str, term: &str, shape: [f64; 3]| VariableSpec {
            name: name.to_owned(),
            universe: [0.0, 100.0],
            terms: vec![TermSpec {
                name: term.to_owned(),
                shape: shape.try_into().unwrap(),
            }],
        };
        SystemSpec {
            inputs: vec![
                variable(ARRIVING, "light", [0.0, 0.0, 40.0]),
                variable(QUEUING, "any", [0.0, 0.0, 101.0]),
            ],
            output: variable("cycle_time", "short", [0.0, 0.0, 10.0]),
            rules: vec![cadence_fuzzy::Rule::new(
                &[(ARRIVING, "light"), (QUEUING, "any")],
                "short",
            )],
            resolution: 1.0,
        }
    }

    #[test]
    fn transition_phase_does_nothing() {
        let mut sim = FrozenSimulation::new(1, 3.0).lane(Lane::Lane1, 5, 20.0);
        let mut metrics = MetricsAggregator::new();
        let report = fuzzy_controller().tick(0, &mut sim, &mut metrics).unwrap();

        assert_eq!(report.group, None);
        assert_eq!(report.applied, None);
        assert!(sim.applied.is_empty());
        assert!(metrics.is_empty());
    }

    #[test]
    fn samples_only_green_lanes_with_traffic() {
        let mut sim = FrozenSimulation::new(0, 31.0)
            .lane(Lane::Lane1, 4, 10.0)
            .lane(Lane::Lane3, 0, 7.0)
            .lane(Lane::Lane2, 5, 50.0);
        let mut metrics = MetricsAggregator::new();
        let report = fuzzy_controller().tick(17, &mut sim, &mut metrics).unwrap();

        assert_eq!(report.arriving, 4);
        assert_eq!(report.queuing, 5);
        assert_eq!(
            metrics.export(Lane::Lane1, Strategy::Fuzzy),
            &[cadence_types::WaitTimeSample::new(17, 2.5)]
        );
        assert!(metrics.export(Lane::Lane3, Strategy::Fuzzy).is_empty());
        assert!(metrics.export(Lane::Lane2, Strategy::Fuzzy).is_empty());
    }

    #[test]
    fn applied_duration_never_exceeds_remaining() {
        let mut metrics = MetricsAggregator::new();
        let mut controller = fuzzy_controller();

        // An empty junction recommends the "short" centroid, 3 s.
        let mut sim = FrozenSimulation::new(0, 12.0);
        let report = controller.tick(0, &mut sim, &mut metrics).unwrap();
        assert!((report.recommended.unwrap() - 3.0).abs() < 1e-9);
        assert!((report.applied.unwrap() - 3.0).abs() < 1e-9);

        let mut sim = FrozenSimulation::new(0, 2.0);
        let report = controller.tick(1, &mut sim, &mut metrics).unwrap();
        assert_eq!(report.applied, Some(2.0));

        let mut sim = FrozenSimulation::new(0, -1.0);
        let report = controller.tick(2, &mut sim, &mut metrics).unwrap();
        assert_eq!(report.applied, Some(0.0));
        assert_eq!(sim.applied, vec![0.0]);
    }

    #[test]
    fn swapping_phase_and_lane_pairs_gives_the_same_duration() {
        let mut metrics = MetricsAggregator::new();
        let mut sim_a = FrozenSimulation::new(0, 31.0)
            .lane(Lane::Lane1, 6, 0.0)
            .lane(Lane::Lane3, 9, 0.0)
            .lane(Lane::Lane2, 2, 0.0)
            .lane(Lane::Lane4, 1, 0.0);
        let mut sim_b = FrozenSimulation::new(2, 31.0)
            .lane(Lane::Lane2, 6, 0.0)
            .lane(Lane::Lane4, 9, 0.0)
            .lane(Lane::Lane1, 2, 0.0)
            .lane(Lane::Lane3, 1, 0.0);

        let a = fuzzy_controller().tick(0, &mut sim_a, &mut metrics).unwrap();
        let b = fuzzy_controller().tick(0, &mut sim_b, &mut metrics).unwrap();

        assert_eq!(a.group, Some(PhaseGroup::A));
        assert_eq!(b.group, Some(PhaseGroup::B));
        assert_eq!((a.arriving, a.queuing), (b.arriving, b.queuing));
        assert_eq!(
            a.applied.map(f64::to_bits),
            b.applied.map(f64::to_bits)
        );
    }

    #[test]
    fn fixed_timing_applies_only_at_green_onset() {
        let mut controller = AdaptiveController::fixed(IntersectionConfig::default(), 30.0);
        let mut metrics = MetricsAggregator::new();

        let mut green_a = FrozenSimulation::new(0, 31.0).lane(Lane::Lane1, 2, 4.0);
        let onset = controller.tick(0, &mut green_a, &mut metrics).unwrap();
        assert_eq!(onset.applied, Some(30.0));

        let steady = controller.tick(1, &mut green_a, &mut metrics).unwrap();
        assert_eq!(steady.applied, None);

        let mut yellow = FrozenSimulation::new(1, 4.0);
        assert_eq!(controller.tick(2, &mut yellow, &mut metrics).unwrap().applied, None);

        let mut green_b = FrozenSimulation::new(2, 20.0);
        let onset_b = controller.tick(3, &mut green_b, &mut metrics).unwrap();
        assert_eq!(onset_b.applied, Some(20.0));

        assert_eq!(green_a.applied, vec![30.0]);
        assert_eq!(metrics.export(Lane::Lane1, Strategy::Fixed).len(), 2);
    }

    #[test]
    fn no_rule_fired_aborts_by_default() {
        let engine = gappy_spec().build().unwrap();
        let mut controller =
            AdaptiveController::fuzzy(IntersectionConfig::default(), engine, NoRuleFiredPolicy::Abort)
                .unwrap();
        let mut sim = FrozenSimulation::new(0, 31.0).lane(Lane::Lane1, 60, 0.0);
        let result = controller.tick(0, &mut sim, &mut MetricsAggregator::new());
        assert!(matches!(
            result,
            Err(ControllerError::Inference {
                source: FuzzyError::NoRuleFired
            })
        ));
    }

    #[test]
    fn no_rule_fired_can_keep_the_schedule() {
        let engine = gappy_spec().build().unwrap();
        let mut controller = AdaptiveController::fuzzy(
            IntersectionConfig::default(),
            engine,
            NoRuleFiredPolicy::KeepSchedule,
        )
        .unwrap();
        let mut sim = FrozenSimulation::new(0, 31.0).lane(Lane::Lane1, 60, 120.0);
        let mut metrics = MetricsAggregator::new();
        let report = controller.tick(0, &mut sim, &mut metrics).unwrap();

        assert_eq!(report.recommended, None);
        assert!(sim.applied.is_empty());
        assert_eq!(sim.remaining, 31.0);
        assert_eq!(metrics.export(Lane::Lane1, Strategy::Fuzzy).len(), 1);
    }

    #[test]
    fn system_with_other_inputs_is_rejected() {
        let mut spec = gappy_spec();
        if let Some(input) = spec.inputs.first_mut() {
            input.name = "pedestrians".to_owned();
        }
        spec.rules = vec![cadence_fuzzy::Rule::new(
            &[("pedestrians", "light"), (QUEUING, "any")],
            "short",
        )];
        let engine = spec.build().unwrap();
        let result = AdaptiveController::fuzzy(
            IntersectionConfig::default(),
            engine,
            NoRuleFiredPolicy::Abort,
        );
        assert!(matches!(result, Err(ControllerError::IncompatibleSystem { .. })));
    }

    #[test]
    fn from_config_picks_timing_by_strategy() {
        let config = SimulationConfig::default();
        let fixed = AdaptiveController::from_config(Strategy::Fixed, &config).unwrap();
        assert!(matches!(fixed.timing(), Timing::Fixed { cycle_time } if *cycle_time == 30.0));
        let fuzzy = AdaptiveController::from_config(Strategy::Fuzzy, &config).unwrap();
        assert_eq!(fuzzy.strategy(), Strategy::Fuzzy);
        assert_eq!(fuzzy.last_phase(), None);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_to_remaining(10.0, 4.0), 4.0);
        assert_eq!(clamp_to_remaining(4.0, 10.0), 4.0);
        assert_eq!(clamp_to_remaining(-3.0, 10.0), 0.0);
        assert_eq!(clamp_to_remaining(5.0, -2.0), 0.0);
    }
}
