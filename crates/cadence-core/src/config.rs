//! Configuration loading and typed config structures for Cadence.
//!
//! The canonical configuration lives in `cadence-config.yaml` in the working
//! directory; `CADENCE_CONFIG` points the loader somewhere else. Every field
//! has a default, so a partial file (or no file at all) is valid.

use std::path::{Path, PathBuf};

use cadence_fuzzy::{FuzzyError, SystemSpec, cycle_time};
use cadence_types::{Lane, PhaseGroup};
use serde::Deserialize;

/// Config file looked up in the working directory when no override is set.
pub const DEFAULT_CONFIG_PATH: &str = "cadence-config.yaml";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "CADENCE_CONFIG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The custom fuzzy system does not build.
    #[error("invalid fuzzy system: {source}")]
    Fuzzy {
        /// The underlying fuzzy system error.
        #[from]
        source: FuzzyError,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `cadence-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Demand size, seed, and run bounds.
    #[serde(default)]
    pub simulation: RunConfig,

    /// Signal and lane identifiers plus the intersection model's timings.
    #[serde(default)]
    pub intersection: IntersectionConfig,

    /// Controller policies.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Custom fuzzy system. `None` uses the shipped cycle-time controller.
    #[serde(default)]
    pub fuzzy: Option<SystemSpec>,

    /// Where results are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or any error
    /// from [`validate`](Self::validate).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or any
    /// error from [`validate`](Self::validate).
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the config file: `$CADENCE_CONFIG` if set, otherwise
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Check value ranges that serde cannot express, and build the custom
    /// fuzzy system if one is configured so a broken rule table stops the
    /// run before any session starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field, or
    /// [`ConfigError::Fuzzy`] if the custom fuzzy system does not build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.step_count == 0 {
            return Err(invalid("simulation.step_count", "must be positive"));
        }
        non_negative("simulation.fixed_cycle_time", self.simulation.fixed_cycle_time)?;
        positive("intersection.green_time", self.intersection.green_time)?;
        non_negative("intersection.yellow_time", self.intersection.yellow_time)?;
        if self.intersection.discharge_headway == 0 {
            return Err(invalid("intersection.discharge_headway", "must be positive"));
        }
        if self.intersection.phase_a == self.intersection.phase_b {
            return Err(invalid(
                "intersection.phase_b",
                "must differ from intersection.phase_a",
            ));
        }
        if let Some(spec) = &self.fuzzy {
            let engine = spec.build()?;
            if !cycle_time::has_cycle_time_inputs(&engine) {
                return Err(invalid(
                    "fuzzy.inputs",
                    "must be exactly arriving_vehicles and queuing_vehicles",
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("{value} is not a finite, non-negative number")))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("{value} is not a finite, positive number")))
    }
}

/// Demand and run-bound configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Expected number of generated vehicles.
    #[serde(default = "default_car_count")]
    pub car_count: u32,

    /// Number of departure steps in the generated demand.
    #[serde(default = "default_step_count")]
    pub step_count: u32,

    /// Seed for demand generation.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Green time in seconds applied by the fixed-time baseline.
    #[serde(default = "default_fixed_cycle_time")]
    pub fixed_cycle_time: f64,

    /// Hard cap on steps per session. 0 runs until the network drains.
    #[serde(default)]
    pub max_steps: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            car_count: default_car_count(),
            step_count: default_step_count(),
            random_seed: default_random_seed(),
            fixed_cycle_time: default_fixed_cycle_time(),
            max_steps: 0,
        }
    }
}

/// Simulator-side identifiers of the four monitored lanes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LaneIds {
    /// Lane 1 (phase group A).
    #[serde(default = "default_lane1")]
    pub lane1: String,
    /// Lane 2 (phase group B).
    #[serde(default = "default_lane2")]
    pub lane2: String,
    /// Lane 3 (phase group A).
    #[serde(default = "default_lane3")]
    pub lane3: String,
    /// Lane 4 (phase group B).
    #[serde(default = "default_lane4")]
    pub lane4: String,
}

impl LaneIds {
    /// The simulator id of a lane.
    pub fn id(&self, lane: Lane) -> &str {
        match lane {
            Lane::Lane1 => &self.lane1,
            Lane::Lane2 => &self.lane2,
            Lane::Lane3 => &self.lane3,
            Lane::Lane4 => &self.lane4,
        }
    }

    /// The lane with the given simulator id, if any.
    pub fn lane(&self, id: &str) -> Option<Lane> {
        Lane::ALL.into_iter().find(|&lane| self.id(lane) == id)
    }
}

impl Default for LaneIds {
    fn default() -> Self {
        Self {
            lane1: default_lane1(),
            lane2: default_lane2(),
            lane3: default_lane3(),
            lane4: default_lane4(),
        }
    }
}

/// The controlled junction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntersectionConfig {
    /// Simulator id of the traffic light.
    #[serde(default = "default_signal_id")]
    pub signal_id: String,

    /// Simulator ids of the monitored lanes.
    #[serde(default)]
    pub lanes: LaneIds,

    /// Program phase index in which lanes 1 and 3 have green.
    #[serde(default)]
    pub phase_a: u32,

    /// Program phase index in which lanes 2 and 4 have green.
    #[serde(default = "default_phase_b")]
    pub phase_b: u32,

    /// Scheduled green duration in seconds before any controller override.
    #[serde(default = "default_green_time")]
    pub green_time: f64,

    /// Yellow duration in seconds between greens.
    #[serde(default = "default_yellow_time")]
    pub yellow_time: f64,

    /// Steps a vehicle travels from departure to the stop line.
    #[serde(default = "default_approach_steps")]
    pub approach_steps: u64,

    /// Steps between consecutive vehicles crossing the stop line on green.
    #[serde(default = "default_discharge_headway")]
    pub discharge_headway: u64,
}

impl IntersectionConfig {
    /// The phase group served in program phase `phase`, or `None` for
    /// transition phases.
    pub const fn phase_group(&self, phase: u32) -> Option<PhaseGroup> {
        if phase == self.phase_a {
            Some(PhaseGroup::A)
        } else if phase == self.phase_b {
            Some(PhaseGroup::B)
        } else {
            None
        }
    }
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            signal_id: default_signal_id(),
            lanes: LaneIds::default(),
            phase_a: 0,
            phase_b: default_phase_b(),
            green_time: default_green_time(),
            yellow_time: default_yellow_time(),
            approach_steps: default_approach_steps(),
            discharge_headway: default_discharge_headway(),
        }
    }
}

/// What the fuzzy controller does when its rule base produces an all-zero
/// output profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoRuleFiredPolicy {
    /// Propagate the error and end the session.
    #[default]
    Abort,
    /// Log a warning and leave the scheduled phase duration untouched.
    KeepSchedule,
}

/// Controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ControllerConfig {
    /// Reaction to an inference pass in which no rule fired.
    #[serde(default)]
    pub on_no_rule_fired: NoRuleFiredPolicy,
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Root output directory.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// File name of the generated route file, relative to `directory`.
    #[serde(default = "default_route_file")]
    pub route_file: String,
}

impl OutputConfig {
    /// Directory holding the CSV series and the run summary.
    pub fn statistics_dir(&self) -> PathBuf {
        self.directory.join("statistics")
    }

    /// Full path of the generated route file.
    pub fn route_path(&self) -> PathBuf {
        self.directory.join(&self.route_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            route_file: default_route_file(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_car_count() -> u32 {
    3000
}

const fn default_step_count() -> u32 {
    3600
}

const fn default_random_seed() -> u64 {
    42
}

const fn default_fixed_cycle_time() -> f64 {
    30.0
}

fn default_lane1() -> String {
    "E0_0".to_owned()
}

fn default_lane2() -> String {
    "E2_0".to_owned()
}

fn default_lane3() -> String {
    "-E1_0".to_owned()
}

fn default_lane4() -> String {
    "-E3_0".to_owned()
}

fn default_signal_id() -> String {
    "J2".to_owned()
}

const fn default_phase_b() -> u32 {
    2
}

const fn default_green_time() -> f64 {
    31.0
}

const fn default_yellow_time() -> f64 {
    4.0
}

const fn default_approach_steps() -> u64 {
    10
}

const fn default_discharge_headway() -> u64 {
    1
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_route_file() -> String {
    "traffic.rou.xml".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.car_count, 3000);
        assert_eq!(config.simulation.step_count, 3600);
        assert_eq!(config.simulation.random_seed, 42);
        assert_eq!(config.intersection.signal_id, "J2");
        assert_eq!(config.intersection.phase_b, 2);
        assert_eq!(config.controller.on_no_rule_fired, NoRuleFiredPolicy::Abort);
        assert!(config.fuzzy.is_none());
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config =
            SimulationConfig::parse(include_str!("../../../cadence-config.yaml")).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r#"
simulation:
  car_count: 600
  fixed_cycle_time: 25
  max_steps: 2000
intersection:
  lanes:
    lane3: "west_in_0"
controller:
  on_no_rule_fired: keep_schedule
output:
  directory: "/tmp/cadence"
logging:
  level: "debug"
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.simulation.car_count, 600);
        assert_eq!(config.simulation.step_count, 3600);
        assert!((config.simulation.fixed_cycle_time - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.simulation.max_steps, 2000);
        assert_eq!(config.intersection.lanes.id(Lane::Lane3), "west_in_0");
        assert_eq!(config.intersection.lanes.id(Lane::Lane1), "E0_0");
        assert_eq!(
            config.controller.on_no_rule_fired,
            NoRuleFiredPolicy::KeepSchedule
        );
        assert_eq!(
            config.output.statistics_dir(),
            PathBuf::from("/tmp/cadence/statistics")
        );
        assert_eq!(config.logging.level, "debug");
    }

    const CUSTOM_FUZZY: &str = r"
fuzzy:
  inputs:
    - name: arriving_vehicles
      universe: [0, 100]
      terms:
        - { name: light, shape: [0, 0, 60] }
        - { name: heavy, shape: [40, 100, 100] }
    - name: queuing_vehicles
      universe: [0, 100]
      terms:
        - { name: any, shape: [0, 50, 100] }
  output:
    name: cycle_time
    universe: [0, 100]
    terms:
      - { name: short, shape: [0, 0, 20] }
      - { name: long, shape: [20, 60, 60] }
  rules:
    - when: [{ variable: arriving_vehicles, term: light }]
      then: short
    - when: [{ variable: arriving_vehicles, term: heavy }, { variable: queuing_vehicles, term: any }]
      then: long
";

    #[test]
    fn custom_fuzzy_system_parses() {
        let config = SimulationConfig::parse(CUSTOM_FUZZY).unwrap();
        let engine = config.fuzzy.unwrap().build().unwrap();
        assert_eq!(engine.rules().len(), 2);
    }

    #[test]
    fn unknown_rule_term_fails_at_load() {
        let yaml = CUSTOM_FUZZY.replace(
            "{ variable: arriving_vehicles, term: heavy }",
            "{ variable: arriving_vehicles, term: gridlock }",
        );
        let result = SimulationConfig::parse(&yaml);
        assert!(matches!(
            result,
            Err(ConfigError::Fuzzy {
                source: FuzzyError::UnknownTerm { ref term, .. }
            }) if term == "gridlock"
        ));
    }

    #[test]
    fn unknown_rule_variable_fails_at_load() {
        let yaml = CUSTOM_FUZZY.replace(
            "{ variable: queuing_vehicles, term: any }",
            "{ variable: pedestrians, term: any }",
        );
        let result = SimulationConfig::parse(&yaml);
        assert!(matches!(
            result,
            Err(ConfigError::Fuzzy {
                source: FuzzyError::UnknownVariable(_)
            })
        ));
    }

    #[test]
    fn fuzzy_system_with_other_inputs_fails_at_load() {
        let yaml = CUSTOM_FUZZY.replace("queuing_vehicles", "waiting_vehicles");
        let result = SimulationConfig::parse(&yaml);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "fuzzy.inputs",
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let negative = SimulationConfig::parse("simulation: { fixed_cycle_time: -5 }");
        assert!(matches!(
            negative,
            Err(ConfigError::Invalid {
                field: "simulation.fixed_cycle_time",
                ..
            })
        ));

        let same_phase = SimulationConfig::parse("intersection: { phase_a: 2, phase_b: 2 }");
        assert!(matches!(same_phase, Err(ConfigError::Invalid { .. })));

        let no_steps = SimulationConfig::parse("simulation: { step_count: 0 }");
        assert!(matches!(no_steps, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn bad_policy_is_a_yaml_error() {
        let result = SimulationConfig::parse("controller: { on_no_rule_fired: retry }");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn phase_groups_follow_configured_indices() {
        let config = IntersectionConfig::default();
        assert_eq!(config.phase_group(0), Some(PhaseGroup::A));
        assert_eq!(config.phase_group(1), None);
        assert_eq!(config.phase_group(2), Some(PhaseGroup::B));
        assert_eq!(config.phase_group(3), None);
    }

    #[test]
    fn lane_lookup_by_id() {
        let lanes = LaneIds::default();
        assert_eq!(lanes.lane("-E3_0"), Some(Lane::Lane4));
        assert_eq!(lanes.lane("E9_0"), None);
    }
}
