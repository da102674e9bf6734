//! The shipped green-time controller.
//!
//! Two inputs over `[0, 100]` vehicles:
//!
//! | term   | arriving / queuing |
//! |--------|--------------------|
//! | low    | `[0, 0, 10]`       |
//! | medium | `[7, 10, 25]`      |
//! | high   | `[20, 101, 101]`   |
//!
//! One output over `[0, 100]` seconds:
//!
//! | term   | cycle time    |
//! |--------|---------------|
//! | short  | `[0, 0, 10]`  |
//! | medium | `[7, 20, 25]` |
//! | long   | `[20, 50, 50]`|
//!
//! "high" peaks past the universe bound, so counts saturate near 1 instead of
//! falling off at 100. The gap between the top of "low" (10) and the foot of
//! "high" (20) biases the controller toward long greens while the opposing
//! queue is short.
//!
//! Rule table (arriving x queuing -> cycle time):
//!
//! | arriving \ queuing | low   | medium | high  |
//! |--------------------|-------|--------|-------|
//! | high               | long  | medium | short |
//! | medium             | long  | medium | short |
//! | low                | short | medium | short |

use crate::engine::{DEFAULT_RESOLUTION, InferenceEngine, InferenceResult, Inputs};
use crate::error::FuzzyError;
use crate::membership::MembershipFunction;
use crate::rule::Rule;
use crate::spec::{SystemSpec, TermSpec, VariableSpec};

/// Vehicles on the lanes that currently have green.
pub const ARRIVING: &str = "arriving_vehicles";
/// Vehicles on the lanes that currently have red.
pub const QUEUING: &str = "queuing_vehicles";
/// Recommended green time in seconds.
pub const CYCLE_TIME: &str = "cycle_time";

/// Inputs a cycle-time system must declare, in the sorted order
/// [`InferenceEngine::input_names`] yields them.
pub const INPUT_NAMES: [&str; 2] = [ARRIVING, QUEUING];

const COUNT_UNIVERSE: [f64; 2] = [0.0, 100.0];
const COUNT_TERMS: [(&str, [f64; 3]); 3] = [
    ("low", [0.0, 0.0, 10.0]),
    ("medium", [7.0, 10.0, 25.0]),
    ("high", [20.0, 101.0, 101.0]),
];
const CYCLE_TERMS: [(&str, [f64; 3]); 3] = [
    ("short", [0.0, 0.0, 10.0]),
    ("medium", [7.0, 20.0, 25.0]),
    ("long", [20.0, 50.0, 50.0]),
];
const RULES: [(&str, &str, &str); 9] = [
    ("high", "low", "long"),
    ("high", "medium", "medium"),
    ("high", "high", "short"),
    ("medium", "low", "long"),
    ("medium", "medium", "medium"),
    ("medium", "high", "short"),
    ("low", "low", "short"),
    ("low", "medium", "medium"),
    ("low", "high", "short"),
];

fn variable(name: &str, terms: &[(&str, [f64; 3])]) -> Result<VariableSpec, FuzzyError> {
    let terms = terms
        .iter()
        .map(|&(term, shape)| {
            Ok(TermSpec {
                name: term.to_owned(),
                shape: MembershipFunction::try_from(shape)?,
            })
        })
        .collect::<Result<Vec<_>, FuzzyError>>()?;
    Ok(VariableSpec {
        name: name.to_owned(),
        universe: COUNT_UNIVERSE,
        terms,
    })
}

/// The declarative definition of the shipped controller.
///
/// # Errors
///
/// Only if the built-in table is malformed, which the tests rule out.
pub fn system_spec() -> Result<SystemSpec, FuzzyError> {
    let rules = RULES
        .iter()
        .map(|&(arriving, queuing, cycle)| {
            Rule::new(&[(ARRIVING, arriving), (QUEUING, queuing)], cycle)
        })
        .collect();
    Ok(SystemSpec {
        inputs: vec![variable(ARRIVING, &COUNT_TERMS)?, variable(QUEUING, &COUNT_TERMS)?],
        output: variable(CYCLE_TIME, &CYCLE_TERMS)?,
        rules,
        resolution: DEFAULT_RESOLUTION,
    })
}

/// Build the shipped controller's engine.
///
/// # Errors
///
/// Only if the built-in table is malformed, which the tests rule out.
pub fn engine() -> Result<InferenceEngine, FuzzyError> {
    system_spec()?.build()
}

/// Whether `engine` takes exactly the arriving and queuing counts, so the
/// controller can feed it.
pub fn has_cycle_time_inputs(engine: &InferenceEngine) -> bool {
    engine.input_names().eq(INPUT_NAMES)
}

/// Input snapshot for a cycle-time engine.
pub fn inputs(arriving: f64, queuing: f64) -> Inputs {
    Inputs::new().with(ARRIVING, arriving).with(QUEUING, queuing)
}

/// Recommend a green time for the given counts.
///
/// # Errors
///
/// Propagates [`FuzzyError`] from the engine, including
/// [`FuzzyError::NoRuleFired`] for a custom system with a coverage gap.
pub fn recommend(
    engine: &InferenceEngine,
    arriving: f64,
    queuing: f64,
) -> Result<InferenceResult, FuzzyError> {
    engine.evaluate(&inputs(arriving, queuing))
}
