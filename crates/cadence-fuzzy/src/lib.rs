//! Fuzzy inference for the Cadence adaptive signal controller.
//!
//! Triangular fuzzy sets, min/max (Mamdani) rule evaluation, and discrete
//! centroid defuzzification. The engine is general over variable and rule
//! count; [`cycle_time`] ships the two-input green-time controller.
//!
//! # Modules
//!
//! - [`membership`] -- Triangular membership functions.
//! - [`variable`] -- Linguistic variables and their universes.
//! - [`rule`] -- Antecedent clauses, rules, and firing strength.
//! - [`engine`] -- Aggregation, defuzzification, and [`InferenceEngine`].
//! - [`spec`] -- Serializable system definitions loaded from configuration.
//! - [`cycle_time`] -- The shipped arriving/queuing -> cycle-time system.
//! - [`error`] -- [`FuzzyError`].

pub mod cycle_time;
pub mod engine;
pub mod error;
pub mod membership;
pub mod rule;
pub mod spec;
pub mod variable;

pub use engine::{InferenceEngine, InferenceResult, Inputs, centroid};
pub use error::FuzzyError;
pub use membership::MembershipFunction;
pub use rule::{Clause, Rule};
pub use spec::{SystemSpec, TermSpec, VariableSpec};
pub use variable::{FuzzyVariable, Universe};
