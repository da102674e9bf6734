//! Declarative system definitions.
//!
//! A [`SystemSpec`] is the serializable form of an [`InferenceEngine`]:
//! variables as `{ name, universe, terms }` records and the rule base as a
//! table. [`SystemSpec::build`] performs every validation the engine needs,
//! so a spec loaded from YAML fails at startup rather than mid-run.

use serde::{Deserialize, Serialize};

use crate::engine::{DEFAULT_RESOLUTION, InferenceEngine};
use crate::error::FuzzyError;
use crate::membership::MembershipFunction;
use crate::rule::Rule;
use crate::variable::{FuzzyVariable, Universe};

/// Serializable definition of one linguistic variable.
///
/// Terms are kept as an ordered list so duplicate names are caught by
/// [`FuzzyVariable::define_term`] instead of silently collapsing in a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name.
    pub name: String,
    /// Universe bounds `[lo, hi]`.
    pub universe: [f64; 2],
    /// Terms in declaration order.
    pub terms: Vec<TermSpec>,
}

/// Serializable definition of one triangular term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSpec {
    /// Term name.
    pub name: String,
    /// Triangle breakpoints.
    pub shape: MembershipFunction,
}

impl VariableSpec {
    /// Build the runtime variable.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::InvalidUniverse`] or [`FuzzyError::DuplicateTerm`].
    pub fn build(&self) -> Result<FuzzyVariable, FuzzyError> {
        let [lo, hi] = self.universe;
        let universe = Universe::new(&self.name, lo, hi)?;
        let mut variable = FuzzyVariable::new(self.name.clone(), universe);
        for term in &self.terms {
            variable.define_term(&term.name, term.shape)?;
        }
        Ok(variable)
    }
}

const fn default_resolution() -> f64 {
    DEFAULT_RESOLUTION
}

/// Serializable definition of a complete fuzzy system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    /// Antecedent variables.
    pub inputs: Vec<VariableSpec>,
    /// Consequent variable.
    pub output: VariableSpec,
    /// Rule base in evaluation order.
    pub rules: Vec<Rule>,
    /// Defuzzification sampling step.
    #[serde(default = "default_resolution")]
    pub resolution: f64,
}

impl SystemSpec {
    /// Validate the spec and build an engine.
    ///
    /// # Errors
    ///
    /// Any [`FuzzyError`] configuration variant.
    pub fn build(&self) -> Result<InferenceEngine, FuzzyError> {
        let inputs = self
            .inputs
            .iter()
            .map(VariableSpec::build)
            .collect::<Result<Vec<_>, _>>()?;
        let output = self.output.build()?;
        InferenceEngine::new(inputs, output, self.rules.clone())?.with_resolution(self.resolution)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const YAML: &str = r"
inputs:
  - name: load
    universe: [0, 50]
    terms:
      - { name: light, shape: [0, 0, 30] }
      - { name: heavy, shape: [20, 50, 50] }
output:
  name: green
  universe: [0, 60]
  terms:
    - { name: short, shape: [0, 0, 20] }
    - { name: long, shape: [30, 60, 60] }
rules:
  - when: [{ variable: load, term: light }]
    then: short
  - when: [{ variable: load, term: heavy }]
    then: long
";

    #[test]
    fn builds_from_yaml() {
        let spec: SystemSpec = serde_yml::from_str(YAML).unwrap();
        let engine = spec.build().unwrap();
        assert_eq!(engine.rules().len(), 2);
        assert!((engine.resolution() - 1.0).abs() < f64::EPSILON);
        assert_eq!(engine.output().name(), "green");
    }

    #[test]
    fn invalid_shape_fails_at_load() {
        let broken = YAML.replace("[20, 50, 50]", "[50, 20, 50]");
        let parsed: Result<SystemSpec, _> = serde_yml::from_str(&broken);
        assert!(parsed.is_err());
    }

    #[test]
    fn duplicate_term_fails_at_build() {
        let mut spec: SystemSpec = serde_yml::from_str(YAML).unwrap();
        let first = spec.output.terms.first().cloned().unwrap();
        spec.output.terms.push(first);
        assert!(matches!(spec.build(), Err(FuzzyError::DuplicateTerm { .. })));
    }

    #[test]
    fn invalid_universe_fails_at_build() {
        let mut spec: SystemSpec = serde_yml::from_str(YAML).unwrap();
        spec.output.universe = [60.0, 0.0];
        assert!(matches!(spec.build(), Err(FuzzyError::InvalidUniverse { .. })));
    }
}
