//! Mamdani inference with min/max composition and centroid defuzzification.
//!
//! One call to [`InferenceEngine::evaluate`] runs the whole pipeline:
//!
//! 1. **Fire** -- each rule's strength is the minimum of its clause degrees.
//! 2. **Aggregate** -- each output term is clipped at the strongest rule that
//!    concludes it; the output profile is the point-wise maximum of the
//!    clipped terms. Rules with zero strength contribute nothing.
//! 3. **Defuzzify** -- the output universe is sampled at a fixed resolution
//!    (1.0 by default) and the discrete centroid `sum(x * mu) / sum(mu)` is
//!    returned.
//!
//! An all-zero profile has no centroid and is reported as
//! [`FuzzyError::NoRuleFired`] instead of a silent zero.
//!
//! The engine is immutable after construction, so identical inputs always
//! produce bit-identical outputs.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::FuzzyError;
use crate::rule::Rule;
use crate::variable::FuzzyVariable;

/// Sampling step of the output universe used for centroid defuzzification.
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// A crisp input snapshot keyed by input variable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs(BTreeMap<String, f64>);

impl Inputs {
    /// An empty snapshot.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, variable: &str, value: f64) -> Self {
        self.set(variable, value);
        self
    }

    /// Set (or replace) the value of an input variable.
    pub fn set(&mut self, variable: &str, value: f64) {
        self.0.insert(variable.to_owned(), value);
    }

    /// Value of an input variable, if present.
    pub fn get(&self, variable: &str) -> Option<f64> {
        self.0.get(variable).copied()
    }

    /// The underlying name-to-value map.
    pub const fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }
}

/// Output of one inference pass.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// The defuzzified crisp output.
    pub output: f64,
    /// Firing strength of every rule, in rule-base order.
    pub firing_strengths: Vec<f64>,
}

impl InferenceResult {
    /// Index and strength of the strongest rule (first one on ties).
    pub fn strongest_rule(&self) -> Option<(usize, f64)> {
        self.firing_strengths
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (index, strength)| match best {
                Some((_, top)) if top >= strength => best,
                _ => Some((index, strength)),
            })
    }
}

/// A validated fuzzy system: input variables, one output variable, and an
/// ordered rule base.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    inputs: BTreeMap<String, FuzzyVariable>,
    output: FuzzyVariable,
    rules: Vec<Rule>,
    resolution: f64,
}

impl InferenceEngine {
    /// Assemble and validate a system.
    ///
    /// # Errors
    ///
    /// - [`FuzzyError::DuplicateVariable`] if two variables share a name
    /// - [`FuzzyError::EmptyRuleBase`] if `rules` is empty
    /// - [`FuzzyError::EmptyAntecedent`] if a rule has no clauses
    /// - [`FuzzyError::UnknownVariable`] / [`FuzzyError::UnknownTerm`] if a
    ///   rule references an undeclared name
    pub fn new(
        inputs: Vec<FuzzyVariable>,
        output: FuzzyVariable,
        rules: Vec<Rule>,
    ) -> Result<Self, FuzzyError> {
        let mut by_name = BTreeMap::new();
        for variable in inputs {
            let name = variable.name().to_owned();
            if name == output.name() || by_name.contains_key(&name) {
                return Err(FuzzyError::DuplicateVariable(name));
            }
            by_name.insert(name, variable);
        }

        if rules.is_empty() {
            return Err(FuzzyError::EmptyRuleBase);
        }

        let engine = Self {
            inputs: by_name,
            output,
            rules,
            resolution: DEFAULT_RESOLUTION,
        };
        for (index, rule) in engine.rules.iter().enumerate() {
            engine.validate_rule(index, rule)?;
        }
        Ok(engine)
    }

    /// Replace the defuzzification sampling step.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::InvalidResolution`] unless `step` is positive
    /// and finite.
    pub fn with_resolution(mut self, step: f64) -> Result<Self, FuzzyError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(FuzzyError::InvalidResolution(step));
        }
        self.resolution = step;
        Ok(self)
    }

    fn validate_rule(&self, index: usize, rule: &Rule) -> Result<(), FuzzyError> {
        if rule.when.is_empty() {
            return Err(FuzzyError::EmptyAntecedent { index });
        }
        for clause in &rule.when {
            let variable = self
                .inputs
                .get(&clause.variable)
                .ok_or_else(|| FuzzyError::UnknownVariable(clause.variable.clone()))?;
            if !variable.has_term(&clause.term) {
                return Err(FuzzyError::UnknownTerm {
                    variable: clause.variable.clone(),
                    term: clause.term.clone(),
                });
            }
        }
        if !self.output.has_term(&rule.then) {
            return Err(FuzzyError::UnknownTerm {
                variable: self.output.name().to_owned(),
                term: rule.then.clone(),
            });
        }
        Ok(())
    }

    /// The rule base in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The output variable.
    pub const fn output(&self) -> &FuzzyVariable {
        &self.output
    }

    /// An input variable by name.
    pub fn input(&self, name: &str) -> Option<&FuzzyVariable> {
        self.inputs.get(name)
    }

    /// Names of the declared input variables.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    /// The defuzzification sampling step.
    pub const fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Firing strength of every rule for the given snapshot.
    ///
    /// # Errors
    ///
    /// - [`FuzzyError::UnknownVariable`] if the snapshot names an undeclared input
    /// - [`FuzzyError::NonFiniteInput`] if a value is NaN or infinite
    /// - [`FuzzyError::MissingInput`] if a declared input has no value
    pub fn firing_strengths(&self, inputs: &Inputs) -> Result<Vec<f64>, FuzzyError> {
        for (name, &value) in inputs.as_map() {
            if !self.inputs.contains_key(name) {
                return Err(FuzzyError::UnknownVariable(name.clone()));
            }
            if !value.is_finite() {
                return Err(FuzzyError::NonFiniteInput {
                    variable: name.clone(),
                    value,
                });
            }
        }
        if let Some(missing) = self.inputs.keys().find(|name| inputs.get(name).is_none()) {
            return Err(FuzzyError::MissingInput(missing.clone()));
        }

        self.rules
            .iter()
            .map(|rule| rule.firing_strength(&self.inputs, inputs.as_map()))
            .collect()
    }

    /// The aggregated output profile as `(x, mu(x))` pairs over the sampled
    /// output universe.
    ///
    /// `strengths` must be aligned with [`rules`](Self::rules); surplus
    /// entries on either side are ignored.
    pub fn aggregate(&self, strengths: &[f64]) -> Vec<(f64, f64)> {
        // Clipping the same term at several strengths and taking the max is
        // the same as clipping once at the largest strength.
        let mut activation: BTreeMap<&str, f64> = BTreeMap::new();
        for (rule, &strength) in self.rules.iter().zip(strengths) {
            if strength > 0.0 {
                let level = activation.entry(rule.then.as_str()).or_insert(0.0);
                *level = level.max(strength);
            }
        }

        let clipped: Vec<_> = activation
            .iter()
            .filter_map(|(&term, &level)| self.output.term(term).map(|mf| (mf, level)))
            .collect();

        self.output
            .universe()
            .grid(self.resolution)
            .map(|x| {
                let mu = clipped
                    .iter()
                    .fold(0.0_f64, |acc, (mf, level)| acc.max(mf.evaluate(x).min(*level)));
                (x, mu)
            })
            .collect()
    }

    /// Run fire, aggregate, and defuzzify, keeping per-rule diagnostics.
    ///
    /// # Errors
    ///
    /// Any error from [`firing_strengths`](Self::firing_strengths), or
    /// [`FuzzyError::NoRuleFired`] if the aggregated profile is zero
    /// everywhere.
    pub fn evaluate(&self, inputs: &Inputs) -> Result<InferenceResult, FuzzyError> {
        let firing_strengths = self.firing_strengths(inputs)?;
        let profile = self.aggregate(&firing_strengths);
        let output = centroid(&profile).ok_or(FuzzyError::NoRuleFired)?;
        trace!(output, ?firing_strengths, "Inference complete");
        Ok(InferenceResult {
            output,
            firing_strengths,
        })
    }

    /// Defuzzified output only.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn infer(&self, inputs: &Inputs) -> Result<f64, FuzzyError> {
        self.evaluate(inputs).map(|result| result.output)
    }
}

/// Discrete centroid of a sampled profile; `None` when the total mass is 0.
pub fn centroid(profile: &[(f64, f64)]) -> Option<f64> {
    let (weighted, mass) = profile
        .iter()
        .fold((0.0_f64, 0.0_f64), |(weighted, mass), &(x, mu)| {
            (x.mul_add(mu, weighted), mass + mu)
        });
    (mass > 0.0).then(|| weighted / mass)
}
