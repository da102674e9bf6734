//! Error types for the `cadence-fuzzy` crate.
//!
//! Everything except [`FuzzyError::NoRuleFired`], [`FuzzyError::MissingInput`]
//! and [`FuzzyError::NonFiniteInput`] is a configuration error raised while a
//! system is being assembled; a successfully built engine never produces one.

/// Errors that can occur while building or evaluating a fuzzy system.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FuzzyError {
    /// Triangle breakpoints are out of order or not finite.
    #[error("invalid triangular shape ({a}, {b}, {c}): breakpoints must be finite with a <= b <= c")]
    InvalidShape {
        /// Left foot.
        a: f64,
        /// Peak.
        b: f64,
        /// Right foot.
        c: f64,
    },

    /// A universe bound is not finite or `lo >= hi`.
    #[error("invalid universe [{lo}, {hi}] for variable {variable}")]
    InvalidUniverse {
        /// The variable being defined.
        variable: String,
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },

    /// A term with this name already exists on the variable.
    #[error("term {term} already defined on variable {variable}")]
    DuplicateTerm {
        /// The variable.
        variable: String,
        /// The duplicated term name.
        term: String,
    },

    /// Two variables of the same system share a name.
    #[error("variable {0} declared more than once")]
    DuplicateVariable(String),

    /// A term name is not declared on the variable.
    #[error("unknown term {term} on variable {variable}")]
    UnknownTerm {
        /// The variable that was queried.
        variable: String,
        /// The missing term.
        term: String,
    },

    /// A variable name is not declared in the system.
    #[error("unknown variable {0}")]
    UnknownVariable(String),

    /// A rule has no antecedent clauses.
    #[error("rule {index} has an empty antecedent")]
    EmptyAntecedent {
        /// Position of the rule in the rule base.
        index: usize,
    },

    /// The defuzzification step is not a positive finite number.
    #[error("invalid defuzzification resolution {0}")]
    InvalidResolution(f64),

    /// The rule base is empty.
    #[error("rule base is empty")]
    EmptyRuleBase,

    /// The inference snapshot lacks a value for a declared input.
    #[error("no input value supplied for variable {0}")]
    MissingInput(String),

    /// An input value is NaN or infinite.
    #[error("input {variable} is not finite: {value}")]
    NonFiniteInput {
        /// The input variable.
        variable: String,
        /// The offending value.
        value: f64,
    },

    /// No rule has a nonzero firing strength, so the aggregated output is
    /// zero everywhere and the centroid is undefined.
    #[error("no rule fired; aggregated output profile is empty")]
    NoRuleFired,
}
