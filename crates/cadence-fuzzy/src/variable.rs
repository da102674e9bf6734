//! Linguistic variables: named collections of terms over a numeric universe.
//!
//! Input values are clamped into the universe before a term is evaluated.
//! An open-ended term such as `high = [20, 101, 101]` on `[0, 100]` therefore
//! saturates: every count at or above the upper bound reads the same degree
//! as the bound itself.

use std::collections::BTreeMap;

use crate::error::FuzzyError;
use crate::membership::MembershipFunction;

/// The closed numeric domain `[lo, hi]` of a fuzzy variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Universe {
    lo: f64,
    hi: f64,
}

impl Universe {
    /// Create a universe, validating that both bounds are finite and
    /// `lo < hi`.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::InvalidUniverse`] for empty or non-finite bounds.
    pub fn new(variable: &str, lo: f64, hi: f64) -> Result<Self, FuzzyError> {
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(FuzzyError::InvalidUniverse {
                variable: variable.to_owned(),
                lo,
                hi,
            });
        }
        Ok(Self { lo, hi })
    }

    /// Lower bound.
    pub const fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper bound.
    pub const fn hi(&self) -> f64 {
        self.hi
    }

    /// Clamp `x` into `[lo, hi]`.
    pub const fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lo, self.hi)
    }

    /// Sample points `lo, lo + step, ...` up to and including `hi` when it
    /// falls on the grid.
    ///
    /// A non-positive or non-finite step yields only `lo`.
    pub fn grid(&self, step: f64) -> impl Iterator<Item = f64> {
        let Self { lo, hi } = *self;
        let step = (step.is_finite() && step > 0.0).then_some(step);
        let mut index: u32 = 0;
        core::iter::from_fn(move || {
            let x = match (index, step) {
                (0, _) => lo,
                (_, Some(step)) => f64::from(index).mul_add(step, lo),
                (_, None) => return None,
            };
            if x > hi {
                return None;
            }
            index = index.checked_add(1)?;
            Some(x)
        })
    }
}

/// A linguistic variable with named triangular terms.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyVariable {
    name: String,
    universe: Universe,
    terms: BTreeMap<String, MembershipFunction>,
}

impl FuzzyVariable {
    /// Create a variable with no terms.
    pub const fn new(name: String, universe: Universe) -> Self {
        Self {
            name,
            universe,
            terms: BTreeMap::new(),
        }
    }

    /// Add a term.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::DuplicateTerm`] if the name is already defined.
    pub fn define_term(&mut self, term: &str, mf: MembershipFunction) -> Result<(), FuzzyError> {
        if self.terms.contains_key(term) {
            return Err(FuzzyError::DuplicateTerm {
                variable: self.name.clone(),
                term: term.to_owned(),
            });
        }
        self.terms.insert(term.to_owned(), mf);
        Ok(())
    }

    /// Builder form of [`define_term`](Self::define_term).
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::DuplicateTerm`] if the name is already defined.
    pub fn with_term(mut self, term: &str, mf: MembershipFunction) -> Result<Self, FuzzyError> {
        self.define_term(term, mf)?;
        Ok(self)
    }

    /// Degree to which `value` belongs to `term`.
    ///
    /// `value` is clamped into the universe first.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::UnknownTerm`] if the term is not defined.
    pub fn membership_of(&self, value: f64, term: &str) -> Result<f64, FuzzyError> {
        let mf = self.term(term).ok_or_else(|| FuzzyError::UnknownTerm {
            variable: self.name.clone(),
            term: term.to_owned(),
        })?;
        Ok(mf.evaluate(self.universe.clamp(value)))
    }

    /// Look up a term's membership function.
    pub fn term(&self, term: &str) -> Option<&MembershipFunction> {
        self.terms.get(term)
    }

    /// Whether the term is declared.
    pub fn has_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Terms in name order.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &MembershipFunction)> {
        self.terms.iter().map(|(name, mf)| (name.as_str(), mf))
    }

    /// The variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable's universe.
    pub const fn universe(&self) -> Universe {
        self.universe
    }

    /// Grid points (at `step` resolution) where no term has nonzero
    /// membership. An empty result means the terms cover the universe at that
    /// resolution.
    pub fn coverage_gaps(&self, step: f64) -> Vec<f64> {
        self.universe
            .grid(step)
            .filter(|&x| !self.terms.values().any(|mf| mf.supports(x)))
            .collect()
    }
}
