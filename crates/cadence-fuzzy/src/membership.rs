//! Triangular membership functions.
//!
//! A triangle `(a, b, c)` is 0 outside `[a, c]`, rises linearly from 0 at
//! `a` to 1 at `b`, and falls linearly back to 0 at `c`. When `a == b` or
//! `b == c` the shape degenerates into a right-angle shoulder: the peak value
//! of 1 sits directly on the edge of the support.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::FuzzyError;

/// An immutable triangular membership function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct MembershipFunction {
    a: f64,
    b: f64,
    c: f64,
}

impl MembershipFunction {
    /// Build a triangle from its three breakpoints.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzyError::InvalidShape`] if any breakpoint is not finite
    /// or the breakpoints are not ordered `a <= b <= c`.
    pub const fn triangular(a: f64, b: f64, c: f64) -> Result<Self, FuzzyError> {
        let finite = a.is_finite() && b.is_finite() && c.is_finite();
        if !finite || a > b || b > c {
            return Err(FuzzyError::InvalidShape { a, b, c });
        }
        Ok(Self { a, b, c })
    }

    /// Degree of membership of `x`, always in `[0, 1]`.
    ///
    /// Total over all `f64` values; NaN maps to 0.
    pub fn evaluate(&self, x: f64) -> f64 {
        if !(self.a..=self.c).contains(&x) {
            return 0.0;
        }
        let degree = match x.partial_cmp(&self.b) {
            // x in [a, b) implies b > a.
            Some(Ordering::Less) => (x - self.a) / (self.b - self.a),
            // x in (b, c] implies c > b.
            Some(Ordering::Greater) => (self.c - x) / (self.c - self.b),
            Some(Ordering::Equal) => 1.0,
            None => 0.0,
        };
        degree.clamp(0.0, 1.0)
    }

    /// The breakpoints `(a, b, c)`.
    pub const fn breakpoints(&self) -> (f64, f64, f64) {
        (self.a, self.b, self.c)
    }

    /// Whether `x` has nonzero membership.
    pub fn supports(&self, x: f64) -> bool {
        self.evaluate(x) > 0.0
    }
}

impl TryFrom<[f64; 3]> for MembershipFunction {
    type Error = FuzzyError;

    fn try_from([a, b, c]: [f64; 3]) -> Result<Self, Self::Error> {
        Self::triangular(a, b, c)
    }
}

impl From<MembershipFunction> for [f64; 3] {
    fn from(mf: MembershipFunction) -> Self {
        [mf.a, mf.b, mf.c]
    }
}
