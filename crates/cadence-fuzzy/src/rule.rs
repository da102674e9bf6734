//! Rules: conjunctions of input-term clauses mapped to one output term.
//!
//! Rules are plain data so a rule base can be loaded from configuration as a
//! table of `(clauses, consequent)` rows:
//!
//! ```yaml
//! - when:
//!     - { variable: arriving_vehicles, term: high }
//!     - { variable: queuing_vehicles, term: low }
//!   then: long
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FuzzyError;
use crate::variable::FuzzyVariable;

/// One antecedent clause: "`variable` is `term`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Input variable name.
    pub variable: String,
    /// Term on that variable.
    pub term: String,
}

impl Clause {
    /// Create a clause.
    pub fn new(variable: &str, term: &str) -> Self {
        Self {
            variable: variable.to_owned(),
            term: term.to_owned(),
        }
    }
}

/// A rule: all clauses joined by fuzzy AND, implying one output term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Antecedent clauses.
    pub when: Vec<Clause>,
    /// Consequent term on the output variable.
    pub then: String,
}

impl Rule {
    /// Create a rule from `(variable, term)` pairs and a consequent term.
    pub fn new(when: &[(&str, &str)], then: &str) -> Self {
        Self {
            when: when
                .iter()
                .map(|&(variable, term)| Clause::new(variable, term))
                .collect(),
            then: then.to_owned(),
        }
    }

    /// Firing strength: the minimum membership degree over all clauses.
    ///
    /// `variables` holds the declared input variables by name, `values` the
    /// crisp input snapshot.
    ///
    /// # Errors
    ///
    /// - [`FuzzyError::UnknownVariable`] if a clause names an undeclared variable
    /// - [`FuzzyError::UnknownTerm`] if a clause names an undeclared term
    /// - [`FuzzyError::MissingInput`] if the snapshot lacks a clause's variable
    pub fn firing_strength(
        &self,
        variables: &BTreeMap<String, FuzzyVariable>,
        values: &BTreeMap<String, f64>,
    ) -> Result<f64, FuzzyError> {
        let mut strength: f64 = 1.0;
        for clause in &self.when {
            let variable = variables
                .get(&clause.variable)
                .ok_or_else(|| FuzzyError::UnknownVariable(clause.variable.clone()))?;
            let value = values
                .get(&clause.variable)
                .copied()
                .ok_or_else(|| FuzzyError::MissingInput(clause.variable.clone()))?;
            strength = strength.min(variable.membership_of(value, &clause.term)?);
        }
        Ok(strength)
    }
}

impl core::fmt::Display for Rule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("IF ")?;
        for (i, clause) in self.when.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{} is {}", clause.variable, clause.term)?;
        }
        write!(f, " THEN {}", self.then)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::membership::MembershipFunction;
    use crate::variable::Universe;

    fn variables() -> BTreeMap<String, FuzzyVariable> {
        let mut map = BTreeMap::new();
        for name in ["arriving", "queuing"] {
            let universe = Universe::new(name, 0.0, 100.0).unwrap();
            let var = FuzzyVariable::new(name.to_owned(), universe)
                .with_term("low", MembershipFunction::triangular(0.0, 0.0, 10.0).unwrap())
                .unwrap()
                .with_term("high", MembershipFunction::triangular(20.0, 101.0, 101.0).unwrap())
                .unwrap();
            map.insert(name.to_owned(), var);
        }
        map
    }

    fn values(arriving: f64, queuing: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("arriving".to_owned(), arriving),
            ("queuing".to_owned(), queuing),
        ])
    }

    #[test]
    fn strength_is_minimum_of_clauses() {
        let rule = Rule::new(&[("arriving", "high"), ("queuing", "low")], "long");
        let strength = rule.firing_strength(&variables(), &values(85.0, 5.0)).unwrap();
        // high(85) = 65/81 ~ 0.80, low(5) = 0.5
        assert_eq!(strength, 0.5);

        let strength = rule.firing_strength(&variables(), &values(85.0, 1.0)).unwrap();
        assert!((strength - 65.0 / 81.0).abs() < 1e-12);
    }

    #[test]
    fn zero_clause_zeroes_the_rule() {
        let rule = Rule::new(&[("arriving", "low"), ("queuing", "low")], "short");
        assert_eq!(rule.firing_strength(&variables(), &values(50.0, 0.0)).unwrap(), 0.0);
    }

    #[test]
    fn unknown_variable_fails_fast() {
        let rule = Rule::new(&[("departing", "low")], "short");
        assert_eq!(
            rule.firing_strength(&variables(), &values(0.0, 0.0)),
            Err(FuzzyError::UnknownVariable("departing".to_owned()))
        );
    }

    #[test]
    fn missing_input_is_reported() {
        let rule = Rule::new(&[("queuing", "low")], "short");
        let only_arriving = BTreeMap::from([("arriving".to_owned(), 1.0)]);
        assert_eq!(
            rule.firing_strength(&variables(), &only_arriving),
            Err(FuzzyError::MissingInput("queuing".to_owned()))
        );
    }

    #[test]
    fn display_reads_like_the_rule() {
        let rule = Rule::new(&[("arriving", "high"), ("queuing", "low")], "long");
        assert_eq!(
            rule.to_string(),
            "IF arriving is high AND queuing is low THEN long"
        );
    }

    #[test]
    fn loads_from_yaml_table() {
        let yaml = "
- when:
    - { variable: arriving, term: high }
    - { variable: queuing, term: low }
  then: long
";
        let rules: Vec<Rule> = serde_yml::from_str(yaml).unwrap();
        assert_eq!(rules, vec![Rule::new(&[("arriving", "high"), ("queuing", "low")], "long")]);
    }
}
