//! Options of the checker and the equivalence prover.
use crate::report::Severity;
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

/// Is the credit subtracted for a line, keyed by the severity of its worst error.
#[derive(PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Weights {
    pub fn of(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            high: 0.2,
            medium: 0.15,
            low: 0.1,
        }
    }
}

/// Configures a derivation check.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    /// Attempts every check even where a citation count is wrong, and weighs the errors into
    /// a fraction of credit. Otherwise any error leaves no credit.
    pub thorough: bool,

    /// Makes the quantifier rules available.
    pub predicate_logic: bool,

    /// Are rules that may not be cited in this exercise.
    pub hidden_rules: Vec<String>,

    pub weights: Weights,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            thorough: true,
            predicate_logic: true,
            hidden_rules: Vec::new(),
            weights: Weights::default(),
        }
    }
}

/// Configures the equivalence prover.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    /// Is the wall-clock budget of one equivalence test.
    pub budget: Duration,

    /// Is the largest domain searched for a counter-model.
    pub domain_size: usize,

    /// Is the number of new names a tableau branch may introduce.
    pub fresh_terms: usize,

    /// Is the largest number of interpretations examined for one domain size.
    pub max_interpretations: u64,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(5),
            domain_size: 3,
            fresh_terms: 8,
            max_interpretations: 1 << 20,
        }
    }
}
