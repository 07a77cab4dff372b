pub use crate::{
    checker::{Checker, Problem},
    config::{CheckOptions, ProverConfig},
    derivation::{Derivation, DerivationBuilder},
    report::{Category, Severity},
    schema::System,
};
pub use ergo_fol::{Notation, ParseContext};
use std::collections::BTreeSet;

pub fn standard() -> ParseContext {
    ParseContext::new(Notation::standard())
}

pub fn fitch() -> System {
    System::builtin("fitch").unwrap()
}

pub fn km() -> System {
    System::builtin("kalish-montague").unwrap()
}

pub fn set(items: &[char]) -> BTreeSet<char> {
    items.iter().cloned().collect()
}

pub fn problem(ctx: &ParseContext, premises: &[&str], conclusion: &str) -> Problem {
    let premises: Vec<String> = premises.iter().map(|p| p.to_string()).collect();
    Problem::parse(ctx, &premises, conclusion)
}

/// Lists the `(line, category, severity)` of every error of a check.
pub fn errors_of(report: &crate::checker::Report) -> Vec<(usize, Category, Severity)> {
    report
        .errors
        .records()
        .iter()
        .map(|e| (e.line, e.category, e.severity))
        .collect()
}
