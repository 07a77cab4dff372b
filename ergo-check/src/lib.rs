/*! Checks natural-deduction derivations and decides formula equivalence for grading logic
exercises.

A deductive [system] is a set of [rule schemas] read from JSON. The [checker] walks the scopes
of a [derivation], verifies that every citation is available, matches every line against the
forms of its rule with the [matcher], and weighs the [errors] it finds into partial credit. The
equivalence [prover] combines a [tableau] with a [counter-model] search. The [grade] entry
points turn both into points for a learner's submission.

[system]: crate::schema::System
[rule schemas]: crate::schema::RuleSchema
[checker]: crate::checker::Checker
[derivation]: crate::derivation::Derivation
[matcher]: crate::matcher::Matcher
[errors]: crate::report::ErrorReport
[prover]: crate::equivalence::Prover
[tableau]: crate::tableau::Tableau
[counter-model]: crate::countermodel::ModelFinder
[grade]: crate::grade
*/
pub mod checker;
pub mod config;
pub mod countermodel;
pub mod derivation;
pub mod equivalence;
pub mod grade;
pub mod justification;
pub mod matcher;
pub mod report;
pub mod schema;
pub mod tableau;
pub mod trace;

#[cfg(test)]
mod test_prelude;

pub use checker::{Checker, Problem, Report};
pub use config::{CheckOptions, ProverConfig, Weights};
pub use equivalence::{Equivalence, EquivalenceStore, MemoryStore, Method, Prover};
pub use grade::{grade_derivation, grade_translation, Grade, GradeSettings};
pub use schema::{SchemaError, System};
