/*! Provides the formula engine of Ergo: configurable [notations], a reader that turns text into
immutable [formulae] with canonical normal forms, and a [context] that memoizes the formulae it
reads.

[notations]: crate::notation::Notation
[formulae]: crate::formula::Formula
[context]: crate::ParseContext
*/
mod cache;
pub mod formula;
pub mod notation;
pub mod parser;
#[cfg(test)]
mod test_prelude;

pub use cache::ParseContext;
pub use formula::{Formula, Op, Shape};
pub use notation::{CharRange, Notation, NotationError, QuantifierStyle, Symbols, TermStyle};
pub use parser::SyntaxError;
