//! Implements the reader that turns text into [`Formula`]s under a [`Notation`].
//!
//! Reading never fails: text that is not a formula yields a formula that is not well-formed
//! and carries the [`SyntaxError`]s explaining why. The reader works on a normalized copy of
//! the input:
//!
//! 1. whitespace is dropped, every accepted glyph is replaced by the canonical glyph of its
//!    operator and the soft brackets `[ ]` and `{ }` become `( )`;
//! 2. parenthesized quantifiers such as `(∀x)` are reduced to `∀x`.
//!
//! The main operator of a string is the operator occurrence outside of every bracket. Negation
//! and the quantifiers bind tighter than the binary connectives, so a binary connective at the
//! top level is always the main operator; two of them at the top level are ambiguous and are
//! reported rather than resolved.
//!
//! **Example**:
//! ```rust
//! use ergo_fol::{Notation, Op, ParseContext};
//!
//! let ctx = ParseContext::new(Notation::standard());
//!
//! let formula = ctx.parse("P ∨ (Q & R)");
//! assert_eq!(Some(Op::Or), formula.op());
//! assert_eq!("P∨(Q∧R)", formula.normal_form());
//!
//! let ambiguous = ctx.parse("P ∨ Q ∧ R");
//! assert!(!ambiguous.is_well_formed());
//! ```
//!
//! [`Formula`]: crate::formula::Formula
//! [`Notation`]: crate::notation::Notation
//! [`SyntaxError`]: crate::parser::SyntaxError
use crate::{
    formula::{Formula, Op, Shape},
    notation::Notation,
    ParseContext,
};
use thiserror::Error;

/// Is a reason why a text is not a well-formed formula.
#[derive(Error, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SyntaxError {
    /// Is reported where a formula is expected but nothing is found.
    #[error("a formula is missing")]
    Missing,

    /// Is reported when brackets do not pair up.
    #[error("the parentheses are unbalanced")]
    Unbalanced,

    /// Is reported when two binary connectives compete for the main operator.
    #[error("`{text}` is ambiguous without more parentheses")]
    Ambiguous { text: String },

    /// Is reported when a quantifier is not followed by a variable.
    #[error("the quantifier in `{text}` is not followed by a variable")]
    MissingVariable { text: String },

    /// Is reported when an atomic formula does not start with a predicate letter.
    #[error("`{letter}` is not a sentence or predicate letter")]
    UnknownPredicate { letter: char },

    /// Is reported when an atomic formula is applied to something other than terms.
    #[error("`{term}` is not a constant or variable")]
    InvalidTerm { term: char },

    /// Is reported for characters that cannot be placed in the formula.
    #[error("`{text}` contains unexpected characters")]
    Stray { text: String },
}

/// Normalizes `text` for reading under `notation`.
pub(crate) fn normalize(text: &str, notation: &Notation) -> String {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let aliases = notation.aliases();

    let mut normal = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let alias = aliases
            .iter()
            .find(|(glyph, _)| chars[i..].starts_with(glyph));
        if let Some((glyph, canonical)) = alias {
            normal.push(*canonical);
            i += glyph.len();
            continue;
        }
        normal.push(match chars[i] {
            '[' | '{' => '(',
            ']' | '}' => ')',
            c => c,
        });
        i += 1;
    }

    // (∀x) -> ∀x
    let is_quantifier =
        |c: char| c == notation.glyph(Op::Forall) || c == notation.glyph(Op::Exists);
    let mut result = String::with_capacity(normal.len());
    let mut i = 0;
    while i < normal.len() {
        if normal[i] == '('
            && i + 3 < normal.len()
            && is_quantifier(normal[i + 1])
            && notation.is_variable(normal[i + 2])
            && normal[i + 3] == ')'
        {
            result.push(normal[i + 1]);
            result.push(normal[i + 2]);
            i += 4;
        } else {
            result.push(normal[i]);
            i += 1;
        }
    }
    result
}

/// Builds the formula for the normalized `text`, reading its operands through `ctx`.
pub(crate) fn build(ctx: &ParseContext, text: &str) -> Formula {
    let notation = ctx.notation();
    let chars: Vec<char> = text.chars().collect();

    if !balanced(&chars) {
        return Formula::malformed(text.into(), vec![SyntaxError::Unbalanced]);
    }
    let chars = strip_outer(&chars);
    if chars.is_empty() {
        return Formula::malformed(String::new(), vec![SyntaxError::Missing]);
    }
    let stripped: String = chars.iter().collect();

    let mut depth = 0;
    let mut binaries = Vec::new();
    for (i, c) in chars.iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if depth == 0 => {
                if let Some(op) = notation.op_of(*c) {
                    if op.is_binary() {
                        binaries.push((i, op));
                    }
                }
            }
            _ => {}
        }
    }

    match binaries.as_slice() {
        [] => unary(ctx, chars, stripped),
        [(i, op)] => {
            let left: String = chars[..*i].iter().collect();
            let right: String = chars[i + 1..].iter().collect();
            Formula::new(
                Shape::Binary {
                    op: *op,
                    left: ctx.parse_normalized(&left),
                    right: ctx.parse_normalized(&right),
                },
                notation,
            )
        }
        _ => Formula::malformed(
            stripped.clone(),
            vec![SyntaxError::Ambiguous { text: stripped }],
        ),
    }
}

// Reads a string without top-level binary connectives.
fn unary(ctx: &ParseContext, chars: &[char], text: String) -> Formula {
    let notation = ctx.notation();
    match notation.op_of(chars[0]) {
        Some(Op::Not) => {
            let body: String = chars[1..].iter().collect();
            Formula::new(Shape::Not(ctx.parse_normalized(&body)), notation)
        }
        Some(op) if op.is_quantifier() => match chars.get(1) {
            Some(v) if notation.is_variable(*v) => {
                let body: String = chars[2..].iter().collect();
                Formula::new(
                    Shape::Quantified {
                        op,
                        variable: *v,
                        body: ctx.parse_normalized(&body),
                    },
                    notation,
                )
            }
            _ => Formula::malformed(text.clone(), vec![SyntaxError::MissingVariable { text }]),
        },
        Some(Op::Falsum) if chars.len() == 1 => Formula::new(Shape::Falsum, notation),
        _ => atomic(notation, chars, text),
    }
}

fn atomic(notation: &Notation, chars: &[char], text: String) -> Formula {
    let predicate = chars[0];
    if !notation.is_predicate(predicate) {
        let error = if notation.op_of(predicate).is_some() || predicate == '(' {
            SyntaxError::Stray { text: text.clone() }
        } else {
            SyntaxError::UnknownPredicate { letter: predicate }
        };
        return Formula::malformed(text, vec![error]);
    }

    let mut rest = &chars[1..];
    if rest.first() == Some(&'(') && rest.last() == Some(&')') {
        rest = &rest[1..rest.len() - 1];
    }

    if rest
        .iter()
        .any(|c| notation.op_of(*c).is_some() || *c == '(' || *c == ')')
    {
        return Formula::malformed(text.clone(), vec![SyntaxError::Stray { text }]);
    }

    let mut terms = Vec::new();
    let mut errors = Vec::new();
    for c in rest.iter().filter(|c| **c != ',') {
        if notation.is_term(*c) {
            terms.push(*c);
        } else {
            errors.push(SyntaxError::InvalidTerm { term: *c });
        }
    }

    if errors.is_empty() {
        Formula::new(Shape::Atom { predicate, terms }, notation)
    } else {
        errors.dedup();
        Formula::malformed(text, errors)
    }
}

fn balanced(chars: &[char]) -> bool {
    let mut depth: i64 = 0;
    for c in chars {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

// Removes any number of brackets that wrap the entire (balanced) string.
fn strip_outer(mut chars: &[char]) -> &[char] {
    while chars.len() >= 2 && chars[0] == '(' && matching(chars, 0) == Some(chars.len() - 1) {
        chars = &chars[1..chars.len() - 1];
    }
    chars
}

fn matching(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
