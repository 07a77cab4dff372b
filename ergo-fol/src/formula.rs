/*! Defines [`Formula`], the immutable value obtained by parsing a string under a notation.

A formula carries its structure ([`Shape`]), its canonical text (the normal form), the
syntax errors found while parsing it and a few structural properties that are computed once
when the formula is built.

[`Formula`]: crate::formula::Formula
[`Shape`]: crate::formula::Shape
*/
use crate::{
    notation::{Notation, QuantifierStyle, TermStyle},
    parser::SyntaxError,
};
use itertools::Itertools;
use serde_derive::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, hash, sync::Arc};

/// Is an operator of the formula language.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Op {
    Not,
    And,
    Or,
    Implies,
    Iff,
    Forall,
    Exists,
    Falsum,
}

impl Op {
    pub const ALL: [Op; 8] = [
        Op::Not,
        Op::And,
        Op::Or,
        Op::Implies,
        Op::Iff,
        Op::Forall,
        Op::Exists,
        Op::Falsum,
    ];

    #[inline(always)]
    pub fn is_binary(self) -> bool {
        match self {
            Op::And | Op::Or | Op::Implies | Op::Iff => true,
            _ => false,
        }
    }

    #[inline(always)]
    pub fn is_quantifier(self) -> bool {
        self == Op::Forall || self == Op::Exists
    }

    /// Returns true for negation and the quantifiers.
    #[inline(always)]
    pub fn is_monadic(self) -> bool {
        self == Op::Not || self.is_quantifier()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let name = match self {
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Implies => "implies",
            Op::Iff => "iff",
            Op::Forall => "forall",
            Op::Exists => "exists",
            Op::Falsum => "falsum",
        };
        write!(f, "{}", name)
    }
}

/// Is the structure of a [`Formula`].
#[derive(Clone, Debug)]
pub enum Shape {
    /// Is an atomic formula: a predicate (or sentence) letter applied to zero or more terms.
    Atom { predicate: char, terms: Vec<char> },

    /// Is the zero-ary falsum.
    Falsum,

    /// Is the negation of a formula.
    Not(Arc<Formula>),

    /// Is a binary connective applied to two formulae.
    Binary {
        op: Op,
        left: Arc<Formula>,
        right: Arc<Formula>,
    },

    /// Is a quantified formula.
    Quantified {
        op: Op,
        variable: char,
        body: Arc<Formula>,
    },

    /// Is text that could not be read as a formula.
    Malformed,
}

/// Is an immutable formula. Two formulae are equal exactly when their normal forms are equal.
#[derive(Clone)]
pub struct Formula {
    shape: Shape,
    normal_form: String,
    errors: Vec<SyntaxError>,
    free_terms: BTreeSet<char>,
    free_variables: BTreeSet<char>,
    names: BTreeSet<char>,
}

impl Formula {
    /// Builds a formula of the given shape and renders its normal form under `notation`.
    pub(crate) fn new(shape: Shape, notation: &Notation) -> Self {
        let (free_terms, names, mut errors) = match &shape {
            Shape::Atom { terms, .. } => (
                terms.iter().cloned().collect(),
                terms.iter().cloned().collect(),
                Vec::new(),
            ),
            Shape::Falsum | Shape::Malformed => (BTreeSet::new(), BTreeSet::new(), Vec::new()),
            Shape::Not(body) => (
                body.free_terms.clone(),
                body.names.clone(),
                body.errors.clone(),
            ),
            Shape::Binary { left, right, .. } => (
                left.free_terms.union(&right.free_terms).cloned().collect(),
                left.names.union(&right.names).cloned().collect(),
                left.errors.iter().chain(right.errors.iter()).cloned().collect(),
            ),
            Shape::Quantified { variable, body, .. } => {
                let mut free = body.free_terms.clone();
                free.remove(variable);
                let mut names = body.names.clone();
                names.insert(*variable);
                (free, names, body.errors.clone())
            }
        };
        errors = errors.into_iter().unique().collect();
        let free_variables = free_terms
            .iter()
            .filter(|t| notation.is_variable(**t))
            .cloned()
            .collect();

        let mut formula = Self {
            shape,
            normal_form: String::new(),
            errors,
            free_terms,
            free_variables,
            names,
        };
        formula.normal_form = render(&formula, notation, 0, None);
        formula
    }

    /// Builds a formula for text that could not be parsed.
    pub(crate) fn malformed(text: String, errors: Vec<SyntaxError>) -> Self {
        Self {
            shape: Shape::Malformed,
            normal_form: text,
            errors,
            free_terms: BTreeSet::new(),
            free_variables: BTreeSet::new(),
            names: BTreeSet::new(),
        }
    }

    #[inline(always)]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the canonical text of the receiver.
    #[inline(always)]
    pub fn normal_form(&self) -> &str {
        &self.normal_form
    }

    #[inline(always)]
    pub fn is_well_formed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the reasons why the receiver is not well-formed.
    #[inline(always)]
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    /// Returns the syntax errors of the receiver joined into one human-readable sentence.
    pub fn reasons(&self) -> String {
        self.errors.iter().map(|e| e.to_string()).join("; ")
    }

    /// Returns the main operator of the receiver, or `None` for atomic and malformed formulae.
    pub fn op(&self) -> Option<Op> {
        match &self.shape {
            Shape::Falsum => Some(Op::Falsum),
            Shape::Not(_) => Some(Op::Not),
            Shape::Binary { op, .. } | Shape::Quantified { op, .. } => Some(*op),
            Shape::Atom { .. } | Shape::Malformed => None,
        }
    }

    /// Returns the left operand of a binary formula.
    pub fn left(&self) -> Option<&Arc<Formula>> {
        match &self.shape {
            Shape::Binary { left, .. } => Some(left),
            _ => None,
        }
    }

    /// Returns the right operand of a binary formula, or the operand of a negation or
    /// quantified formula.
    pub fn right(&self) -> Option<&Arc<Formula>> {
        match &self.shape {
            Shape::Binary { right, .. } => Some(right),
            Shape::Not(body) | Shape::Quantified { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn predicate(&self) -> Option<char> {
        match &self.shape {
            Shape::Atom { predicate, .. } => Some(*predicate),
            _ => None,
        }
    }

    pub fn terms(&self) -> &[char] {
        match &self.shape {
            Shape::Atom { terms, .. } => terms,
            _ => &[],
        }
    }

    /// Returns the variable bound by the main quantifier of the receiver.
    pub fn bound_variable(&self) -> Option<char> {
        match &self.shape {
            Shape::Quantified { variable, .. } => Some(*variable),
            _ => None,
        }
    }

    /// Returns the variables with free occurrences in the receiver.
    #[inline(always)]
    pub fn free_variables(&self) -> &BTreeSet<char> {
        &self.free_variables
    }

    /// Returns the terms, constants and variables alike, with free occurrences in the receiver.
    #[inline(always)]
    pub fn free_terms(&self) -> &BTreeSet<char> {
        &self.free_terms
    }

    /// Returns every term symbol that occurs in the receiver, bound or free, including the
    /// variables of its quantifiers.
    #[inline(always)]
    pub fn names(&self) -> &BTreeSet<char> {
        &self.names
    }

    /// Returns the predicate letters of the receiver together with the number of terms they
    /// are applied to.
    pub fn predicates(&self) -> BTreeSet<(char, usize)> {
        let mut result = BTreeSet::new();
        self.collect_predicates(&mut result);
        result
    }

    fn collect_predicates(&self, acc: &mut BTreeSet<(char, usize)>) {
        match &self.shape {
            Shape::Atom { predicate, terms } => {
                acc.insert((*predicate, terms.len()));
            }
            Shape::Not(body) | Shape::Quantified { body, .. } => body.collect_predicates(acc),
            Shape::Binary { left, right, .. } => {
                left.collect_predicates(acc);
                right.collect_predicates(acc);
            }
            Shape::Falsum | Shape::Malformed => {}
        }
    }

    pub fn is_quantifier_free(&self) -> bool {
        match &self.shape {
            Shape::Quantified { .. } => false,
            Shape::Not(body) => body.is_quantifier_free(),
            Shape::Binary { left, right, .. } => {
                left.is_quantifier_free() && right.is_quantifier_free()
            }
            _ => true,
        }
    }

    /// Returns true if `term` can replace the free occurrences of `variable` in the receiver
    /// without being captured by a quantifier.
    pub fn is_free_for(&self, variable: char, term: char) -> bool {
        match &self.shape {
            Shape::Atom { .. } | Shape::Falsum | Shape::Malformed => true,
            Shape::Not(body) => body.is_free_for(variable, term),
            Shape::Binary { left, right, .. } => {
                left.is_free_for(variable, term) && right.is_free_for(variable, term)
            }
            Shape::Quantified {
                variable: bound,
                body,
                ..
            } => {
                if *bound == variable {
                    true
                } else if *bound == term && body.free_terms.contains(&variable) {
                    false
                } else {
                    body.is_free_for(variable, term)
                }
            }
        }
    }

    #[inline(always)]
    pub(crate) fn is_binary(&self) -> bool {
        match &self.shape {
            Shape::Binary { .. } => true,
            _ => false,
        }
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.normal_form == other.normal_form
    }
}

impl Eq for Formula {}

impl hash::Hash for Formula {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.normal_form.hash(state)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.normal_form)
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.normal_form)
    }
}

// bracket shapes, picked by nesting depth
const BRACKETS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

/// Renders `formula` at bracket nesting `depth`, replacing the free occurrences of the first
/// component of `substitution` (if any) by the second.
pub(crate) fn render(
    formula: &Formula,
    notation: &Notation,
    depth: usize,
    substitution: Option<(char, char)>,
) -> String {
    match &formula.shape {
        Shape::Atom { predicate, terms } => {
            let terms = terms
                .iter()
                .map(|t| match substitution {
                    Some((v, replacement)) if v == *t => replacement,
                    _ => *t,
                })
                .collect_vec();
            match notation.terms {
                TermStyle::Parenthesized if !terms.is_empty() => {
                    format!("{}({})", predicate, terms.iter().join(","))
                }
                _ => format!("{}{}", predicate, terms.iter().collect::<String>()),
            }
        }
        Shape::Falsum => notation.glyph(Op::Falsum).to_string(),
        Shape::Not(body) => format!(
            "{}{}",
            notation.glyph(Op::Not),
            operand(body, notation, depth, substitution)
        ),
        Shape::Binary { op, left, right } => format!(
            "{}{}{}",
            operand(left, notation, depth, substitution),
            notation.glyph(*op),
            operand(right, notation, depth, substitution)
        ),
        Shape::Quantified { op, variable, body } => {
            let substitution = substitution.filter(|(v, _)| v != variable);
            let prefix = match notation.quantifiers {
                QuantifierStyle::Bare => format!("{}{}", notation.glyph(*op), variable),
                QuantifierStyle::Parenthesized => {
                    format!("({}{})", notation.glyph(*op), variable)
                }
            };
            format!(
                "{}{}",
                prefix,
                operand(body, notation, depth, substitution)
            )
        }
        Shape::Malformed => formula.normal_form.clone(),
    }
}

// Wraps binary (and non-empty malformed) operands in the bracket shape of the current depth.
fn operand(
    formula: &Formula,
    notation: &Notation,
    depth: usize,
    substitution: Option<(char, char)>,
) -> String {
    let wrap = formula.is_binary()
        || (!formula.is_well_formed() && !formula.normal_form.is_empty() && formula.op().is_none());
    if wrap {
        let (open, close) = BRACKETS[depth % 3];
        format!(
            "{}{}{}",
            open,
            render(formula, notation, depth + 1, substitution),
            close
        )
    } else {
        render(formula, notation, depth, substitution)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_prelude::*;

    #[test]
    fn operator_classes() {
        assert!(Op::And.is_binary());
        assert!(!Op::Not.is_binary());
        assert!(Op::Exists.is_quantifier());
        assert!(Op::Not.is_monadic());
        assert!(!Op::Falsum.is_monadic());
    }

    #[test]
    fn accessors() {
        let ctx = standard();
        let formula = ctx.parse("P ∨ (Q ∧ R)");
        assert_eq!(Some(Op::Or), formula.op());
        assert_eq!("P", formula.left().unwrap().normal_form());
        assert_eq!("Q∧R", formula.right().unwrap().normal_form());

        let atom = ctx.parse("Fab");
        assert_eq!(None, atom.op());
        assert_eq!(Some('F'), atom.predicate());
        assert_eq!(&['a', 'b'], atom.terms());

        let quantified = ctx.parse("∀x(Fx → Gx)");
        assert_eq!(Some('x'), quantified.bound_variable());
        assert_eq!("Fx→Gx", quantified.right().unwrap().normal_form());
    }

    #[test]
    fn free_variables() {
        let ctx = standard();
        assert_eq!(set(&['x', 'y']), *ctx.parse("Fx ∧ Gya").free_variables());
        assert_eq!(set(&['y']), *ctx.parse("∀x(Fx ∧ Gy)").free_variables());
        assert_eq!(set(&['y', 'a']), *ctx.parse("∀x(Fx ∧ Gya)").free_terms());
        assert!(ctx.parse("∃y∀xRxy").free_variables().is_empty());
        assert_eq!(set(&['x', 'y']), *ctx.parse("∃y∀xRxy").names());
    }

    #[test]
    fn predicates() {
        let ctx = standard();
        let formula = ctx.parse("∀x(Fx → Rxa) ∨ P");
        assert_eq!(
            vec![('F', 1), ('P', 0), ('R', 2)],
            formula.predicates().into_iter().collect::<Vec<_>>()
        );
        assert!(!formula.is_quantifier_free());
        assert!(ctx.parse("Fa → ¬Gb").is_quantifier_free());
    }

    #[test]
    fn free_for() {
        let ctx = standard();
        let formula = ctx.parse("∃yLxy");
        assert!(formula.is_free_for('x', 'a'));
        assert!(!formula.is_free_for('x', 'y'));
        assert!(ctx.parse("∀xFx").is_free_for('x', 'y'));
    }

    #[test]
    fn equality_by_normal_form() {
        let ctx = standard();
        assert_eq!(*ctx.parse("(P & Q)"), *ctx.parse("P∧Q"));
        assert_ne!(*ctx.parse("P∧Q"), *ctx.parse("Q∧P"));
    }

    #[test]
    fn bracket_cycling() {
        let ctx = standard();
        assert_eq!("([P∧Q]∨R)→S", ctx.parse("((P∧Q)∨R)→S").normal_form());
        assert_eq!("([{P∧Q}∨R]→S)∧T", ctx.parse("(((P∧Q)∨R)→S)∧T").normal_form());
        assert_eq!("¬(P∧Q)", ctx.parse("~[P & Q]").normal_form());
    }

    #[test]
    fn classic_rendering() {
        let ctx = classic();
        assert_eq!("(∀x)(F(x)⊃G(x,a))", ctx.parse("(∀x)(Fx ⊃ G(x,a))").normal_form());
        assert_eq!("∼(∃x)F(x)", ctx.parse("~(∃x)F(x)").normal_form());
    }
}
