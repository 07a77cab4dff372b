/*! Defines [`Notation`], the symbol tables under which formulae are read and printed.

A notation decides which glyphs denote the connectives, which characters are predicate letters,
constants and variables, and how quantifiers and the terms of atomic formulae are written. It is
plain configuration: it can be built in code, picked among the built-ins or loaded from JSON.

[`Notation`]: crate::notation::Notation
*/
use crate::formula::Op;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Is the type of errors arising from an invalid notation.
#[derive(Error, Debug)]
pub enum NotationError {
    /// Is returned when an operator is configured without any glyph.
    #[error("operator `{op}` has no glyph")]
    MissingGlyph { op: Op },

    /// Is returned when the canonical (first) glyph of an operator is not a single character.
    #[error("the canonical glyph `{glyph}` of operator `{op}` must be a single character")]
    WideGlyph { op: Op, glyph: String },

    /// Is returned when a character range is empty.
    #[error("empty character range `{from}-{to}`")]
    EmptyRange { from: char, to: char },

    /// Is returned when a character is configured both as a variable and a constant.
    #[error("character `{ch}` is both a variable and a constant")]
    OverlappingTerms { ch: char },

    /// Is returned when looking up a built-in notation that does not exist.
    #[error("unknown notation `{name}`")]
    Unknown { name: String },

    /// Is returned when a notation document cannot be decoded.
    #[error("{}", .source.to_string())]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Is an inclusive range of characters.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CharRange {
    pub from: char,
    pub to: char,
}

impl CharRange {
    /// Creates a new range from `from` to `to`, inclusive.
    pub fn new(from: char, to: char) -> Self {
        Self { from, to }
    }

    #[inline(always)]
    pub fn contains(&self, ch: char) -> bool {
        self.from <= ch && ch <= self.to
    }

    /// Returns the characters of the range in order.
    pub fn chars(&self) -> impl Iterator<Item = char> {
        self.from..=self.to
    }
}

/// Determines how the quantifier and its variable are written.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantifierStyle {
    /// The quantifier symbol is immediately followed by its variable, as in `∀xFx`.
    Bare,

    /// The quantifier and its variable are wrapped in parentheses, as in `(∀x)Fx`.
    Parenthesized,
}

impl Default for QuantifierStyle {
    fn default() -> Self {
        Self::Bare
    }
}

/// Determines how the terms of an atomic formula are written.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStyle {
    /// Terms follow the predicate letter directly, as in `Fab`.
    Juxtaposed,

    /// Terms are separated by commas inside parentheses, as in `F(a,b)`.
    Parenthesized,
}

impl Default for TermStyle {
    fn default() -> Self {
        Self::Juxtaposed
    }
}

/// Lists the accepted glyphs of every operator. The first glyph of each list is canonical and
/// is used for printing; the rest are input aliases.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Symbols {
    pub not: Vec<String>,
    pub and: Vec<String>,
    pub or: Vec<String>,
    pub implies: Vec<String>,
    pub iff: Vec<String>,
    pub forall: Vec<String>,
    pub exists: Vec<String>,
    pub falsum: Vec<String>,
}

impl Symbols {
    fn glyphs(&self, op: Op) -> &[String] {
        match op {
            Op::Not => &self.not,
            Op::And => &self.and,
            Op::Or => &self.or,
            Op::Implies => &self.implies,
            Op::Iff => &self.iff,
            Op::Forall => &self.forall,
            Op::Exists => &self.exists,
            Op::Falsum => &self.falsum,
        }
    }
}

/// Is a notation: the operator glyphs, the character classes of predicate letters, constants
/// and variables, and the surface form of quantifiers and terms.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Notation {
    /// Is the name of the notation.
    pub name: String,

    /// Are the glyphs of the operators.
    pub symbols: Symbols,

    /// Are the predicate (and sentence) letters.
    pub predicates: Vec<CharRange>,

    /// Are the constants (names).
    pub constants: Vec<CharRange>,

    /// Are the variables.
    pub variables: Vec<CharRange>,

    #[serde(default)]
    pub quantifiers: QuantifierStyle,

    #[serde(default)]
    pub terms: TermStyle,
}

fn glyphs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Notation {
    /// Returns the standard notation: `¬ ∧ ∨ → ↔ ∀ ∃ ⊥` with ASCII aliases, quantifiers
    /// written as `∀x` and juxtaposed terms.
    pub fn standard() -> Self {
        Self {
            name: "standard".into(),
            symbols: Symbols {
                not: glyphs(&["¬", "~", "∼"]),
                and: glyphs(&["∧", "&", "^", "•"]),
                or: glyphs(&["∨", "|"]),
                implies: glyphs(&["→", "->", "⊃"]),
                iff: glyphs(&["↔", "<->", "≡"]),
                forall: glyphs(&["∀"]),
                exists: glyphs(&["∃"]),
                falsum: glyphs(&["⊥", "#"]),
            },
            predicates: vec![CharRange::new('A', 'Z')],
            constants: vec![CharRange::new('a', 't')],
            variables: vec![CharRange::new('u', 'z')],
            quantifiers: QuantifierStyle::Bare,
            terms: TermStyle::Juxtaposed,
        }
    }

    /// Returns the classic textbook notation: `∼ & ∨ ⊃ ≡`, quantifiers written as `(∀x)` and
    /// terms wrapped as `F(a,b)`.
    pub fn classic() -> Self {
        Self {
            name: "classic".into(),
            symbols: Symbols {
                not: glyphs(&["∼", "~", "¬"]),
                and: glyphs(&["&", "∧", "•"]),
                or: glyphs(&["∨", "|"]),
                implies: glyphs(&["⊃", "→", "->"]),
                iff: glyphs(&["≡", "↔", "<->"]),
                forall: glyphs(&["∀"]),
                exists: glyphs(&["∃"]),
                falsum: glyphs(&["⊥", "#"]),
            },
            predicates: vec![CharRange::new('A', 'Z')],
            constants: vec![CharRange::new('a', 't')],
            variables: vec![CharRange::new('u', 'z')],
            quantifiers: QuantifierStyle::Parenthesized,
            terms: TermStyle::Parenthesized,
        }
    }

    /// Returns the built-in notation with the given name.
    pub fn builtin(name: &str) -> Result<Self, NotationError> {
        match name.to_lowercase().as_ref() {
            "standard" => Ok(Self::standard()),
            "classic" => Ok(Self::classic()),
            _ => Err(NotationError::Unknown { name: name.into() }),
        }
    }

    /// Decodes a notation from a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self, NotationError> {
        let notation: Self = serde_json::from_str(json)?;
        notation.validate()?;
        Ok(notation)
    }

    /// Checks that every operator has a single-character canonical glyph, that every range
    /// is non-empty and that no character is both a variable and a constant.
    pub fn validate(&self) -> Result<(), NotationError> {
        for op in Op::ALL.iter() {
            let glyph = self
                .symbols
                .glyphs(*op)
                .first()
                .ok_or(NotationError::MissingGlyph { op: *op })?;
            if glyph.chars().count() != 1 {
                return Err(NotationError::WideGlyph {
                    op: *op,
                    glyph: glyph.clone(),
                });
            }
        }

        let ranges = self
            .predicates
            .iter()
            .chain(self.constants.iter())
            .chain(self.variables.iter());
        for range in ranges {
            if range.from > range.to {
                return Err(NotationError::EmptyRange {
                    from: range.from,
                    to: range.to,
                });
            }
        }

        if let Some(ch) = self.constant_chars().find(|c| self.is_variable(*c)) {
            return Err(NotationError::OverlappingTerms { ch });
        }
        Ok(())
    }

    /// Returns the canonical glyph of `op`.
    pub fn glyph(&self, op: Op) -> char {
        self.symbols
            .glyphs(op)
            .first()
            .and_then(|g| g.chars().next())
            .unwrap_or('?')
    }

    /// Returns the operator whose canonical glyph is `ch`.
    pub fn op_of(&self, ch: char) -> Option<Op> {
        Op::ALL.iter().cloned().find(|op| self.glyph(*op) == ch)
    }

    /// Returns every accepted glyph paired with the canonical character it stands for, longest
    /// glyphs first so that `<->` is recognized before `->`.
    pub(crate) fn aliases(&self) -> Vec<(Vec<char>, char)> {
        let mut aliases: Vec<(Vec<char>, char)> = Op::ALL
            .iter()
            .flat_map(|op| {
                let canonical = self.glyph(*op);
                self.symbols
                    .glyphs(*op)
                    .iter()
                    .map(move |g| (g.chars().collect(), canonical))
            })
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        aliases
    }

    pub fn is_predicate(&self, ch: char) -> bool {
        self.predicates.iter().any(|r| r.contains(ch))
    }

    pub fn is_constant(&self, ch: char) -> bool {
        self.constants.iter().any(|r| r.contains(ch))
    }

    pub fn is_variable(&self, ch: char) -> bool {
        self.variables.iter().any(|r| r.contains(ch))
    }

    /// Returns true if `ch` may appear as a term, either a constant or a variable.
    pub fn is_term(&self, ch: char) -> bool {
        self.is_constant(ch) || self.is_variable(ch)
    }

    /// Returns the constants of the notation in order.
    pub fn constant_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.constants.iter().flat_map(|r| r.chars())
    }
}

impl Default for Notation {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid() {
        assert!(Notation::standard().validate().is_ok());
        assert!(Notation::classic().validate().is_ok());
        assert!(Notation::builtin("Classic").is_ok());
        assert!(Notation::builtin("polish").is_err());
    }

    #[test]
    fn canonical_glyphs() {
        let standard = Notation::standard();
        assert_eq!('→', standard.glyph(Op::Implies));
        assert_eq!(Some(Op::Iff), standard.op_of('↔'));
        assert_eq!(None, standard.op_of('x'));

        let classic = Notation::classic();
        assert_eq!('⊃', classic.glyph(Op::Implies));
        assert_eq!('∼', classic.glyph(Op::Not));
    }

    #[test]
    fn aliases_longest_first() {
        let aliases = Notation::standard().aliases();
        let arrow = aliases
            .iter()
            .position(|(g, _)| g.iter().collect::<String>() == "->")
            .unwrap();
        let double = aliases
            .iter()
            .position(|(g, _)| g.iter().collect::<String>() == "<->")
            .unwrap();
        assert!(double < arrow);
    }

    #[test]
    fn character_classes() {
        let notation = Notation::standard();
        assert!(notation.is_predicate('F'));
        assert!(notation.is_constant('a'));
        assert!(notation.is_variable('x'));
        assert!(!notation.is_term('F'));
        assert_eq!(20, notation.constant_chars().count());
    }

    #[test]
    fn from_json() {
        let json = serde_json::to_string(&Notation::classic()).unwrap();
        assert_eq!(Notation::classic(), Notation::from_json(&json).unwrap());

        let mut wide = Notation::standard();
        wide.symbols.and = vec!["&&".into()];
        let json = serde_json::to_string(&wide).unwrap();
        assert!(Notation::from_json(&json).is_err());

        let mut overlapping = Notation::standard();
        overlapping.variables = vec![CharRange::new('s', 'z')];
        assert!(overlapping.validate().is_err());
    }
}
