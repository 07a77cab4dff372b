/*! Defines the scope tree of a submitted derivation.

A [`Derivation`] is an arena of lines and scopes addressed by [`LineId`] and [`ScopeId`]. The
root scope holds the problem's premises followed by the submitted lines. A subderivation is a
nested scope; when it completes a show line, that show line sits in the parent scope at the
position of the subderivation and the scope records it as its `show_line`.

Derivations are built with a [`DerivationBuilder`] or read from a [`ProofInput`] document.

[`Derivation`]: crate::derivation::Derivation
[`LineId`]: crate::derivation::LineId
[`ScopeId`]: crate::derivation::ScopeId
[`DerivationBuilder`]: crate::derivation::DerivationBuilder
[`ProofInput`]: crate::derivation::ProofInput
*/
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Is the index of a line in its derivation.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct LineId(pub usize);

/// Is the index of a scope in its derivation. The root scope is [`Derivation::ROOT`].
///
/// [`Derivation::ROOT`]: crate::derivation::Derivation::ROOT
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct ScopeId(pub usize);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "l#{}", self.0)
    }
}

/// Is a line as submitted.
#[derive(Clone, Debug)]
pub struct Line {
    pub number: usize,
    pub formula: String,
    pub justification: String,
    pub show: bool,

    /// Is the scope whose parts list contains the line, and the line's index in it.
    pub(crate) position: (ScopeId, usize),

    /// For a show line, is the subderivation that completes it.
    pub(crate) owns: Option<ScopeId>,
}

/// Is an element of a scope.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Part {
    Line(LineId),
    Scope(ScopeId),
}

/// Is a subderivation, or the root of the derivation.
#[derive(Clone, Debug)]
pub struct Scope {
    pub parts: Vec<Part>,
    pub show_line: Option<LineId>,
    pub parent: Option<ScopeId>,

    /// Is the index of the scope in its parent's parts list.
    pub(crate) index: usize,
}

/// Is the scope tree of a derivation.
#[derive(Clone, Debug)]
pub struct Derivation {
    lines: Vec<Line>,
    scopes: Vec<Scope>,
}

impl Derivation {
    pub const ROOT: ScopeId = ScopeId(0);

    fn new() -> Self {
        Self {
            lines: Vec::new(),
            scopes: vec![Scope {
                parts: Vec::new(),
                show_line: None,
                parent: None,
                index: 0,
            }],
        }
    }

    /// Reads a derivation from a proof document. The problem's `premises` become the first
    /// lines of the root scope, numbered from 1 and justified by `premise_rule`.
    pub fn from_input(premises: &[String], premise_rule: &str, input: &[PartInput]) -> Self {
        let mut builder = DerivationBuilder::new();
        for (i, premise) in premises.iter().enumerate() {
            builder.line(i + 1, premise, premise_rule);
        }
        builder.parts(input);
        builder.build()
    }

    #[inline(always)]
    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.0]
    }

    #[inline(always)]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    /// Returns the scope whose parts list contains `line` and the line's index in it.
    #[inline(always)]
    pub fn position(&self, line: LineId) -> (ScopeId, usize) {
        self.line(line).position
    }

    /// Returns the subderivation that completes the show line `line`.
    #[inline(always)]
    pub fn owned_scope(&self, line: LineId) -> Option<ScopeId> {
        self.line(line).owns
    }

    /// Returns the scope a line belongs to: its own subderivation for a show line.
    pub fn home(&self, line: LineId) -> ScopeId {
        self.owned_scope(line)
            .unwrap_or_else(|| self.position(line).0)
    }

    /// Returns the lines in the order they appear.
    pub fn flatten(&self) -> Vec<LineId> {
        let mut result = Vec::new();
        self.flatten_into(Self::ROOT, &mut result);
        result
    }

    fn flatten_into(&self, scope: ScopeId, result: &mut Vec<LineId>) {
        for part in &self.scope(scope).parts {
            match part {
                Part::Line(line) => result.push(*line),
                Part::Scope(inner) => {
                    if let Some(show) = self.scope(*inner).show_line {
                        result.push(show);
                    }
                    self.flatten_into(*inner, result);
                }
            }
        }
    }

    /// Returns the lines that are visible at the top level of `scope`: its lines and the show
    /// lines of its subderivations.
    pub fn top_lines(&self, scope: ScopeId) -> Vec<LineId> {
        self.scope(scope)
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Line(line) => Some(*line),
                Part::Scope(inner) => self.scope(*inner).show_line,
            })
            .collect()
    }

    /// Returns every line inside `scope`, at any depth, excluding its own show line.
    pub fn lines_within(&self, scope: ScopeId) -> Vec<LineId> {
        let mut result = Vec::new();
        self.flatten_into(scope, &mut result);
        result
    }

    /// Returns the first line of `scope`: its show line if it has one, its first line otherwise.
    pub fn first_line(&self, scope: ScopeId) -> Option<LineId> {
        self.scope(scope)
            .show_line
            .or_else(|| self.lines_within(scope).first().cloned())
    }

    /// Returns the last line of `scope` at any depth.
    pub fn last_line(&self, scope: ScopeId) -> Option<LineId> {
        match self.scope(scope).parts.last()? {
            Part::Line(line) => Some(*line),
            Part::Scope(inner) => self
                .last_line(*inner)
                .or_else(|| self.scope(*inner).show_line),
        }
    }

    /// Returns `scope` and its ancestors, innermost first.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |s| self.scope(*s).parent)
    }

    /// Returns true if `line` is inside `scope` at any depth or is its show line.
    pub fn encloses(&self, scope: ScopeId, line: LineId) -> bool {
        self.ancestors(self.home(line)).any(|s| s == scope)
    }
}

/// Builds a [`Derivation`] part by part.
///
/// **Example**:
/// ```rust
/// use ergo_check::derivation::{Derivation, DerivationBuilder};
///
/// let mut builder = DerivationBuilder::new();
/// builder
///     .line(1, "P → Q", "Pr")
///     .open()
///     .line(2, "P", "Hyp")
///     .line(3, "Q", "1, 2 →E")
///     .close()
///     .line(4, "P → Q", "2–3 →I");
/// let derivation = builder.build();
///
/// assert_eq!(4, derivation.len());
/// assert_eq!(2, derivation.top_lines(Derivation::ROOT).len());
/// ```
///
/// [`Derivation`]: crate::derivation::Derivation
pub struct DerivationBuilder {
    derivation: Derivation,
    current: ScopeId,
}

impl DerivationBuilder {
    pub fn new() -> Self {
        Self {
            derivation: Derivation::new(),
            current: Derivation::ROOT,
        }
    }

    /// Appends a line to the current scope.
    pub fn line(&mut self, number: usize, formula: &str, justification: &str) -> &mut Self {
        let id = self.push_line(number, formula, justification, false);
        self.derivation.scopes[self.current.0].parts.push(Part::Line(id));
        self
    }

    /// Appends a show line and opens the subderivation that completes it.
    pub fn show(&mut self, number: usize, formula: &str, justification: &str) -> &mut Self {
        let id = self.push_line(number, formula, justification, true);
        let scope = self.push_scope(Some(id));
        self.derivation.lines[id.0].owns = Some(scope);
        self
    }

    /// Opens a subderivation without a show line.
    pub fn open(&mut self) -> &mut Self {
        self.push_scope(None);
        self
    }

    /// Closes the current subderivation. Closing the root has no effect.
    pub fn close(&mut self) -> &mut Self {
        if let Some(parent) = self.derivation.scope(self.current).parent {
            self.current = parent;
        }
        self
    }

    /// Appends the parts of a proof document.
    pub fn parts(&mut self, parts: &[PartInput]) -> &mut Self {
        for part in parts {
            match part {
                PartInput::Line(line) => {
                    self.line(line.number, &line.formula, &line.justification);
                }
                PartInput::Show { show, parts } => {
                    self.show(show.number, &show.formula, &show.justification)
                        .parts(parts)
                        .close();
                }
                PartInput::Scope { parts } => {
                    self.open().parts(parts).close();
                }
            }
        }
        self
    }

    pub fn build(self) -> Derivation {
        self.derivation
    }

    fn push_line(&mut self, number: usize, formula: &str, justification: &str, show: bool) -> LineId {
        let id = LineId(self.derivation.lines.len());
        let index = self.derivation.scope(self.current).parts.len();
        self.derivation.lines.push(Line {
            number,
            formula: formula.to_owned(),
            justification: justification.to_owned(),
            show,
            position: (self.current, index),
            owns: None,
        });
        id
    }

    fn push_scope(&mut self, show_line: Option<LineId>) -> ScopeId {
        let id = ScopeId(self.derivation.scopes.len());
        let parent = self.current;
        let index = self.derivation.scope(parent).parts.len();
        self.derivation.scopes.push(Scope {
            parts: Vec::new(),
            show_line,
            parent: Some(parent),
            index,
        });
        self.derivation.scopes[parent.0].parts.push(Part::Scope(id));
        self.current = id;
        id
    }
}

impl Default for DerivationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Is a line of a proof document.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LineInput {
    pub number: usize,
    pub formula: String,
    #[serde(default)]
    pub justification: String,
}

/// Is a part of a proof document: a line, a show line with the subderivation that completes
/// it, or a plain subderivation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartInput {
    Line(LineInput),
    Show { show: LineInput, parts: Vec<PartInput> },
    Scope { parts: Vec<PartInput> },
}

/// Is a submitted derivation: the premises and conclusion the learner was shown, and the
/// parts of the proof that follow the premises.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ProofInput {
    #[serde(default)]
    pub premises: Vec<String>,
    #[serde(default)]
    pub conclusion: String,
    pub parts: Vec<PartInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Derivation {
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P ∨ Q", "Pr")
            .open()
            .line(2, "P", "Hyp")
            .line(3, "Q ∨ P", "2 ∨I")
            .close()
            .open()
            .line(4, "Q", "Hyp")
            .line(5, "Q ∨ P", "4 ∨I")
            .close()
            .line(6, "Q ∨ P", "1, 2–3, 4–5 ∨E");
        builder.build()
    }

    #[test]
    fn structure() {
        let derivation = nested();
        assert_eq!(6, derivation.len());
        let numbers: Vec<usize> = derivation
            .flatten()
            .into_iter()
            .map(|l| derivation.line(l).number)
            .collect();
        assert_eq!(vec![1, 2, 3, 4, 5, 6], numbers);

        let top: Vec<usize> = derivation
            .top_lines(Derivation::ROOT)
            .into_iter()
            .map(|l| derivation.line(l).number)
            .collect();
        assert_eq!(vec![1, 6], top);

        let first = ScopeId(1);
        assert_eq!(Some(LineId(1)), derivation.first_line(first));
        assert_eq!(Some(LineId(2)), derivation.last_line(first));
        assert_eq!(Some(Derivation::ROOT), derivation.scope(first).parent);
        assert!(derivation.encloses(Derivation::ROOT, LineId(2)));
        assert!(!derivation.encloses(ScopeId(2), LineId(2)));
    }

    #[test]
    fn show_lines() {
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "Q", "PR")
            .show(2, "P → Q", "CD")
            .line(3, "P", "ACD")
            .line(4, "Q", "1 R")
            .close();
        let derivation = builder.build();

        let show = LineId(1);
        assert!(derivation.line(show).show);
        let scope = derivation.owned_scope(show).unwrap();
        assert_eq!(Some(show), derivation.scope(scope).show_line);
        assert_eq!(scope, derivation.home(show));
        assert_eq!((Derivation::ROOT, 1), derivation.position(show));
        assert_eq!(Some(show), derivation.first_line(scope));
        assert_eq!(Some(LineId(3)), derivation.last_line(scope));
        assert_eq!(vec![LineId(0), show], derivation.top_lines(Derivation::ROOT));
        assert!(derivation.encloses(scope, show));
    }

    #[test]
    fn proof_input() {
        let json = r#"{
            "premises": ["Q"],
            "conclusion": "P → Q",
            "parts": [
                {"show": {"number": 2, "formula": "P → Q", "justification": "CD"},
                 "parts": [
                    {"number": 3, "formula": "P", "justification": "ACD"},
                    {"number": 4, "formula": "Q", "justification": "1 R"}
                 ]},
                {"parts": [{"number": 5, "formula": "P"}]}
            ]
        }"#;
        let input: ProofInput = serde_json::from_str(json).unwrap();
        assert_eq!(2, input.parts.len());
        match &input.parts[1] {
            PartInput::Scope { parts } => assert_eq!(1, parts.len()),
            _ => panic!("expected a subderivation"),
        }

        let derivation = Derivation::from_input(&input.premises, "PR", &input.parts);
        assert_eq!(5, derivation.len());
        assert_eq!("PR", derivation.line(LineId(0)).justification);
        assert!(derivation.line(LineId(1)).show);
        assert_eq!("", derivation.line(LineId(4)).justification);
        assert_eq!(2, derivation.top_lines(Derivation::ROOT).len());
    }
}
