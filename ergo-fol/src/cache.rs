/*! Defines [`ParseContext`], the owner of a notation and of the cache of formulae read under it.

The cache maps normalized input text and canonical normal forms to shared formulae. Two texts
with the same normal form are read into the same value, so formulae can be compared by their
normal forms instead of by deep structural comparison. The cache is never invalidated and is
safe to share between threads.

[`ParseContext`]: crate::ParseContext
*/
use crate::{
    formula::{self, Formula, Op},
    notation::Notation,
    parser,
};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Default)]
struct Cache {
    by_text: HashMap<String, Arc<Formula>>,
    by_normal_form: HashMap<String, Arc<Formula>>,
}

/// Reads formulae under a fixed [`Notation`], memoizing every formula it builds.
///
/// **Example**:
/// ```rust
/// use ergo_fol::{Notation, ParseContext};
/// use std::sync::Arc;
///
/// let ctx = ParseContext::new(Notation::standard());
/// let first = ctx.parse("(P & Q) -> R");
/// let second = ctx.parse("[P ∧ Q] → R");
///
/// assert_eq!("(P∧Q)→R", first.normal_form());
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
///
/// [`Notation`]: crate::notation::Notation
pub struct ParseContext {
    notation: Notation,
    cache: RwLock<Cache>,
}

impl ParseContext {
    /// Creates a context with an empty cache.
    pub fn new(notation: Notation) -> Self {
        Self {
            notation,
            cache: RwLock::new(Cache::default()),
        }
    }

    #[inline(always)]
    pub fn notation(&self) -> &Notation {
        &self.notation
    }

    /// Reads `text` into a formula. A formula is always returned; callers must check
    /// [`Formula::is_well_formed`].
    ///
    /// [`Formula::is_well_formed`]: crate::formula::Formula::is_well_formed
    pub fn parse(&self, text: &str) -> Arc<Formula> {
        let normalized = parser::normalize(text, &self.notation);
        self.parse_normalized(&normalized)
    }

    /// Reads text that is already normalized.
    pub(crate) fn parse_normalized(&self, text: &str) -> Arc<Formula> {
        if let Some(formula) = self.read().by_text.get(text) {
            return formula.clone();
        }

        let built = parser::build(self, text);

        let mut cache = self.write();
        let formula = match cache.by_normal_form.get(built.normal_form()) {
            Some(existing) => existing.clone(),
            None => {
                let formula = Arc::new(built);
                cache
                    .by_normal_form
                    .insert(formula.normal_form().to_owned(), formula.clone());
                formula
            }
        };
        cache.by_text.insert(text.to_owned(), formula.clone());
        formula
    }

    /// Returns the cached formula with the given normal form.
    pub fn lookup(&self, normal_form: &str) -> Option<Arc<Formula>> {
        self.read().by_normal_form.get(normal_form).cloned()
    }

    /// Returns the number of distinct formulae in the cache.
    pub fn len(&self) -> usize {
        self.read().by_normal_form.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the negation of `formula`.
    pub fn negation(&self, formula: &Formula) -> Arc<Formula> {
        self.parse(&format!(
            "{}({})",
            self.notation.glyph(Op::Not),
            formula.normal_form()
        ))
    }

    /// Returns the conjunction of `left` and `right`.
    pub fn conjunction(&self, left: &Formula, right: &Formula) -> Arc<Formula> {
        self.parse(&format!(
            "({}){}({})",
            left.normal_form(),
            self.notation.glyph(Op::And),
            right.normal_form()
        ))
    }

    /// Returns the formula obtained by replacing the free occurrences of `variable` in
    /// `formula` with `term`. The receiver is left untouched; the result is read anew.
    pub fn instantiate(&self, formula: &Formula, variable: char, term: char) -> Arc<Formula> {
        let text = formula::render(formula, &self.notation, 0, Some((variable, term)));
        self.parse(&text)
    }

    fn read(&self) -> RwLockReadGuard<Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(Notation::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_prelude::*;
    use std::sync::Arc;

    #[test]
    fn shared_values() {
        let ctx = standard();
        let first = ctx.parse("P ∨ (Q ∧ R)");
        let second = ctx.parse("(P | [Q & R])");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &ctx.lookup("P∨(Q∧R)").unwrap()));
        assert!(ctx.lookup("Q∨P").is_none());
    }

    #[test]
    fn operands_are_cached() {
        let ctx = standard();
        assert!(ctx.is_empty());
        ctx.parse("(P ∧ Q) → (P ∧ Q)");
        // the conditional, the conjunction and its two letters
        assert_eq!(4, ctx.len());
        assert!(ctx.lookup("P∧Q").is_some());
    }

    #[test]
    fn negation_and_conjunction() {
        let ctx = standard();
        let p = ctx.parse("P ∨ Q");
        let q = ctx.parse("¬R");
        assert_eq!("¬(P∨Q)", ctx.negation(&p).normal_form());
        assert_eq!("¬¬R", ctx.negation(&q).normal_form());
        assert_eq!("(P∨Q)∧¬R", ctx.conjunction(&p, &q).normal_form());
    }

    #[test]
    fn instantiate() {
        let ctx = standard();
        let formula = ctx.parse("Fx ∧ ∀xGx");
        let instance = ctx.instantiate(&formula, 'x', 'a');
        assert_eq!("Fa∧∀xGx", instance.normal_form());
        assert_eq!("Fx∧∀xGx", formula.normal_form());

        let body = ctx.parse("∀x(Fx → Gx)");
        let matrix = body.right().unwrap();
        assert_eq!("Fb→Gb", ctx.instantiate(matrix, 'x', 'b').normal_form());

        let classic = classic();
        let formula = classic.parse("F(x) ⊃ (∃y)R(x,y)");
        assert_eq!(
            "F(c)⊃(∃y)R(c,y)",
            classic.instantiate(&formula, 'x', 'c').normal_form()
        );
    }
}
