/*! Implements a semantic tableau for refuting a set of formulae.

A [`Tableau`] grows branches from a set of assumptions until every branch closes on a
contradiction, some branch is saturated without closing, or it runs out of time or new names.
Formulae waiting on a branch are kept in tiers:

* **high**: decompositions that neither branch nor introduce names (`¬¬A`, `A ∧ B`, `¬(A ∨ B)`,
`¬(A → B)`),
* **medium**: decompositions that introduce a new name (`∃xA`, `¬∀xA`),
* **low**: decompositions that split the branch (`A ∨ B`, `¬(A ∧ B)`, `A → B`, `A ↔ B`,
`¬(A ↔ B)`),
* **universal**: `∀xA` and `¬∃xA`, instantiated only once every other tier is empty, with the
least used term first.

Branches are scheduled last-in-first-out: a split pushes its second half and continues with the
first.

[`Tableau`]: crate::tableau::Tableau
*/
use crate::{config::ProverConfig, trace::BRANCH};
use ergo_fol::{Formula, Op, ParseContext, Shape};
use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    sync::Arc,
    time::Instant,
};
use tracing::trace;

/// Is the outcome of growing a tableau.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Status {
    /// Every branch closed: the assumptions are unsatisfiable.
    Closed,

    /// Some branch is saturated without closing: the assumptions are satisfiable.
    Open,

    /// The deadline passed or a branch ran out of new names before either was found.
    Undecided,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Closed => "closed",
            Status::Open => "open",
            Status::Undecided => "undecided",
        };
        write!(f, "{}", name)
    }
}

enum Tier {
    Literal,
    High,
    Medium,
    Low,
    Universal,
}

fn tier(formula: &Formula) -> Tier {
    match formula.shape() {
        Shape::Atom { .. } | Shape::Falsum | Shape::Malformed => Tier::Literal,
        Shape::Binary { op: Op::And, .. } => Tier::High,
        Shape::Binary { .. } => Tier::Low,
        Shape::Quantified { op: Op::Forall, .. } => Tier::Universal,
        Shape::Quantified { .. } => Tier::Medium,
        Shape::Not(body) => match body.shape() {
            Shape::Atom { .. } | Shape::Falsum | Shape::Malformed => Tier::Literal,
            Shape::Not(_) => Tier::High,
            Shape::Binary { op: Op::And, .. } | Shape::Binary { op: Op::Iff, .. } => Tier::Low,
            Shape::Binary { .. } => Tier::High,
            Shape::Quantified { op: Op::Forall, .. } => Tier::Medium,
            Shape::Quantified { .. } => Tier::Universal,
        },
    }
}

/// Is a branch under construction.
#[derive(Clone)]
struct Branch {
    formulas: HashSet<Arc<Formula>>,
    high: VecDeque<Arc<Formula>>,
    medium: VecDeque<Arc<Formula>>,
    low: VecDeque<Arc<Formula>>,
    universals: Vec<Arc<Formula>>,

    /// Are the terms each universal has been instantiated with.
    instances: HashMap<Arc<Formula>, BTreeSet<char>>,

    /// Counts the instantiations made with each term.
    usage: HashMap<char, usize>,

    terms: BTreeSet<char>,
    reserve: VecDeque<char>,
    closed: bool,
}

impl Branch {
    fn new(reserve: VecDeque<char>) -> Self {
        Self {
            formulas: HashSet::new(),
            high: VecDeque::new(),
            medium: VecDeque::new(),
            low: VecDeque::new(),
            universals: Vec::new(),
            instances: HashMap::new(),
            usage: HashMap::new(),
            terms: BTreeSet::new(),
            reserve,
            closed: false,
        }
    }

    fn fresh_name(&mut self) -> Option<char> {
        let name = self.reserve.pop_front()?;
        self.terms.insert(name);
        Some(name)
    }

    // The least used pair of a universal and a term it has not been instantiated with.
    fn next_instance(&self) -> Option<(Arc<Formula>, char)> {
        let mut best: Option<(usize, &Arc<Formula>, char)> = None;
        for universal in &self.universals {
            let used = self.instances.get(universal);
            for term in &self.terms {
                if used.map_or(false, |u| u.contains(term)) {
                    continue;
                }
                let count = self.usage.get(term).cloned().unwrap_or(0);
                if best.map_or(true, |(c, _, _)| count < c) {
                    best = Some((count, universal, *term));
                }
            }
        }
        best.map(|(_, u, t)| (u.clone(), t))
    }
}

/// Grows tableaux under a deadline.
pub struct Tableau<'t> {
    ctx: &'t ParseContext,
    config: &'t ProverConfig,
    deadline: Instant,
}

impl<'t> Tableau<'t> {
    pub fn new(ctx: &'t ParseContext, config: &'t ProverConfig, deadline: Instant) -> Self {
        Self {
            ctx,
            config,
            deadline,
        }
    }

    /// Tries to close every branch grown from `assumptions`.
    ///
    /// **Example**:
    /// ```rust
    /// use ergo_check::{config::ProverConfig, tableau::{Status, Tableau}};
    /// use ergo_fol::ParseContext;
    /// use std::time::{Duration, Instant};
    ///
    /// let ctx = ParseContext::default();
    /// let config = ProverConfig::default();
    /// let tableau = Tableau::new(&ctx, &config, Instant::now() + Duration::from_secs(5));
    ///
    /// assert_eq!(Status::Closed, tableau.refute(&[ctx.parse("P ∧ ¬P")]));
    /// assert_eq!(Status::Open, tableau.refute(&[ctx.parse("P ∨ ¬P")]));
    /// ```
    pub fn refute(&self, assumptions: &[Arc<Formula>]) -> Status {
        let assumptions = match self.ground(assumptions) {
            Some(assumptions) => assumptions,
            None => return Status::Undecided,
        };
        let mut initial = Branch::new(self.reserve(&assumptions));
        for assumption in &assumptions {
            initial.terms.extend(assumption.free_terms().iter().cloned());
            self.add(&mut initial, assumption.clone());
        }

        let mut undecided = false;
        let mut branches = vec![initial];
        while let Some(branch) = branches.pop() {
            match self.grow(branch, &mut branches) {
                Status::Open => return Status::Open,
                Status::Undecided => undecided = true,
                Status::Closed => (),
            }
        }
        if undecided {
            Status::Undecided
        } else {
            Status::Closed
        }
    }

    // Replaces every free variable with a constant that occurs nowhere in the assumptions, so
    // that only constants instantiate quantifiers. Returns `None` if the constants run out.
    fn ground(&self, assumptions: &[Arc<Formula>]) -> Option<Vec<Arc<Formula>>> {
        let free: BTreeSet<char> = assumptions
            .iter()
            .flat_map(|a| a.free_variables().iter().cloned())
            .collect();
        if free.is_empty() {
            return Some(assumptions.to_vec());
        }
        let used: BTreeSet<char> = assumptions
            .iter()
            .flat_map(|a| a.names().iter().cloned())
            .collect();
        let mut constants = self
            .ctx
            .notation()
            .constant_chars()
            .filter(|c| !used.contains(c));
        let mut renaming = Vec::new();
        for variable in free {
            renaming.push((variable, constants.next()?));
        }
        Some(
            assumptions
                .iter()
                .map(|a| {
                    renaming.iter().fold(a.clone(), |formula, (variable, constant)| {
                        self.ctx.instantiate(&formula, *variable, *constant)
                    })
                })
                .collect(),
        )
    }

    // The new names a branch may introduce: constants that do not occur in the assumptions.
    fn reserve(&self, assumptions: &[Arc<Formula>]) -> VecDeque<char> {
        let used: BTreeSet<char> = assumptions
            .iter()
            .flat_map(|a| a.names().iter().cloned())
            .collect();
        self.ctx
            .notation()
            .constant_chars()
            .filter(|c| !used.contains(c))
            .take(self.config.fresh_terms)
            .collect()
    }

    fn grow(&self, mut branch: Branch, branches: &mut Vec<Branch>) -> Status {
        let status = loop {
            if branch.closed {
                break Status::Closed;
            }
            if Instant::now() >= self.deadline {
                break Status::Undecided;
            }

            if let Some(formula) = branch.high.pop_front() {
                for part in self.decompose(&formula) {
                    self.add(&mut branch, part);
                }
            } else if let Some(formula) = branch.medium.pop_front() {
                let name = match branch.fresh_name() {
                    Some(name) => name,
                    None => break Status::Undecided,
                };
                let instance = self.instance(&formula, name);
                self.add(&mut branch, instance);
            } else if let Some(formula) = branch.low.pop_front() {
                let (left, right) = self.split(&formula);
                let mut other = branch.clone();
                for part in right {
                    self.add(&mut other, part);
                }
                branches.push(other);
                for part in left {
                    self.add(&mut branch, part);
                }
            } else if !branch.universals.is_empty() {
                if branch.terms.is_empty() && branch.fresh_name().is_none() {
                    break Status::Undecided;
                }
                let (universal, term) = match branch.next_instance() {
                    Some(next) => next,
                    None => break Status::Open,
                };
                branch
                    .instances
                    .entry(universal.clone())
                    .or_insert_with(BTreeSet::new)
                    .insert(term);
                *branch.usage.entry(term).or_insert(0) += 1;
                let instance = self.instance(&universal, term);
                self.add(&mut branch, instance);
            } else {
                break Status::Open;
            }
        };
        trace!(
            event = BRANCH,
            result = %status,
            formulas = branch.formulas.len(),
            terms = branch.terms.len()
        );
        status
    }

    fn add(&self, branch: &mut Branch, formula: Arc<Formula>) {
        if branch.closed || branch.formulas.contains(&formula) {
            return;
        }
        let contradicts = match formula.shape() {
            Shape::Falsum => true,
            Shape::Not(body) => branch.formulas.contains(body),
            _ => branch.formulas.contains(&self.ctx.negation(&formula)),
        };
        if contradicts {
            branch.closed = true;
            return;
        }
        branch.formulas.insert(formula.clone());
        match tier(&formula) {
            Tier::Literal => (),
            Tier::High => branch.high.push_back(formula),
            Tier::Medium => branch.medium.push_back(formula),
            Tier::Low => branch.low.push_back(formula),
            Tier::Universal => branch.universals.push(formula),
        }
    }

    fn negate(&self, formula: &Formula) -> Arc<Formula> {
        self.ctx.negation(formula)
    }

    // The parts of a non-branching formula.
    fn decompose(&self, formula: &Formula) -> Vec<Arc<Formula>> {
        match formula.shape() {
            Shape::Binary {
                op: Op::And,
                left,
                right,
            } => vec![left.clone(), right.clone()],
            Shape::Not(body) => match body.shape() {
                Shape::Not(inner) => vec![inner.clone()],
                Shape::Binary {
                    op: Op::Or,
                    left,
                    right,
                } => vec![self.negate(left), self.negate(right)],
                Shape::Binary {
                    op: Op::Implies,
                    left,
                    right,
                } => vec![left.clone(), self.negate(right)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    // The two halves of a branching formula.
    fn split(&self, formula: &Formula) -> (Vec<Arc<Formula>>, Vec<Arc<Formula>>) {
        match formula.shape() {
            Shape::Binary { op, left, right } => match op {
                Op::Or => (vec![left.clone()], vec![right.clone()]),
                Op::Implies => (vec![self.negate(left)], vec![right.clone()]),
                Op::Iff => (
                    vec![left.clone(), right.clone()],
                    vec![self.negate(left), self.negate(right)],
                ),
                _ => (Vec::new(), Vec::new()),
            },
            Shape::Not(body) => match body.shape() {
                Shape::Binary {
                    op: Op::And,
                    left,
                    right,
                } => (vec![self.negate(left)], vec![self.negate(right)]),
                Shape::Binary {
                    op: Op::Iff,
                    left,
                    right,
                } => (
                    vec![left.clone(), self.negate(right)],
                    vec![self.negate(left), right.clone()],
                ),
                _ => (Vec::new(), Vec::new()),
            },
            _ => (Vec::new(), Vec::new()),
        }
    }

    // Instantiates `∀xA`, `∃xA` to `A[x/term]` and `¬∀xA`, `¬∃xA` to `¬A[x/term]`.
    fn instance(&self, formula: &Arc<Formula>, term: char) -> Arc<Formula> {
        match formula.shape() {
            Shape::Quantified { variable, body, .. } => {
                self.ctx.instantiate(body, *variable, term)
            }
            Shape::Not(inner) => match inner.shape() {
                Shape::Quantified { variable, body, .. } => {
                    self.negate(&self.ctx.instantiate(body, *variable, term))
                }
                _ => formula.clone(),
            },
            _ => formula.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use std::time::Duration;

    fn refute(ctx: &ParseContext, formulas: &[&str]) -> Status {
        let config = ProverConfig::default();
        let deadline = Instant::now() + Duration::from_secs(5);
        let assumptions: Vec<_> = formulas.iter().map(|f| ctx.parse(f)).collect();
        Tableau::new(ctx, &config, deadline).refute(&assumptions)
    }

    #[test]
    fn propositional() {
        let ctx = standard();
        assert_eq!(Status::Closed, refute(&ctx, &["P", "¬P"]));
        assert_eq!(Status::Closed, refute(&ctx, &["⊥"]));
        assert_eq!(Status::Closed, refute(&ctx, &["P → Q", "P", "¬Q"]));
        assert_eq!(Status::Closed, refute(&ctx, &["¬(P ∨ ¬P)"]));
        assert_eq!(Status::Closed, refute(&ctx, &["P ↔ Q", "P", "¬Q"]));
        assert_eq!(Status::Closed, refute(&ctx, &["¬(P ↔ P)"]));
        assert_eq!(Status::Open, refute(&ctx, &["P ∨ Q", "¬P"]));
        assert_eq!(Status::Open, refute(&ctx, &["¬(P ∧ Q)"]));
        assert_eq!(Status::Open, refute(&ctx, &["¬⊥"]));
    }

    #[test]
    fn quantified() {
        let ctx = standard();
        assert_eq!(Status::Closed, refute(&ctx, &["∀xFx", "¬Fa"]));
        assert_eq!(Status::Closed, refute(&ctx, &["∀xFx", "∃x¬Fx"]));
        assert_eq!(Status::Closed, refute(&ctx, &["¬∃xFx", "Fb"]));
        assert_eq!(Status::Closed, refute(&ctx, &["∀x(Fx → Gx)", "∀xFx", "¬∀xGx"]));
        assert_eq!(Status::Open, refute(&ctx, &["∃xFx", "∃x¬Fx"]));
        assert_eq!(Status::Open, refute(&ctx, &["∀xFx"]));
    }

    #[test]
    fn free_variables_act_as_constants() {
        let ctx = standard();
        assert_ne!(
            Status::Closed,
            refute(&ctx, &["Gy", "∀x(Gx → ∃yRxy)", "∀x¬Rxx"])
        );
        assert_ne!(Status::Closed, refute(&ctx, &["Fy", "¬Fx"]));
        assert_eq!(Status::Closed, refute(&ctx, &["∀xFx", "¬Fy"]));
        assert_eq!(Status::Closed, refute(&ctx, &["Fy ∧ ¬Fy"]));
    }

    #[test]
    fn unbounded_growth_is_undecided() {
        let ctx = standard();
        let config = ProverConfig {
            fresh_terms: 2,
            ..ProverConfig::default()
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        let assumptions = vec![ctx.parse("∀x∃yRxy"), ctx.parse("∀x¬Rxx")];
        assert_eq!(
            Status::Undecided,
            Tableau::new(&ctx, &config, deadline).refute(&assumptions)
        );
    }

    #[test]
    fn deadline() {
        let ctx = standard();
        let config = ProverConfig::default();
        let assumptions = vec![ctx.parse("∀xFx"), ctx.parse("¬Fa")];
        let past = Instant::now();
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(
            Status::Undecided,
            Tableau::new(&ctx, &config, past).refute(&assumptions)
        );
    }
}
