/*! Decides whether two formulae are logically equivalent.

The [`Prover`] tries its methods in order and stops at the first that settles the question:

1. identical normal forms,
2. a lookup in an [`EquivalenceStore`] of previously proven equivalences,
3. a [tableau] refuting `P ∧ ¬Q` and `Q ∧ ¬P`; the formulae are equivalent if both close,
4. a [truth table] over a single individual, which can only show non-equivalence,
5. a search of [small domains], which can only show non-equivalence.

If no method settles it, the result is indeterminate unless the tableau saturated an open
branch. Proven equivalences are saved to the store in both directions.

[`Prover`]: crate::equivalence::Prover
[`EquivalenceStore`]: crate::equivalence::EquivalenceStore
[tableau]: crate::tableau::Tableau
[truth table]: crate::countermodel::ModelFinder::truth_table()
[small domains]: crate::countermodel::ModelFinder::finite_domains()
*/
use crate::{
    config::ProverConfig,
    countermodel::{ModelFinder, Search},
    tableau::{Status, Tableau},
    trace::{EQUIVALENCE, PROVE},
};
use ergo_fol::{Formula, ParseContext};
use serde_derive::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};
use tracing::{info, span, Level};

/// Persists proven equivalences, keyed by normal form.
///
/// Saving is an idempotent set addition; implementations need not guard concurrent writers.
pub trait EquivalenceStore {
    /// Returns the normal forms known to be equivalent to `key`.
    fn load(&self, key: &str) -> Vec<String>;

    /// Records `values` as equivalent to `key`, keeping what is already known.
    fn save(&self, key: &str, values: &[String]);
}

/// Is an in-process [`EquivalenceStore`].
///
/// [`EquivalenceStore`]: crate::equivalence::EquivalenceStore
#[derive(Default, Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EquivalenceStore for MemoryStore {
    fn load(&self, key: &str) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn save(&self, key: &str, values: &[String]) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let known = entries.entry(key.to_owned()).or_insert_with(Vec::new);
        for value in values {
            if !known.contains(value) {
                known.push(value.clone());
            }
        }
    }
}

/// Names the method that settled an equivalence test.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Identical,
    Store,
    Tableau,
    TruthTable,
    FiniteDomain,

    /// A formula is not well-formed, so only identical text counts as equivalent.
    Malformed,

    /// No method settled the test.
    None,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Method::Identical => "identical",
            Method::Store => "store",
            Method::Tableau => "tableau",
            Method::TruthTable => "truth table",
            Method::FiniteDomain => "finite domain",
            Method::Malformed => "malformed",
            Method::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// Is the outcome of an equivalence test. An indeterminate result claims nothing about
/// equivalence; `equiv` is then false.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Equivalence {
    pub equiv: bool,
    pub determinate: bool,
    pub method: Method,
}

impl Equivalence {
    fn proven(method: Method) -> Self {
        Self {
            equiv: true,
            determinate: true,
            method,
        }
    }

    fn refuted(method: Method) -> Self {
        Self {
            equiv: false,
            determinate: true,
            method,
        }
    }

    fn indeterminate() -> Self {
        Self {
            equiv: false,
            determinate: false,
            method: Method::None,
        }
    }
}

/// Tests formulae for equivalence.
///
/// **Example**:
/// ```rust
/// use ergo_check::{config::ProverConfig, equivalence::{Method, Prover}};
/// use ergo_fol::ParseContext;
///
/// let ctx = ParseContext::default();
/// let config = ProverConfig::default();
/// let prover = Prover::new(&ctx, &config);
///
/// let result = prover.equivalent(&ctx.parse("¬(P ∧ Q)"), &ctx.parse("¬P ∨ ¬Q"));
/// assert!(result.equiv && result.determinate);
/// assert_eq!(Method::Tableau, result.method);
///
/// let result = prover.equivalent(&ctx.parse("P ∨ Q"), &ctx.parse("P ∧ Q"));
/// assert!(!result.equiv && result.determinate);
/// ```
pub struct Prover<'p> {
    ctx: &'p ParseContext,
    config: &'p ProverConfig,
    store: Option<&'p dyn EquivalenceStore>,
}

impl<'p> Prover<'p> {
    pub fn new(ctx: &'p ParseContext, config: &'p ProverConfig) -> Self {
        Self {
            ctx,
            config,
            store: None,
        }
    }

    /// Consults and extends `store`.
    pub fn with_store(self, store: &'p dyn EquivalenceStore) -> Self {
        Self {
            store: Some(store),
            ..self
        }
    }

    /// Tests `first` and `second` within the configured budget.
    pub fn equivalent(&self, first: &Arc<Formula>, second: &Arc<Formula>) -> Equivalence {
        self.equivalent_before(first, second, Instant::now() + self.config.budget)
    }

    /// Tests `first` and `second`, giving up on the costly methods at `deadline`.
    pub fn equivalent_before(
        &self,
        first: &Arc<Formula>,
        second: &Arc<Formula>,
        deadline: Instant,
    ) -> Equivalence {
        let span = span!(Level::TRACE, PROVE, first = %first, second = %second);
        let _enter = span.enter();

        let result = self.decide(first, second, deadline);
        info!(
            event = EQUIVALENCE,
            result = result.equiv,
            determinate = result.determinate,
            method = %result.method
        );
        result
    }

    fn decide(&self, first: &Arc<Formula>, second: &Arc<Formula>, deadline: Instant) -> Equivalence {
        if first == second {
            return Equivalence::proven(Method::Identical);
        }
        if !first.is_well_formed() || !second.is_well_formed() {
            return Equivalence::refuted(Method::Malformed);
        }
        if let Some(store) = self.store {
            let known = store.load(first.normal_form());
            if known.iter().any(|k| k == second.normal_form()) {
                return Equivalence::proven(Method::Store);
            }
        }

        let tableau = Tableau::new(self.ctx, self.config, deadline);
        let left = tableau.refute(&[self.ctx.conjunction(first, &self.ctx.negation(second))]);
        let right = if left == Status::Open {
            Status::Open
        } else {
            tableau.refute(&[self.ctx.conjunction(second, &self.ctx.negation(first))])
        };
        if left == Status::Closed && right == Status::Closed {
            if let Some(store) = self.store {
                store.save(first.normal_form(), &[second.normal_form().to_owned()]);
                store.save(second.normal_form(), &[first.normal_form().to_owned()]);
            }
            return Equivalence::proven(Method::Tableau);
        }

        let finder = ModelFinder::new(self.config, deadline);
        if finder.truth_table(first, second).is_found() {
            return Equivalence::refuted(Method::TruthTable);
        }
        if finder.finite_domains(first, second).is_found() {
            return Equivalence::refuted(Method::FiniteDomain);
        }
        if left == Status::Open || right == Status::Open {
            return Equivalence::refuted(Method::Tableau);
        }
        Equivalence::indeterminate()
    }
}
