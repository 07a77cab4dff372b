/*! Searches small finite interpretations for one that tells two formulae apart.

Finding such an interpretation proves that the formulae are not equivalent; failing to find one
proves nothing. Over a domain of one element every quantifier is vacuous and every name denotes
the same individual, so the search reduces to a truth table over the predicate letters.
*/
use crate::config::ProverConfig;
use ergo_fol::{Formula, Op, Shape};
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::Instant,
};

/// Is an interpretation over the domain `0..size`.
#[derive(Clone, Debug)]
pub struct Interpretation {
    size: usize,

    /// Maps a predicate letter and arity to its extension, one bit per tuple.
    predicates: BTreeMap<(char, usize), u64>,

    constants: BTreeMap<char, usize>,
}

impl Interpretation {
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the truth value of `formula`. Malformed formulae are false.
    pub fn satisfies(&self, formula: &Formula) -> bool {
        self.eval(formula, &mut Vec::new())
    }

    fn eval(&self, formula: &Formula, bindings: &mut Vec<(char, usize)>) -> bool {
        match formula.shape() {
            Shape::Atom { predicate, terms } => {
                let mut tuple = 0;
                for term in terms.iter().rev() {
                    tuple = tuple * self.size + self.denotation(*term, bindings);
                }
                self.predicates
                    .get(&(*predicate, terms.len()))
                    .map_or(false, |extension| *extension & (1u64 << tuple) != 0)
            }
            Shape::Falsum | Shape::Malformed => false,
            Shape::Not(body) => !self.eval(body, bindings),
            Shape::Binary { op, left, right } => {
                let left = self.eval(left, bindings);
                let right = self.eval(right, bindings);
                match op {
                    Op::And => left && right,
                    Op::Or => left || right,
                    Op::Implies => !left || right,
                    _ => left == right,
                }
            }
            Shape::Quantified { op, variable, body } => {
                let mut values = (0..self.size).map(|element| {
                    bindings.push((*variable, element));
                    let value = self.eval(body, bindings);
                    bindings.pop();
                    value
                });
                if *op == Op::Forall {
                    values.all(|v| v)
                } else {
                    values.any(|v| v)
                }
            }
        }
    }

    fn denotation(&self, term: char, bindings: &[(char, usize)]) -> usize {
        bindings
            .iter()
            .rev()
            .find(|(variable, _)| *variable == term)
            .map(|(_, element)| *element)
            .or_else(|| self.constants.get(&term).cloned())
            .unwrap_or(0)
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let size = self.size;
        let constants = self
            .constants
            .iter()
            .map(|(c, e)| format!("{} = e{}", c, e));
        let predicates = self.predicates.iter().map(|((p, arity), extension)| {
            let tuples = (0..size.pow(*arity as u32))
                .filter(|t| *extension & (1u64 << *t) != 0)
                .map(|t| {
                    let elements = (0..*arity)
                        .map(|i| format!("e{}", t / size.pow(i as u32) % size))
                        .join(", ");
                    format!("({})", elements)
                })
                .join(", ");
            if *arity == 0 {
                format!("{} = {}", p, *extension & 1 != 0)
            } else {
                format!("{} = {{{}}}", p, tuples)
            }
        });
        write!(
            f,
            "domain {{{}}}; {}",
            (0..size).map(|e| format!("e{}", e)).join(", "),
            constants.chain(predicates).join("; ")
        )
    }
}

/// Is the outcome of a search.
#[derive(Clone, Debug)]
pub enum Search {
    /// An interpretation that satisfies exactly one of the formulae.
    Found(Interpretation),

    /// Every interpretation of the searched sizes agrees on the formulae.
    NotFound,

    /// The deadline passed or the interpretation limit was reached.
    Abandoned,
}

impl Search {
    pub fn is_found(&self) -> bool {
        match self {
            Search::Found(_) => true,
            _ => false,
        }
    }
}

/// Enumerates interpretations under a deadline.
pub struct ModelFinder<'m> {
    config: &'m ProverConfig,
    deadline: Instant,
}

impl<'m> ModelFinder<'m> {
    pub fn new(config: &'m ProverConfig, deadline: Instant) -> Self {
        Self { config, deadline }
    }

    /// Searches the interpretations over a single individual.
    pub fn truth_table(&self, first: &Formula, second: &Formula) -> Search {
        self.search(first, second, 1)
    }

    /// Searches the interpretations over two up to the configured number of individuals.
    pub fn finite_domains(&self, first: &Formula, second: &Formula) -> Search {
        let mut abandoned = false;
        for size in 2..=self.config.domain_size {
            match self.search(first, second, size) {
                Search::Found(model) => return Search::Found(model),
                Search::Abandoned => abandoned = true,
                Search::NotFound => (),
            }
        }
        if abandoned {
            Search::Abandoned
        } else {
            Search::NotFound
        }
    }

    fn search(&self, first: &Formula, second: &Formula, size: usize) -> Search {
        let predicates: BTreeSet<(char, usize)> = first
            .predicates()
            .into_iter()
            .chain(second.predicates())
            .collect();
        let constants: BTreeSet<char> = first
            .free_terms()
            .iter()
            .chain(second.free_terms().iter())
            .cloned()
            .collect();

        // an extension is kept in a u64, one bit per tuple
        let mut radices = Vec::new();
        for (_, arity) in &predicates {
            let tuples = size.pow(*arity as u32);
            if tuples >= 64 {
                return Search::Abandoned;
            }
            radices.push(1u64 << tuples);
        }
        radices.extend(constants.iter().map(|_| size as u64));

        let mut digits = vec![0u64; radices.len()];
        let mut examined = 0u64;
        loop {
            if examined >= self.config.max_interpretations || Instant::now() >= self.deadline {
                return Search::Abandoned;
            }
            examined += 1;

            let interpretation = Interpretation {
                size,
                predicates: predicates.iter().cloned().zip(digits.iter().cloned()).collect(),
                constants: constants
                    .iter()
                    .cloned()
                    .zip(digits[predicates.len()..].iter().map(|d| *d as usize))
                    .collect(),
            };
            if interpretation.satisfies(first) != interpretation.satisfies(second) {
                return Search::Found(interpretation);
            }
            if !advance(&mut digits, &radices) {
                return Search::NotFound;
            }
        }
    }
}

// Steps a mixed-radix counter; false once it wraps around.
fn advance(digits: &mut [u64], radices: &[u64]) -> bool {
    for (digit, radix) in digits.iter_mut().zip(radices) {
        *digit += 1;
        if *digit < *radix {
            return true;
        }
        *digit = 0;
    }
    false
}
