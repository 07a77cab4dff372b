/*! Matches a line of a derivation against the forms of a rule.

Matching a [`Form`] unifies its templates with concrete formulae, building an [`Assignment`]
for the form's metavariables. The conclusion is matched first, then the cited lines against the
premises in every order, then the cited subderivations against the obligations in every order.
Substitutions are checked as soon as their metavariables are bound, and new-name constraints
last.

[`Form`]: crate::schema::Form
[`Assignment`]: crate::matcher::Assignment
*/
use crate::{
    schema::{Form, FreshScope, Obligation, RuleSchema},
    trace::MATCH,
};
use ergo_fol::{Formula, ParseContext, Shape};
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};
use tracing::trace;

/// Is the set of names a term metavariable may denote.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Candidates {
    /// Any name; the metavariable is not constrained.
    Any,

    /// One of the given names.
    Only(BTreeSet<char>),
}

impl Candidates {
    fn intersect(&mut self, names: BTreeSet<char>) {
        *self = match self {
            Candidates::Any => Candidates::Only(names),
            Candidates::Only(current) => {
                Candidates::Only(current.intersection(&names).cloned().collect())
            }
        };
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Candidates::Any => false,
            Candidates::Only(names) => names.is_empty(),
        }
    }
}

impl fmt::Display for Candidates {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Candidates::Any => write!(f, "*"),
            Candidates::Only(names) => write!(f, "{{{}}}", names.iter().join(", ")),
        }
    }
}

/// Maps the metavariables of a form to what they denote in a line.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct Assignment {
    formulas: BTreeMap<char, Arc<Formula>>,
    variables: BTreeMap<char, char>,
    terms: BTreeMap<char, Candidates>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the formula bound to a formula metavariable.
    pub fn formula(&self, meta: char) -> Option<&Arc<Formula>> {
        self.formulas.get(&meta)
    }

    /// Returns the variable bound to a variable metavariable.
    pub fn variable(&self, meta: char) -> Option<char> {
        self.variables.get(&meta).cloned()
    }

    /// Returns the candidate names of a term metavariable.
    pub fn terms(&self, meta: char) -> Option<&Candidates> {
        self.terms.get(&meta)
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty() && self.variables.is_empty() && self.terms.is_empty()
    }

    fn constrain(&mut self, meta: char, names: BTreeSet<char>) -> bool {
        let candidates = self.terms.entry(meta).or_insert(Candidates::Any);
        candidates.intersect(names);
        !candidates.is_empty()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let formulas = self
            .formulas
            .iter()
            .map(|(m, v)| format!("{} ↦ {}", m, v.normal_form()));
        let variables = self.variables.iter().map(|(m, v)| format!("{} ↦ {}", m, v));
        let terms = self.terms.iter().map(|(m, c)| format!("{} ∈ {}", m, c));
        write!(f, "{{{}}}", formulas.chain(variables).chain(terms).join(", "))
    }
}

/// Extends `assignment` so that `template` denotes `concrete`. Returns false, leaving
/// `assignment` in an unspecified state, if no consistent extension exists.
pub fn extend_assignment(
    template: &Formula,
    concrete: &Arc<Formula>,
    assignment: &mut Assignment,
) -> bool {
    if !concrete.is_well_formed() {
        return false;
    }
    match (template.shape(), concrete.shape()) {
        (Shape::Atom { predicate, terms }, _) if terms.is_empty() => {
            match assignment.formulas.get(predicate) {
                Some(bound) => bound.normal_form() == concrete.normal_form(),
                None => {
                    assignment.formulas.insert(*predicate, concrete.clone());
                    true
                }
            }
        }
        (
            Shape::Atom { predicate, terms },
            Shape::Atom {
                predicate: letter,
                terms: actual,
            },
        ) => {
            predicate == letter
                && terms.len() == actual.len()
                && terms.iter().zip(actual.iter()).all(|(meta, term)| {
                    assignment.constrain(*meta, std::iter::once(*term).collect())
                })
        }
        (Shape::Falsum, Shape::Falsum) => true,
        (Shape::Not(template), Shape::Not(concrete)) => {
            extend_assignment(template, concrete, assignment)
        }
        (
            Shape::Binary { op, left, right },
            Shape::Binary {
                op: actual,
                left: l,
                right: r,
            },
        ) => {
            op == actual
                && extend_assignment(left, l, assignment)
                && extend_assignment(right, r, assignment)
        }
        (
            Shape::Quantified { op, variable, body },
            Shape::Quantified {
                op: actual,
                variable: v,
                body: b,
            },
        ) => {
            if op != actual {
                return false;
            }
            match assignment.variables.get(variable) {
                Some(bound) if bound != v => return false,
                Some(_) => (),
                None => {
                    assignment.variables.insert(*variable, *v);
                }
            }
            extend_assignment(body, b, assignment)
        }
        _ => false,
    }
}

/// Decides whether a name occurs nowhere the line could have learned about it.
pub trait Freshness {
    fn is_fresh(&self, name: char, scope: FreshScope) -> bool;
}

/// Treats every name as new.
pub struct AnyName;

impl Freshness for AnyName {
    fn is_fresh(&self, _: char, _: FreshScope) -> bool {
        true
    }
}

/// Is a cited subderivation as seen by the matcher.
#[derive(Clone, Debug, Default)]
pub struct SubderivationView {
    /// Is the assumption that opens the subderivation.
    pub assumption: Option<Arc<Formula>>,

    /// Are the top-level lines of the subderivation, each with a flag marking show lines.
    pub lines: Vec<(Arc<Formula>, bool)>,
}

/// Is the part of a form that failed to match, in the order parts are matched.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
pub enum Stage {
    Conclusion,
    Premises,
    Subderivations,
    Substitution,
    Freshness,
}

/// Is the outcome of matching a line against a form.
#[derive(Clone, Debug)]
pub struct Match {
    pub success: bool,
    pub assignment: Assignment,

    /// Explains the failure; empty on success.
    pub message: String,

    /// Is the part that failed.
    pub stage: Option<Stage>,
}

impl Match {
    fn success(assignment: Assignment) -> Self {
        Self {
            success: true,
            assignment,
            message: String::new(),
            stage: None,
        }
    }

    fn failure(stage: Stage, message: String) -> Self {
        Self {
            success: false,
            assignment: Assignment::new(),
            message,
            stage: Some(stage),
        }
    }
}

/// Matches lines against rule forms.
pub struct Matcher<'a> {
    ctx: &'a ParseContext,
    freshness: &'a dyn Freshness,
}

impl<'a> Matcher<'a> {
    pub fn new(ctx: &'a ParseContext, freshness: &'a dyn Freshness) -> Self {
        Self { ctx, freshness }
    }

    /// Matches `formula`, justified by `rule` with the given cited lines and subderivations,
    /// against `form`.
    pub fn try_match(
        &self,
        rule: &RuleSchema,
        form: &Form,
        formula: &Arc<Formula>,
        premises: &[Arc<Formula>],
        subderivations: &[SubderivationView],
    ) -> Match {
        let result = self.match_form(rule, form, formula, premises, subderivations);
        trace!(
            event = MATCH,
            rule = %rule,
            formula = %formula,
            result = result.success,
            message = %result.message,
        );
        result
    }

    fn match_form(
        &self,
        rule: &RuleSchema,
        form: &Form,
        formula: &Arc<Formula>,
        premises: &[Arc<Formula>],
        subderivations: &[SubderivationView],
    ) -> Match {
        let mut initial = Assignment::new();
        if !extend_assignment(&form.conclusion, formula, &mut initial)
            || !self.substitute(form, &mut initial)
        {
            return Match::failure(
                Stage::Conclusion,
                format!("{} does not have the form of a conclusion of {}", formula, rule),
            );
        }

        if premises.len() != form.premises.len() {
            return Match::failure(
                Stage::Premises,
                format!(
                    "{} needs {} cited line(s) but {} are cited",
                    rule,
                    form.premises.len(),
                    premises.len()
                ),
            );
        }
        let after_premises = self.match_premises(form, premises, &initial);
        if after_premises.is_empty() {
            return Match::failure(
                Stage::Premises,
                format!("the cited lines do not fit the premises of {}", rule),
            );
        }

        if subderivations.len() != form.subderivations.len() {
            return Match::failure(
                Stage::Subderivations,
                format!(
                    "{} needs {} subderivation(s) but {} are cited",
                    rule,
                    form.subderivations.len(),
                    subderivations.len()
                ),
            );
        }
        let complete = after_premises
            .iter()
            .flat_map(|a| self.match_subderivations(form, subderivations, a))
            .collect::<Vec<_>>();
        if complete.is_empty() {
            return Match::failure(
                Stage::Subderivations,
                format!(
                    "the cited subderivations do not establish what {} requires",
                    rule
                ),
            );
        }

        let mut failure = None;
        for assignment in complete {
            match self.finish(rule, form, assignment) {
                Ok(assignment) => return Match::success(assignment),
                Err(m) => {
                    if failure.as_ref().map_or(true, |f: &Match| m.stage > f.stage) {
                        failure = Some(m);
                    }
                }
            }
        }
        failure.unwrap_or_else(|| {
            Match::failure(Stage::Subderivations, format!("{} does not apply", rule))
        })
    }

    // Every assignment extending `initial` under some order of the cited lines.
    fn match_premises(
        &self,
        form: &Form,
        premises: &[Arc<Formula>],
        initial: &Assignment,
    ) -> Vec<Assignment> {
        if premises.is_empty() {
            return vec![initial.clone()];
        }
        (0..premises.len())
            .permutations(premises.len())
            .filter_map(|order| {
                let mut assignment = initial.clone();
                let fits = form.premises.iter().zip(order.iter()).all(|(t, i)| {
                    extend_assignment(t, &premises[*i], &mut assignment)
                        && self.substitute(form, &mut assignment)
                });
                if fits {
                    Some(assignment)
                } else {
                    None
                }
            })
            .collect()
    }

    fn match_subderivations(
        &self,
        form: &Form,
        subderivations: &[SubderivationView],
        initial: &Assignment,
    ) -> Vec<Assignment> {
        if subderivations.is_empty() {
            return vec![initial.clone()];
        }
        let mut result = Vec::new();
        for order in (0..subderivations.len()).permutations(subderivations.len()) {
            let mut partial = vec![initial.clone()];
            for (obligation, i) in form.subderivations.iter().zip(order.iter()) {
                partial = partial
                    .iter()
                    .flat_map(|a| self.match_obligation(form, obligation, &subderivations[*i], a))
                    .collect();
                if partial.is_empty() {
                    break;
                }
            }
            result.extend(partial);
        }
        result
    }

    fn match_obligation(
        &self,
        form: &Form,
        obligation: &Obligation,
        view: &SubderivationView,
        initial: &Assignment,
    ) -> Vec<Assignment> {
        let mut partial = vec![initial.clone()];
        if let Some(template) = &obligation.assumption {
            let assumption = match &view.assumption {
                Some(a) => a,
                None => return Vec::new(),
            };
            partial = partial
                .into_iter()
                .filter_map(|mut a| {
                    if extend_assignment(template, assumption, &mut a) && self.substitute(form, &mut a)
                    {
                        Some(a)
                    } else {
                        None
                    }
                })
                .collect();
        }
        for need in &obligation.needs {
            let mut next = Vec::new();
            for assignment in &partial {
                for (line, show) in &view.lines {
                    if obligation.show_only && !show {
                        continue;
                    }
                    let mut assignment = assignment.clone();
                    if extend_assignment(need, line, &mut assignment)
                        && self.substitute(form, &mut assignment)
                    {
                        next.push(assignment);
                    }
                }
            }
            partial = next;
        }
        partial
    }

    // Narrows the candidates of the term metavariables of substitutions whose formula and
    // variable metavariables are bound. Returns false if a substitution cannot hold.
    fn substitute(&self, form: &Form, assignment: &mut Assignment) -> bool {
        for s in &form.substitutions {
            let (source, result, variable) = match (
                assignment.formula(s.source),
                assignment.formula(s.result),
                assignment.variable(s.variable),
            ) {
                (Some(source), Some(result), Some(variable)) => {
                    (source.clone(), result.clone(), variable)
                }
                _ => continue,
            };

            if !source.free_variables().contains(&variable) {
                if source.normal_form() != result.normal_form() {
                    return false;
                }
                assignment.terms.entry(s.term).or_insert(Candidates::Any);
                continue;
            }

            let names: BTreeSet<char> = result
                .names()
                .iter()
                .cloned()
                .filter(|t| {
                    source.is_free_for(variable, *t)
                        && self.ctx.instantiate(&source, variable, *t).normal_form()
                            == result.normal_form()
                })
                .collect();
            if !assignment.constrain(s.term, names) {
                return false;
            }
        }
        true
    }

    // Requires every substitution to be resolved and every new-name constraint to hold.
    fn finish(&self, rule: &RuleSchema, form: &Form, mut assignment: Assignment) -> Result<Assignment, Match> {
        for s in &form.substitutions {
            let bound = assignment.formula(s.source).is_some()
                && assignment.formula(s.result).is_some()
                && assignment.variable(s.variable).is_some();
            if !bound || assignment.terms(s.term).map_or(true, Candidates::is_empty) {
                return Err(Match::failure(
                    Stage::Substitution,
                    format!("the instance does not match the quantified formula of {}", rule),
                ));
            }
        }

        for meta in &form.fresh {
            let names = match assignment.terms(*meta) {
                Some(Candidates::Only(names)) => names.clone(),
                _ => continue,
            };
            let fresh: BTreeSet<char> = names
                .iter()
                .cloned()
                .filter(|n| !self.occurs_elsewhere(form, &assignment, *meta, *n))
                .filter(|n| self.freshness.is_fresh(*n, form.fresh_scope))
                .collect();
            if fresh.is_empty() {
                return Err(Match::failure(
                    Stage::Freshness,
                    format!(
                        "{} must be a new name for {}",
                        names.iter().join(" or "),
                        rule
                    ),
                ));
            }
            assignment.terms.insert(*meta, Candidates::Only(fresh));
        }
        Ok(assignment)
    }

    // A new name may only occur in the instances it was substituted into.
    fn occurs_elsewhere(&self, form: &Form, assignment: &Assignment, meta: char, name: char) -> bool {
        let instances: BTreeSet<char> = form
            .substitutions
            .iter()
            .filter(|s| s.term == meta)
            .map(|s| s.result)
            .collect();
        assignment
            .formulas
            .iter()
            .filter(|(m, _)| !instances.contains(m))
            .any(|(_, f)| f.names().contains(&name))
    }
}
