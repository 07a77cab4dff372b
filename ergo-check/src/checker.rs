/*! Checks a derivation against a deductive system.

A check runs in stages over an immutable [`Derivation`]:

1. **Analyze** reads every formula and maps line numbers to lines, reporting duplicate and
missing numbers.
2. **Check justifications** reads every justification, resolves the cited rule and verifies that
each cited line and range is available to the citing line.
3. **Check rules** matches every line against the forms of its rule. Premise lines must be
premises of the problem; assumptions must be licensed by the show line they serve.
4. **Trace dependencies** marks every line that relies on a line with an error.
5. **Check final conclusion** verifies that the main derivation reaches the conclusion.
6. **Weigh errors** turns the errors into a fraction of credit.

Errors never stop a check: every line is examined and the [`Report`] lists every error found.

[`Derivation`]: crate::derivation::Derivation
[`Report`]: crate::checker::Report
*/
use crate::{
    config::CheckOptions,
    derivation::{Derivation, LineId, Part, ScopeId},
    justification::Justification,
    matcher::{extend_assignment, Assignment, Freshness, Match, Matcher, SubderivationView},
    report::{Category, ErrorReport, Severity},
    schema::{FreshScope, RuleSchema, System},
    trace,
};
use ergo_fol::{Formula, ParseContext};
use petgraph::{
    graph::{DiGraph, NodeIndex},
    Direction,
};
use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    sync::Arc,
};
use tracing::{debug, info, span, trace, Level};

/// Is the problem a derivation solves.
#[derive(Clone, Debug)]
pub struct Problem {
    pub premises: Vec<Arc<Formula>>,
    pub conclusion: Arc<Formula>,
}

impl Problem {
    pub fn new(premises: Vec<Arc<Formula>>, conclusion: Arc<Formula>) -> Self {
        Self {
            premises,
            conclusion,
        }
    }

    /// Reads the premises and the conclusion of a problem.
    pub fn parse(ctx: &ParseContext, premises: &[String], conclusion: &str) -> Self {
        Self::new(
            premises.iter().map(|p| ctx.parse(p)).collect(),
            ctx.parse(conclusion),
        )
    }
}

/// Is what a check learned about a line.
#[derive(Clone, Debug)]
pub struct LineReport {
    pub id: LineId,
    pub number: usize,
    pub formula: Arc<Formula>,
    pub show: bool,
    pub justification: Justification,

    /// Is the canonical name of the cited rule, if it is a rule of the system.
    pub rule: Option<String>,

    /// Is true if the line fits its rule.
    pub matched: bool,

    /// Is true if the rule does not count as progress.
    pub trivial: bool,
}

/// Is the outcome of a check.
#[derive(Clone, Debug)]
pub struct Report {
    pub errors: ErrorReport,

    /// Is the fraction of credit the derivation earns, between 0 and 1.
    pub points_portion: f64,

    /// Are the lines in the order they appear.
    pub lines: Vec<LineReport>,

    pub line_map: BTreeMap<usize, LineId>,
}

impl Report {
    pub fn is_correct(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of lines that apply a non-trivial rule without any error.
    pub fn progress(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.matched && !l.trivial && !self.errors.has_errors(l.number))
            .count()
    }
}

enum Verdict {
    Fits,
    Fails(String),
    Unknown,
}

/// Lines and subderivations a line may cite.
#[derive(Default)]
struct Available {
    lines: HashSet<LineId>,
    scopes: HashSet<ScopeId>,
}

struct State<'d> {
    derivation: &'d Derivation,
    problem: &'d Problem,
    order: Vec<LineId>,
    line_map: BTreeMap<usize, LineId>,
    formulas: Vec<Arc<Formula>>,
    justifications: Vec<Justification>,
    rules: Vec<Option<usize>>,
    cited_lines: Vec<Vec<LineId>>,
    cited_scopes: Vec<Vec<ScopeId>>,
    counts_fit: Vec<bool>,
    matched: Vec<bool>,
    errors: ErrorReport,
}

impl<'d> State<'d> {
    fn new(ctx: &ParseContext, problem: &'d Problem, derivation: &'d Derivation) -> Self {
        let size = derivation.len();
        Self {
            derivation,
            problem,
            order: derivation.flatten(),
            line_map: BTreeMap::new(),
            formulas: (0..size)
                .map(|i| ctx.parse(&derivation.line(LineId(i)).formula))
                .collect(),
            justifications: vec![Justification::default(); size],
            rules: vec![None; size],
            cited_lines: vec![Vec::new(); size],
            cited_scopes: vec![Vec::new(); size],
            counts_fit: vec![true; size],
            matched: vec![false; size],
            errors: ErrorReport::new(),
        }
    }

    #[inline(always)]
    fn number(&self, line: LineId) -> usize {
        self.derivation.line(line).number
    }

    #[inline(always)]
    fn formula(&self, line: LineId) -> &Arc<Formula> {
        &self.formulas[line.0]
    }
}

/// Checks derivations under a deductive system.
///
/// **Example**:
/// ```rust
/// use ergo_check::{
///     checker::{Checker, Problem},
///     config::CheckOptions,
///     derivation::DerivationBuilder,
///     schema::System,
/// };
/// use ergo_fol::ParseContext;
///
/// let ctx = ParseContext::default();
/// let system = System::builtin("fitch").unwrap();
/// let options = CheckOptions::default();
/// let problem = Problem::parse(&ctx, &["P → Q".into(), "P".into()], "Q");
///
/// let mut builder = DerivationBuilder::new();
/// builder
///     .line(1, "P → Q", "Pr")
///     .line(2, "P", "Pr")
///     .line(3, "Q", "2, 1 →E");
///
/// let report = Checker::new(&ctx, &system, &options).check(&problem, &builder.build());
/// assert!(report.is_correct());
/// assert_eq!(1.0, report.points_portion);
/// ```
pub struct Checker<'c> {
    ctx: &'c ParseContext,
    system: &'c System,
    options: &'c CheckOptions,
}

impl<'c> Checker<'c> {
    pub fn new(ctx: &'c ParseContext, system: &'c System, options: &'c CheckOptions) -> Self {
        Self {
            ctx,
            system,
            options,
        }
    }

    /// Checks `derivation` as a solution of `problem`.
    pub fn check(&self, problem: &Problem, derivation: &Derivation) -> Report {
        let span = span!(Level::TRACE, trace::CHECK, lines = derivation.len());
        let _enter = span.enter();

        let mut state = State::new(self.ctx, problem, derivation);
        self.analyze(&mut state);
        self.check_justifications(&mut state);
        self.check_rules(&mut state);
        self.trace_dependencies(&mut state);
        self.check_final_conclusion(&mut state);
        let points_portion = self.weigh_errors(&state.errors);
        info!(
            event = trace::CREDIT,
            result = points_portion,
            errors = state.errors.len(),
        );
        self.report(state, points_portion)
    }

    fn rule(&self, index: usize) -> &'c RuleSchema {
        &self.system.rules()[index]
    }

    fn analyze(&self, state: &mut State) {
        for &id in &state.order {
            let number = state.number(id);
            let formula = state.formula(id).clone();
            trace!(event = trace::LINE, line = number, formula = %formula);

            match state.line_map.entry(number) {
                Entry::Vacant(entry) => {
                    entry.insert(id);
                }
                Entry::Occupied(_) => state.errors.push(
                    number,
                    Category::Justification,
                    Severity::Low,
                    format!("line number {} is used more than once", number),
                ),
            }
            if !formula.is_well_formed() {
                state.errors.push(
                    number,
                    Category::Syntax,
                    Severity::High,
                    format!("the formula is not well-formed: {}", formula.reasons()),
                );
            }
        }

        let last = state.line_map.keys().last().cloned().unwrap_or(0);
        let missing: Vec<usize> = (1..last)
            .filter(|n| !state.line_map.contains_key(n))
            .collect();
        for missing in missing {
            if let Some((next, _)) = state.line_map.range(missing..).next() {
                let next = *next;
                state.errors.push(
                    next,
                    Category::Justification,
                    Severity::Low,
                    format!("line {} is missing", missing),
                );
            }
        }
    }

    fn check_justifications(&self, state: &mut State) {
        let derivation = state.derivation;
        for id in state.order.clone() {
            let line = derivation.line(id);
            let justification = Justification::parse(&line.justification);
            let rule = self.resolve_rule(state, id, &justification);
            state.rules[id.0] = rule;

            if justification.placeholders > 0 {
                state.errors.push(
                    line.number,
                    Category::Justification,
                    Severity::Medium,
                    "a citation has been deleted",
                );
            }

            let available = available(derivation, id);
            let own = derivation.owned_scope(id);
            let mut premises = 0;
            for &cited in &justification.lines {
                if let Some(target) = self.check_citation(state, id, &available, cited) {
                    if own.map_or(false, |s| derivation.encloses(s, target)) {
                        continue;
                    }
                    premises += 1;
                    state.cited_lines[id.0].push(target);
                }
            }
            for &(from, to) in &justification.ranges {
                if let Some(scope) = self.check_range(state, id, &available, from, to) {
                    state.cited_scopes[id.0].push(scope);
                }
            }

            if let Some(rule) = rule.map(|r| self.rule(r)) {
                let cites = !justification.lines.is_empty() || !justification.ranges.is_empty();
                let subderivations = justification.ranges.len()
                    + if line.show && rule.show_rule { 1 } else { 0 };
                if rule.premise_rule || rule.assumption_rule {
                    if cites {
                        state.errors.push(
                            line.number,
                            Category::Justification,
                            Severity::Low,
                            format!("{} takes no citations", rule),
                        );
                    }
                } else if justification.placeholders > 0 {
                    state.counts_fit[id.0] = false;
                } else if !rule.accepts_counts(premises, subderivations) {
                    state.counts_fit[id.0] = false;
                    state.errors.push(
                        line.number,
                        Category::Justification,
                        Severity::Low,
                        format!(
                            "{} does not take {} line(s) and {} subderivation(s)",
                            rule, premises, subderivations
                        ),
                    );
                }
            }
            state.justifications[id.0] = justification;
        }
    }

    fn resolve_rule(
        &self,
        state: &mut State,
        id: LineId,
        justification: &Justification,
    ) -> Option<usize> {
        let line = state.derivation.line(id);
        let name = match justification.rule() {
            Some(name) => name,
            None => {
                if line.show {
                    state.errors.push(
                        line.number,
                        Category::Completion,
                        Severity::High,
                        "the show line has not been completed",
                    );
                } else {
                    state.errors.push(
                        line.number,
                        Category::Justification,
                        Severity::High,
                        "no rule is cited",
                    );
                }
                return None;
            }
        };

        if justification.rules.len() > 1 {
            state.errors.push(
                line.number,
                Category::Justification,
                Severity::Low,
                format!("more than one rule is cited; only {} is checked", name),
            );
        }
        let index = match self.system.rule_index(name) {
            Some(index) => index,
            None => {
                state.errors.push(
                    line.number,
                    Category::Justification,
                    Severity::High,
                    format!("{} is not a rule of {}", name, self.system.name()),
                );
                return None;
            }
        };

        let rule = self.rule(index);
        let hidden = rule.hidden
            || self
                .options
                .hidden_rules
                .iter()
                .any(|h| *h == rule.name || rule.aliases.contains(h));
        if hidden {
            state.errors.push(
                line.number,
                Category::Justification,
                Severity::High,
                format!("{} may not be used in this exercise", name),
            );
            return None;
        }
        if rule.predicate_only && !self.options.predicate_logic {
            state.errors.push(
                line.number,
                Category::Justification,
                Severity::High,
                format!("{} is a rule of predicate logic", name),
            );
            return None;
        }
        Some(index)
    }

    // Returns the cited line if it exists and is not the citing line itself; the error, if
    // any, is recorded.
    fn check_citation(
        &self,
        state: &mut State,
        id: LineId,
        available: &Available,
        cited: usize,
    ) -> Option<LineId> {
        let derivation = state.derivation;
        let number = state.number(id);
        let target = match state.line_map.get(&cited) {
            Some(target) => *target,
            None => {
                state.errors.push(
                    number,
                    Category::Justification,
                    Severity::High,
                    format!("line {} does not exist", cited),
                );
                return None;
            }
        };
        trace!(event = trace::CITATION, line = number, cited = cited);

        let description = if target == id {
            state.errors.push(
                number,
                Category::Justification,
                Severity::High,
                "a line cannot cite itself",
            );
            return None;
        } else if available.lines.contains(&target) {
            return Some(target);
        } else if cited > number {
            format!("line {} comes after this line", cited)
        } else if derivation
            .owned_scope(target)
            .map_or(false, |s| derivation.encloses(s, id))
        {
            format!("line {} is a show line that is not yet complete", cited)
        } else {
            format!("line {} is no longer available", cited)
        };
        state.errors.push(
            number,
            Category::Justification,
            Severity::High,
            description,
        );
        Some(target)
    }

    // Returns the cited subderivation if the range can be resolved to one; the error, if any,
    // is recorded.
    fn check_range(
        &self,
        state: &mut State,
        id: LineId,
        available: &Available,
        from: usize,
        to: usize,
    ) -> Option<ScopeId> {
        let derivation = state.derivation;
        let number = state.number(id);
        let (first, last) = match (state.line_map.get(&from), state.line_map.get(&to)) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                state.errors.push(
                    number,
                    Category::Justification,
                    Severity::High,
                    format!("range {}–{} cites a line that does not exist", from, to),
                );
                return None;
            }
        };
        trace!(event = trace::CITATION, line = number, from = from, to = to);

        let aligned = derivation
            .scope_ids()
            .filter(|s| *s != Derivation::ROOT)
            .find(|s| {
                derivation.last_line(*s) == Some(last)
                    && (derivation.first_line(*s) == Some(first)
                        || derivation.lines_within(*s).first() == Some(&first))
            });

        let (scope, description, severity) = match aligned {
            Some(scope) if available.scopes.contains(&scope) => return Some(scope),
            Some(scope) if derivation.encloses(scope, id) => (
                Some(scope),
                format!("range {}–{} is a subderivation that is not yet complete", from, to),
                Severity::High,
            ),
            Some(scope) => (
                Some(scope),
                format!("range {}–{} is no longer available", from, to),
                Severity::High,
            ),
            None if derivation.home(first) == derivation.home(last) => {
                let home = derivation.home(first);
                (
                    if home == Derivation::ROOT { None } else { Some(home) },
                    format!("range {}–{} does not line up with a subderivation", from, to),
                    Severity::Medium,
                )
            }
            None => (
                None,
                format!("range {}–{} spans multiple subderivations", from, to),
                Severity::High,
            ),
        };
        state
            .errors
            .push(number, Category::Justification, severity, description);
        scope
    }

    fn check_rules(&self, state: &mut State) {
        for id in state.order.clone() {
            let rule = match state.rules[id.0] {
                Some(index) => self.rule(index),
                None => continue,
            };
            if !state.formula(id).is_well_formed()
                || state.justifications[id.0].placeholders > 0
                || (!self.options.thorough && !state.counts_fit[id.0])
            {
                continue;
            }

            let verdict = if rule.premise_rule {
                self.check_premise(state, id)
            } else if rule.assumption_rule {
                self.check_assumption(state, id, rule)
            } else {
                self.check_inference(state, id, rule)
            };
            match verdict {
                Verdict::Fits => state.matched[id.0] = true,
                Verdict::Fails(description) => {
                    let number = state.number(id);
                    state
                        .errors
                        .push(number, Category::Rule, Severity::High, description);
                }
                Verdict::Unknown => (),
            }
        }
    }

    fn check_premise(&self, state: &State, id: LineId) -> Verdict {
        let formula = state.formula(id);
        if state.derivation.position(id).0 != Derivation::ROOT {
            Verdict::Fails("a premise may only appear in the main derivation".to_owned())
        } else if state.problem.premises.iter().any(|p| p == formula) {
            Verdict::Fits
        } else {
            Verdict::Fails(format!("{} is not a premise of the problem", formula))
        }
    }

    fn check_assumption(&self, state: &State, id: LineId, rule: &RuleSchema) -> Verdict {
        let derivation = state.derivation;
        let formula = state.formula(id);
        let (scope, _) = derivation.position(id);
        let opens = scope != Derivation::ROOT
            && derivation.scope(scope).parts.first() == Some(&Part::Line(id));
        if !opens {
            return Verdict::Fails("an assumption may only open a subderivation".to_owned());
        }

        let served = derivation
            .ancestors(scope)
            .find_map(|s| derivation.scope(s).show_line);
        let served_rule = served
            .and_then(|s| state.rules[s.0])
            .map(|r| self.rule(r));

        for form in &rule.forms {
            let mut assignment = Assignment::new();
            if !extend_assignment(&form.conclusion, formula, &mut assignment) {
                continue;
            }
            if let Some(goal) = &form.goal {
                let fits = served.map_or(false, |s| {
                    extend_assignment(goal, state.formula(s), &mut assignment)
                });
                if !fits {
                    continue;
                }
            }
            if let Some(served_rule) = served_rule {
                if !form.discharged_by.is_empty() && !form.discharged_by.contains(&served_rule.name)
                {
                    continue;
                }
            }
            return Verdict::Fits;
        }

        match served {
            Some(show) => Verdict::Fails(format!(
                "{} cannot be assumed by {} to show {}",
                formula,
                rule,
                state.formula(show)
            )),
            None => Verdict::Fails(format!("{} cannot be assumed by {}", formula, rule)),
        }
    }

    fn check_inference(&self, state: &State, id: LineId, rule: &RuleSchema) -> Verdict {
        let derivation = state.derivation;
        let line = derivation.line(id);
        let formula = state.formula(id);
        if rule.show_rule && !line.show {
            return Verdict::Fails(format!("{} can only complete a show line", rule));
        }
        if line.show && !rule.show_rule {
            return Verdict::Fails(format!("{} cannot complete a show line", rule));
        }

        let premises: Vec<Arc<Formula>> = state.cited_lines[id.0]
            .iter()
            .map(|l| state.formula(*l).clone())
            .collect();
        if premises.iter().any(|p| !p.is_well_formed()) {
            return Verdict::Unknown;
        }
        let views: Vec<SubderivationView> = derivation
            .owned_scope(id)
            .into_iter()
            .chain(state.cited_scopes[id.0].iter().cloned())
            .map(|s| self.view(state, s))
            .collect();

        let freshness = ScopeFreshness::new(self, state, id);
        let matcher = Matcher::new(self.ctx, &freshness);
        let mut best: Option<(bool, Match)> = None;
        for form in &rule.forms {
            let result = matcher.try_match(rule, form, formula, &premises, &views);
            if result.success {
                debug!(
                    event = trace::MATCH,
                    line = line.number,
                    rule = %rule,
                    assignment = %result.assignment,
                );
                return Verdict::Fits;
            }
            let fits = form.premises.len() == premises.len()
                && form.subderivations.len() == views.len();
            let better = best
                .as_ref()
                .map_or(true, |(f, b)| (fits, result.stage) > (*f, b.stage));
            if better {
                best = Some((fits, result));
            }
        }
        Verdict::Fails(
            best.map(|(_, m)| m.message)
                .unwrap_or_else(|| format!("{} has no forms", rule)),
        )
    }

    // The subderivation as the matcher sees it. A subderivation without a show line opens with
    // its assumption; one with a show line opens with an assumption only if its first line is
    // justified by an assumption rule.
    fn view(&self, state: &State, scope: ScopeId) -> SubderivationView {
        let derivation = state.derivation;
        let assumption = match derivation.scope(scope).parts.first() {
            Some(Part::Line(first)) => {
                let assumed = derivation.scope(scope).show_line.is_none()
                    || state.rules[first.0].map_or(false, |r| self.rule(r).assumption_rule);
                if assumed {
                    Some(state.formula(*first).clone())
                } else {
                    None
                }
            }
            _ => None,
        };
        SubderivationView {
            assumption,
            lines: derivation
                .top_lines(scope)
                .into_iter()
                .map(|l| (state.formula(l).clone(), derivation.line(l).show))
                .collect(),
        }
    }

    fn trace_dependencies(&self, state: &mut State) {
        let derivation = state.derivation;
        let mut graph = DiGraph::<LineId, ()>::new();
        let nodes: HashMap<LineId, NodeIndex> = state
            .order
            .iter()
            .map(|l| (*l, graph.add_node(*l)))
            .collect();

        for id in &state.order {
            let mut sources = state.cited_lines[id.0].clone();
            for scope in &state.cited_scopes[id.0] {
                sources.extend(derivation.scope(*scope).show_line);
                sources.extend(derivation.lines_within(*scope));
            }
            if let Some(own) = derivation.owned_scope(*id) {
                sources.extend(derivation.lines_within(own));
            }
            for source in sources.into_iter().filter(|s| s != id) {
                graph.update_edge(nodes[&source], nodes[id], ());
            }
        }

        let faulty: Vec<NodeIndex> = state
            .order
            .iter()
            .filter(|l| state.errors.has_errors(state.number(**l)))
            .map(|l| nodes[l])
            .collect();
        let mut reached: HashSet<NodeIndex> = faulty.iter().cloned().collect();
        let mut queue: VecDeque<NodeIndex> = faulty.into_iter().collect();
        while let Some(node) = queue.pop_front() {
            let source = state.number(graph[node]);
            let dependents: Vec<NodeIndex> = graph
                .neighbors_directed(node, Direction::Outgoing)
                .collect();
            for next in dependents {
                if reached.insert(next) {
                    let number = state.number(graph[next]);
                    trace!(event = trace::DEPENDENCY, line = number, source = source);
                    state.errors.push(
                        number,
                        Category::Dependency,
                        Severity::Medium,
                        format!("relies on line {}, which has an error", source),
                    );
                    queue.push_back(next);
                }
            }
        }
    }

    fn check_final_conclusion(&self, state: &mut State) {
        let conclusion = state.problem.conclusion.clone();
        let reached = state
            .derivation
            .top_lines(Derivation::ROOT)
            .into_iter()
            .any(|l| *state.formula(l) == conclusion);
        if !reached {
            state.errors.push(
                1,
                Category::Completion,
                Severity::High,
                format!("the derivation does not reach its conclusion {}", conclusion),
            );
        }
    }

    // Subtracts, for every line, the weight of its worst error that is not a dependency.
    fn weigh_errors(&self, errors: &ErrorReport) -> f64 {
        if errors.is_empty() {
            return 1.0;
        }
        if !self.options.thorough {
            return 0.0;
        }
        let mut worst: BTreeMap<usize, Severity> = BTreeMap::new();
        for record in errors
            .records()
            .iter()
            .filter(|r| r.category != Category::Dependency)
        {
            let entry = worst.entry(record.line).or_insert(record.severity);
            if record.severity > *entry {
                *entry = record.severity;
            }
        }
        let penalty: f64 = worst.values().map(|s| self.options.weights.of(*s)).sum();
        (1.0 - penalty).max(0.0)
    }

    fn report(&self, state: State, points_portion: f64) -> Report {
        let lines = state
            .order
            .iter()
            .map(|&id| {
                let line = state.derivation.line(id);
                let rule = state.rules[id.0].map(|r| self.rule(r));
                LineReport {
                    id,
                    number: line.number,
                    formula: state.formula(id).clone(),
                    show: line.show,
                    justification: state.justifications[id.0].clone(),
                    rule: rule.map(|r| r.name.clone()),
                    matched: state.matched[id.0],
                    trivial: rule.map_or(false, |r| r.trivial),
                }
            })
            .collect();
        Report {
            errors: state.errors,
            points_portion,
            lines,
            line_map: state.line_map,
        }
    }
}

// Walks backward from `id` through the preceding parts of its scope, then through the parts
// preceding each enclosing scope. A closed subderivation contributes its show line.
fn preceding(derivation: &Derivation, id: LineId) -> Available {
    let mut result = Available::default();
    let (mut scope, mut index) = derivation.position(id);
    loop {
        for part in derivation.scope(scope).parts[..index].iter() {
            match part {
                Part::Line(line) => {
                    result.lines.insert(*line);
                }
                Part::Scope(inner) => {
                    result.scopes.insert(*inner);
                    result.lines.extend(derivation.scope(*inner).show_line);
                }
            }
        }
        let current = derivation.scope(scope);
        match current.parent {
            Some(parent) => {
                index = current.index;
                scope = parent;
            }
            None => break,
        }
    }
    result
}

// A show line may also cite the top level of the subderivation that completes it.
fn available(derivation: &Derivation, id: LineId) -> Available {
    let mut result = preceding(derivation, id);
    if let Some(own) = derivation.owned_scope(id) {
        result.lines.extend(derivation.top_lines(own));
        for part in &derivation.scope(own).parts {
            if let Part::Scope(inner) = part {
                result.scopes.insert(*inner);
            }
        }
    }
    result
}

/// A name is new to a line if nothing the line may rely on mentions it. Depending on the rule,
/// that is the premises and open assumptions, or every available line together with the show
/// lines the line is nested in.
struct ScopeFreshness {
    assumed: BTreeSet<char>,
    used: BTreeSet<char>,
}

impl ScopeFreshness {
    fn new(checker: &Checker, state: &State, id: LineId) -> Self {
        let derivation = state.derivation;
        let lines = preceding(derivation, id).lines;
        let assumed = lines
            .iter()
            .filter(|l| {
                state.rules[l.0].map_or(false, |r| {
                    let rule = checker.rule(r);
                    rule.premise_rule || rule.assumption_rule
                })
            })
            .flat_map(|l| state.formula(*l).names().clone())
            .collect();
        let enclosing = derivation
            .ancestors(derivation.position(id).0)
            .filter_map(|s| derivation.scope(s).show_line);
        let used = lines
            .iter()
            .cloned()
            .chain(enclosing)
            .flat_map(|l| state.formula(l).names().clone())
            .collect();
        Self { assumed, used }
    }
}

impl Freshness for ScopeFreshness {
    fn is_fresh(&self, name: char, scope: FreshScope) -> bool {
        match scope {
            FreshScope::Assumptions => !self.assumed.contains(&name),
            FreshScope::Lines => !self.used.contains(&name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    fn check(system: &System, problem: &Problem, derivation: &Derivation) -> Report {
        check_with(system, problem, derivation, &CheckOptions::default())
    }

    fn check_with(
        system: &System,
        problem: &Problem,
        derivation: &Derivation,
        options: &CheckOptions,
    ) -> Report {
        let ctx = standard();
        Checker::new(&ctx, system, options).check(problem, derivation)
    }

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn modus_ponens_in_either_order() {
        let ctx = standard();
        let problem = problem(&ctx, &["P → Q", "P"], "Q");
        for justification in &["2,1 →E", "1, 2 →E"] {
            let mut builder = DerivationBuilder::new();
            builder
                .line(1, "P → Q", "Pr")
                .line(2, "P", "Pr")
                .line(3, "Q", justification);
            let report = check(&fitch(), &problem, &builder.build());
            assert!(report.is_correct(), "{:?}", report.errors);
            assert!(close(1.0, report.points_portion));
            assert_eq!(1, report.progress());
            assert_eq!(Some("→E".to_owned()), report.lines[2].rule);
        }
    }

    #[test]
    fn closed_sibling_is_unavailable() {
        let ctx = standard();
        let problem = problem(&ctx, &["P ∨ Q"], "Q ∨ P");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P ∨ Q", "Pr")
            .open()
            .line(2, "P", "Hyp")
            .line(3, "Q ∨ P", "2 ∨I")
            .close()
            .open()
            .line(4, "Q", "Hyp")
            .line(5, "Q ∨ P", "2 ∨I")
            .close()
            .line(6, "Q ∨ P", "1, 2–3, 4–5 ∨E");
        let report = check(&fitch(), &problem, &builder.build());
        assert_eq!(
            vec![
                (5, Category::Justification, Severity::High),
                (6, Category::Dependency, Severity::Medium),
            ],
            errors_of(&report)
        );
        assert!(close(0.8, report.points_portion));
        assert_eq!(1, report.progress());
    }

    #[test]
    fn disjunction_elimination() {
        let ctx = standard();
        let problem = problem(&ctx, &["P ∨ Q"], "Q ∨ P");
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
            .line(6, "Q ∨ P", "1, 4–5, 2–3 ∨E");
        let report = check(&fitch(), &problem, &builder.build());
        assert!(report.is_correct(), "{:?}", report.errors);
        assert_eq!(3, report.progress());
    }

    #[test]
    fn misaligned_range() {
        let ctx = standard();
        let problem = problem(&ctx, &["P → Q"], "P → Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P → Q", "Pr")
            .open()
            .line(2, "P", "Hyp")
            .line(3, "Q", "1, 2 →E")
            .line(4, "Q", "3 R")
            .close()
            .line(5, "P → Q", "2–3 →I");
        let report = check(&fitch(), &problem, &builder.build());
        assert_eq!(
            vec![(5, Category::Justification, Severity::Medium)],
            errors_of(&report)
        );
        assert!(close(0.85, report.points_portion));
    }

    #[test]
    fn range_spanning_scopes() {
        let ctx = standard();
        let problem = problem(&ctx, &["P → Q"], "P → Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P → Q", "Pr")
            .open()
            .line(2, "P", "Hyp")
            .line(3, "Q", "1, 2 →E")
            .close()
            .line(4, "P → Q", "1–3 →I");
        let report = check(&fitch(), &problem, &builder.build());
        let errors = errors_of(&report);
        assert_eq!((4, Category::Justification, Severity::High), errors[0]);
        assert!(report.errors.records()[0]
            .description
            .contains("spans multiple subderivations"));
    }

    #[test]
    fn open_subderivation_is_unavailable() {
        let ctx = standard();
        let problem = problem(&ctx, &["P"], "P → P");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P", "Pr")
            .open()
            .line(2, "P", "Hyp")
            .line(3, "P → P", "2–3 →I")
            .close()
            .line(4, "P → P", "3 R");
        let report = check(&fitch(), &problem, &builder.build());
        let errors = errors_of(&report);
        assert!(errors.contains(&(3, Category::Justification, Severity::High)));
        assert!(errors.contains(&(4, Category::Justification, Severity::High)));
    }

    #[test]
    fn later_and_missing_lines() {
        let ctx = standard();
        let problem = problem(&ctx, &["P"], "P ∧ P");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P", "Pr")
            .line(3, "P ∧ P", "1, 4 ∧I")
            .line(4, "P", "1 R")
            .line(4, "P", "1 R");
        let report = check(&fitch(), &problem, &builder.build());
        let errors = errors_of(&report);
        assert!(errors.contains(&(3, Category::Justification, Severity::Low)));
        assert!(errors.contains(&(3, Category::Justification, Severity::High)));
        assert!(errors.contains(&(4, Category::Justification, Severity::Low)));
    }

    #[test]
    fn rule_resolution() {
        let ctx = standard();
        let problem = problem(&ctx, &["P", "Q"], "P ∧ Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P", "Pr")
            .line(2, "Q", "Pr")
            .line(3, "P ∧ Q", "1, 2 Conj")
            .line(4, "P ∧ Q", "1, 2 ∧I ∧E")
            .line(5, "P ∧ Q", "1 ∧I")
            .line(6, "P ∧ Q", "")
            .line(7, "R", "Pr");
        let report = check(&fitch(), &problem, &builder.build());
        assert_eq!(
            vec![
                (3, Category::Justification, Severity::High),
                (4, Category::Justification, Severity::Low),
                (5, Category::Justification, Severity::Low),
                (6, Category::Justification, Severity::High),
                (5, Category::Rule, Severity::High),
                (7, Category::Rule, Severity::High),
            ],
            errors_of(&report)
        );
        // 3, 5, 6 and 7 high; 4 low
        assert!(close(0.1, report.points_portion));
    }

    #[test]
    fn strict_mode() {
        let ctx = standard();
        let problem = problem(&ctx, &["P", "Q"], "P ∧ Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P", "Pr")
            .line(2, "Q", "Pr")
            .line(3, "P ∧ Q", "1 ∧I");
        let options = CheckOptions {
            thorough: false,
            ..CheckOptions::default()
        };
        let report = check_with(&fitch(), &problem, &builder.build(), &options);
        assert_eq!(
            vec![(3, Category::Justification, Severity::Low)],
            errors_of(&report)
        );
        assert_eq!(0.0, report.points_portion);
    }

    #[test]
    fn hidden_and_predicate_rules() {
        let ctx = standard();
        let problem = problem(&ctx, &["∀xFx"], "Fa");
        let mut builder = DerivationBuilder::new();
        builder.line(1, "∀xFx", "Pr").line(2, "Fa", "1 ∀E");
        let derivation = builder.build();

        assert!(check(&fitch(), &problem, &derivation).is_correct());

        let options = CheckOptions {
            predicate_logic: false,
            ..CheckOptions::default()
        };
        let report = check_with(&fitch(), &problem, &derivation, &options);
        assert_eq!(
            vec![(2, Category::Justification, Severity::High)],
            errors_of(&report)
        );

        let options = CheckOptions {
            hidden_rules: vec!["∀E".to_owned()],
            ..CheckOptions::default()
        };
        let report = check_with(&fitch(), &problem, &derivation, &options);
        assert_eq!(
            vec![(2, Category::Justification, Severity::High)],
            errors_of(&report)
        );
    }

    #[test]
    fn universal_introduction_needs_a_new_name() {
        let ctx = standard();
        let problem = problem(&ctx, &["∀x(Fx ∧ Gx)", "Ha"], "∀xFx");
        for (name, correct) in &[('a', false), ('b', true)] {
            let conjunction = format!("F{} ∧ G{}", name, name);
            let conjunct = format!("F{}", name);
            let mut builder = DerivationBuilder::new();
            builder
                .line(1, "∀x(Fx ∧ Gx)", "Pr")
                .line(2, "Ha", "Pr")
                .line(3, &conjunction, "1 ∀E")
                .line(4, &conjunct, "3 ∧E")
                .line(5, "∀xFx", "4 ∀I");
            let report = check(&fitch(), &problem, &builder.build());
            if *correct {
                assert!(report.is_correct(), "{:?}", report.errors);
            } else {
                assert_eq!(
                    vec![(5, Category::Rule, Severity::High)],
                    errors_of(&report)
                );
            }
        }
    }

    #[test]
    fn existential_elimination() {
        let ctx = standard();
        let problem = problem(&ctx, &["∃xFx", "∀x(Fx → G)"], "G");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "∃xFx", "Pr")
            .line(2, "∀x(Fx → G)", "Pr")
            .open()
            .line(3, "Fa", "Hyp")
            .line(4, "Fa → G", "2 ∀E")
            .line(5, "G", "3, 4 →E")
            .close()
            .line(6, "G", "1, 3–5 ∃E");
        let report = check(&fitch(), &problem, &builder.build());
        assert!(report.is_correct(), "{:?}", report.errors);
    }

    #[test]
    fn show_lines() {
        let ctx = standard();
        let problem = problem(&ctx, &["Q"], "P → Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "Q", "PR")
            .show(2, "P → Q", "CD")
            .line(3, "P", "ACD")
            .line(4, "Q", "1 R")
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert!(report.is_correct(), "{:?}", report.errors);
        assert_eq!(1, report.progress());
    }

    #[test]
    fn unfinished_show_line() {
        let ctx = standard();
        let problem = problem(&ctx, &["Q"], "P → Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "Q", "PR")
            .show(2, "P → Q", "")
            .line(3, "P", "ACD")
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert_eq!(
            vec![(2, Category::Completion, Severity::High)],
            errors_of(&report)
        );
    }

    #[test]
    fn assumption_must_serve_its_show_line() {
        let ctx = standard();
        let problem = problem(&ctx, &["Q"], "P → Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "Q", "PR")
            .show(2, "P → Q", "CD")
            .line(3, "¬Q", "ACD")
            .line(4, "Q", "1 R")
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert_eq!(
            vec![
                (2, Category::Rule, Severity::High),
                (3, Category::Rule, Severity::High),
            ],
            errors_of(&report)
        );

        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "Q", "PR")
            .show(2, "P → Q", "CD")
            .line(3, "¬(P → Q)", "AID")
            .line(4, "Q", "1 R")
            .close();
        let report = check(&km(), &problem, &builder.build());
        let errors = errors_of(&report);
        assert!(errors.contains(&(3, Category::Rule, Severity::High)));
    }

    #[test]
    fn incomplete_show_line_cannot_be_cited() {
        let ctx = standard();
        let problem = problem(&ctx, &["Q"], "P → Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "Q", "PR")
            .show(2, "P → Q", "CD")
            .line(3, "P", "ACD")
            .line(4, "P → Q", "2 R")
            .line(5, "Q", "1 R")
            .close();
        let report = check(&km(), &problem, &builder.build());
        let errors = report.errors.records();
        assert_eq!(4, errors[0].line);
        assert_eq!(Category::Justification, errors[0].category);
        assert_eq!(
            "line 2 is a show line that is not yet complete",
            errors[0].description
        );
    }

    #[test]
    fn indirect_derivation() {
        let ctx = standard();
        let problem = problem(&ctx, &["P → Q", "¬Q"], "¬P");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P → Q", "PR")
            .line(2, "¬Q", "PR")
            .show(3, "¬P", "ID")
            .line(4, "P", "AID")
            .line(5, "Q", "1, 4 MP")
            .line(6, "¬Q", "2 R")
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert!(report.is_correct(), "{:?}", report.errors);
    }

    #[test]
    fn final_conclusion() {
        let ctx = standard();
        let problem = problem(&ctx, &["P", "Q"], "P ∧ Q");
        let mut builder = DerivationBuilder::new();
        builder.line(1, "P", "Pr").line(2, "Q", "Pr");
        let report = check(&fitch(), &problem, &builder.build());
        assert_eq!(
            vec![(1, Category::Completion, Severity::High)],
            errors_of(&report)
        );
        assert!(close(0.8, report.points_portion));
    }

    #[test]
    fn malformed_lines() {
        let ctx = standard();
        let problem = problem(&ctx, &["P", "Q"], "P ∧ Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P", "Pr")
            .line(2, "Q", "Pr")
            .line(3, "P ∧ Q ∨ R", "1, 2 ∧I")
            .line(4, "P ∧ Q", "3 R");
        let report = check(&fitch(), &problem, &builder.build());
        assert_eq!(
            vec![
                (3, Category::Syntax, Severity::High),
                (4, Category::Dependency, Severity::Medium),
            ],
            errors_of(&report)
        );
        assert!(close(0.8, report.points_portion));
    }

    #[test]
    fn placeholder_citation() {
        let ctx = standard();
        let problem = problem(&ctx, &["P", "Q"], "P ∧ Q");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "P", "Pr")
            .line(2, "Q", "Pr")
            .line(3, "P ∧ Q", "1, ? ∧I");
        let report = check(&fitch(), &problem, &builder.build());
        assert_eq!(
            vec![(3, Category::Justification, Severity::Medium)],
            errors_of(&report)
        );
        assert!(close(0.85, report.points_portion));
    }

    #[test]
    fn existential_instantiation() {
        let ctx = standard();
        let problem = problem(&ctx, &["∃xFx"], "∃x(Fx ∨ Gx)");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "∃xFx", "PR")
            .show(2, "∃x(Fx ∨ Gx)", "DD")
            .line(3, "Fa", "1 EI")
            .line(4, "Fa ∨ Ga", "3 ADD")
            .line(5, "∃x(Fx ∨ Gx)", "4 EG")
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert!(report.is_correct(), "{:?}", report.errors);
        assert_eq!(4, report.progress());
    }

    #[test]
    fn existential_instantiation_needs_a_name_new_to_every_line() {
        let ctx = standard();
        let joint = problem(&ctx, &["∃xFx", "∃xGx"], "∃x(Fx ∧ Gx)");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "∃xFx", "PR")
            .line(2, "∃xGx", "PR")
            .show(3, "∃x(Fx ∧ Gx)", "DD")
            .line(4, "Fa", "1 EI")
            .line(5, "Ga", "2 EI")
            .line(6, "Fa ∧ Ga", "4, 5 ADJ")
            .line(7, "∃x(Fx ∧ Gx)", "6 EG")
            .close();
        let report = check(&km(), &joint, &builder.build());
        let errors = report.errors.records();
        assert_eq!(5, errors[0].line);
        assert_eq!(Category::Rule, errors[0].category);
        assert_eq!("a must be a new name for EI", errors[0].description);
        assert!(errors.iter().all(|e| e.line != 4));
        assert!(report.points_portion < 1.0);

        // the show line being completed counts as well
        let instance = problem(&ctx, &["∃xFx"], "Fa");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "∃xFx", "PR")
            .show(2, "Fa", "DD")
            .line(3, "Fa", "1 EI")
            .close();
        let report = check(&km(), &instance, &builder.build());
        assert_eq!(
            vec![
                (3, Category::Rule, Severity::High),
                (2, Category::Dependency, Severity::Medium),
            ],
            errors_of(&report)
        );
    }

    #[test]
    fn universal_derivation() {
        let ctx = standard();
        let problem = problem(&ctx, &["∀x(Fx ∧ Gx)"], "∀xFx");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "∀x(Fx ∧ Gx)", "PR")
            .show(2, "∀xFx", "UD")
            .show(3, "Fa", "DD")
            .line(4, "Fa ∧ Ga", "1 UI")
            .line(5, "Fa", "4 S")
            .close()
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert!(report.is_correct(), "{:?}", report.errors);
    }

    #[test]
    fn universal_derivation_rejects_an_instantiated_name() {
        let ctx = standard();
        let problem = problem(&ctx, &["∃xFx"], "∀xFx");
        let mut builder = DerivationBuilder::new();
        builder
            .line(1, "∃xFx", "PR")
            .line(2, "Fa", "1 EI")
            .show(3, "∀xFx", "UD")
            .show(4, "Fa", "DD")
            .line(5, "Fa", "2 R")
            .close()
            .close();
        let report = check(&km(), &problem, &builder.build());
        assert_eq!(
            vec![(3, Category::Rule, Severity::High)],
            errors_of(&report)
        );
        assert_eq!(
            "a must be a new name for UD",
            report.errors.records()[0].description
        );
    }
}
