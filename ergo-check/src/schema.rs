/*! Defines deductive systems as data.

A [`System`] is a named collection of [`RuleSchema`]s. Every rule lists one or more [`Form`]s:
schematic premises, a schematic conclusion and [`Obligation`]s for the subderivations the rule
discharges. Templates are formulae in the standard notation whose sentence letters (`A`, `B`,
`C`...) are formula metavariables and whose quantified variables (`x`, `y`) are variable
metavariables. Term metavariables (`a`, `b`) are introduced by [`Substitution`]s, which relate a
formula metavariable to an instance of another one.

Systems are read from JSON. Two systems are built in: `fitch` (boxed subderivations cited by
ranges) and `kalish-montague` (show lines completed by their own subderivation).

[`System`]: crate::schema::System
[`RuleSchema`]: crate::schema::RuleSchema
[`Form`]: crate::schema::Form
[`Obligation`]: crate::schema::Obligation
[`Substitution`]: crate::schema::Substitution
*/
use ergo_fol::{Formula, Notation, ParseContext, Shape};
use serde_derive::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};
use thiserror::Error;

const FITCH: &str = include_str!("../systems/fitch.json");
const KALISH_MONTAGUE: &str = include_str!("../systems/kalish-montague.json");

/// Is the type of errors raised while loading a deductive system.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown deductive system `{name}`")]
    Unknown { name: String },

    #[error("rule `{rule}`: template `{template}` is not well-formed: {reasons}")]
    Template {
        rule: String,
        template: String,
        reasons: String,
    },

    #[error("rule `{rule}`: substitution refers to `{meta}`, which does not occur in its form")]
    Substitution { rule: String, meta: char },

    #[error("rule `{rule}`: `{meta}` must be new but is not the term of a substitution")]
    Fresh { rule: String, meta: char },

    #[error("rule name `{name}` is declared more than once")]
    Duplicate { name: String },

    #[error("invalid system description: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Relates the formula metavariable `result` to `source` with `term` in place of the free
/// occurrences of `variable`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Substitution {
    pub result: char,
    pub source: char,
    pub variable: char,
    pub term: char,
}

/// Is what a new name must be new to.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshScope {
    /// The premises and open assumptions available to the line.
    Assumptions,

    /// Every line available to the line, and the show lines it is nested in.
    Lines,
}

impl Default for FreshScope {
    fn default() -> Self {
        FreshScope::Assumptions
    }
}

/// Is the JSON description of a subderivation obligation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObligationSpec {
    #[serde(default)]
    pub assumption: Option<String>,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub show_only: bool,
}

/// Is the JSON description of a form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormSpec {
    #[serde(default)]
    pub premises: Vec<String>,
    pub conclusion: String,
    #[serde(default)]
    pub subderivations: Vec<ObligationSpec>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    #[serde(default)]
    pub fresh: Vec<char>,
    #[serde(default)]
    pub fresh_scope: FreshScope,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub discharged_by: Vec<String>,
}

/// Is the JSON description of a rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub forms: Vec<FormSpec>,
    #[serde(default)]
    pub premise_rule: bool,
    #[serde(default)]
    pub assumption_rule: bool,
    #[serde(default)]
    pub show_rule: bool,
    #[serde(default)]
    pub predicate_only: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub trivial: bool,
}

/// Is the JSON description of a deductive system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemSpec {
    pub name: String,
    pub rules: Vec<RuleSpec>,
}

/// Is what a cited subderivation must establish.
#[derive(Clone, Debug)]
pub struct Obligation {
    /// Is the template of the assumption the subderivation may begin with.
    pub assumption: Option<Arc<Formula>>,

    /// Are templates that must each match a top-level line of the subderivation.
    pub needs: Vec<Arc<Formula>>,

    /// If true, the lines matching `needs` must be show lines.
    pub show_only: bool,
}

/// Is one schematic shape of a rule.
#[derive(Clone, Debug)]
pub struct Form {
    pub premises: Vec<Arc<Formula>>,
    pub conclusion: Arc<Formula>,
    pub subderivations: Vec<Obligation>,
    pub substitutions: Vec<Substitution>,

    /// Are term metavariables that must denote new names.
    pub fresh: Vec<char>,

    /// Is what the names in `fresh` must be new to.
    pub fresh_scope: FreshScope,

    /// For assumption rules, is the template of the show line the assumption serves.
    pub goal: Option<Arc<Formula>>,

    /// For assumption rules, are the rules the served show line may be completed by. Empty
    /// means any.
    pub discharged_by: Vec<String>,
}

impl Form {
    /// Returns every template of the form.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Formula>> {
        self.premises
            .iter()
            .chain(std::iter::once(&self.conclusion))
            .chain(self.subderivations.iter().flat_map(|o| {
                o.assumption.iter().chain(o.needs.iter())
            }))
            .chain(self.goal.iter())
    }
}

/// Is a named rule of a deductive system.
#[derive(Clone, Debug)]
pub struct RuleSchema {
    pub name: String,
    pub aliases: Vec<String>,
    pub forms: Vec<Form>,

    /// The line must be one of the problem's premises.
    pub premise_rule: bool,

    /// The line opens a subderivation.
    pub assumption_rule: bool,

    /// The rule completes a show line by its own subderivation.
    pub show_rule: bool,

    /// The rule is only available in exercises of predicate logic.
    pub predicate_only: bool,

    /// The rule is declared but unavailable.
    pub hidden: bool,

    /// The rule does not count as progress toward a proof.
    pub trivial: bool,
}

impl RuleSchema {
    /// Returns true if some form of the rule takes `premises` cited lines and
    /// `subderivations` cited subderivations.
    pub fn accepts_counts(&self, premises: usize, subderivations: usize) -> bool {
        self.forms
            .iter()
            .any(|f| f.premises.len() == premises && f.subderivations.len() == subderivations)
    }
}

impl fmt::Display for RuleSchema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Is a deductive system.
#[derive(Clone, Debug)]
pub struct System {
    name: String,
    rules: Vec<RuleSchema>,
    index: HashMap<String, usize>,
}

impl System {
    /// Returns the built-in system with the given name.
    ///
    /// **Example**:
    /// ```rust
    /// use ergo_check::schema::System;
    ///
    /// let system = System::builtin("fitch").unwrap();
    /// assert_eq!("∧I", system.rule("&I").unwrap().name);
    /// assert!(System::builtin("lemmon").is_err());
    /// ```
    pub fn builtin(name: &str) -> Result<Self, SchemaError> {
        match name {
            "fitch" => Self::from_json(FITCH),
            "kalish-montague" | "km" => Self::from_json(KALISH_MONTAGUE),
            _ => Err(SchemaError::Unknown {
                name: name.to_owned(),
            }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let spec: SystemSpec = serde_json::from_str(json)?;
        Self::from_spec(spec)
    }

    /// Reads the templates of `spec` and validates its substitutions.
    pub fn from_spec(spec: SystemSpec) -> Result<Self, SchemaError> {
        let ctx = ParseContext::new(Notation::standard());
        let mut rules = Vec::new();
        let mut index = HashMap::new();

        for rule in spec.rules {
            for name in std::iter::once(&rule.name).chain(rule.aliases.iter()) {
                if index.insert(name.clone(), rules.len()).is_some() {
                    return Err(SchemaError::Duplicate { name: name.clone() });
                }
            }
            let forms = rule
                .forms
                .iter()
                .map(|form| compile_form(&ctx, &rule.name, form))
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(RuleSchema {
                name: rule.name,
                aliases: rule.aliases,
                forms,
                premise_rule: rule.premise_rule,
                assumption_rule: rule.assumption_rule,
                show_rule: rule.show_rule,
                predicate_only: rule.predicate_only,
                hidden: rule.hidden,
                trivial: rule.trivial,
            });
        }

        Ok(Self {
            name: spec.name,
            rules,
            index,
        })
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn rules(&self) -> &[RuleSchema] {
        &self.rules
    }

    /// Returns the rule with the given name or alias.
    pub fn rule(&self, name: &str) -> Option<&RuleSchema> {
        self.index.get(name).map(|i| &self.rules[*i])
    }

    /// Returns the position in [`rules`] of the rule with the given name or alias.
    ///
    /// [`rules`]: crate::schema::System::rules()
    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).cloned()
    }
}

fn compile_template(
    ctx: &ParseContext,
    rule: &str,
    template: &str,
) -> Result<Arc<Formula>, SchemaError> {
    let formula = ctx.parse(template);
    if formula.is_well_formed() {
        Ok(formula)
    } else {
        Err(SchemaError::Template {
            rule: rule.to_owned(),
            template: template.to_owned(),
            reasons: formula.reasons(),
        })
    }
}

fn compile_form(ctx: &ParseContext, rule: &str, spec: &FormSpec) -> Result<Form, SchemaError> {
    let template = |text: &String| compile_template(ctx, rule, text);

    let form = Form {
        premises: spec.premises.iter().map(template).collect::<Result<_, _>>()?,
        conclusion: template(&spec.conclusion)?,
        subderivations: spec
            .subderivations
            .iter()
            .map(|o| {
                Ok(Obligation {
                    assumption: o.assumption.as_ref().map(template).transpose()?,
                    needs: o.needs.iter().map(template).collect::<Result<_, _>>()?,
                    show_only: o.show_only,
                })
            })
            .collect::<Result<_, SchemaError>>()?,
        substitutions: spec.substitutions.clone(),
        fresh: spec.fresh.clone(),
        fresh_scope: spec.fresh_scope,
        goal: spec.goal.as_ref().map(template).transpose()?,
        discharged_by: spec.discharged_by.clone(),
    };

    let mut formula_metas = BTreeSet::new();
    let mut variable_metas = BTreeSet::new();
    for t in form.templates() {
        collect_metas(t, &mut formula_metas, &mut variable_metas);
    }
    for s in &form.substitutions {
        for meta in &[s.result, s.source] {
            if !formula_metas.contains(meta) {
                return Err(SchemaError::Substitution {
                    rule: rule.to_owned(),
                    meta: *meta,
                });
            }
        }
        if !variable_metas.contains(&s.variable) {
            return Err(SchemaError::Substitution {
                rule: rule.to_owned(),
                meta: s.variable,
            });
        }
    }
    for meta in &form.fresh {
        if !form.substitutions.iter().any(|s| s.term == *meta) {
            return Err(SchemaError::Fresh {
                rule: rule.to_owned(),
                meta: *meta,
            });
        }
    }
    Ok(form)
}

fn collect_metas(template: &Formula, formulas: &mut BTreeSet<char>, variables: &mut BTreeSet<char>) {
    match template.shape() {
        Shape::Atom { predicate, terms } if terms.is_empty() => {
            formulas.insert(*predicate);
        }
        Shape::Not(body) => collect_metas(body, formulas, variables),
        Shape::Binary { left, right, .. } => {
            collect_metas(left, formulas, variables);
            collect_metas(right, formulas, variables);
        }
        Shape::Quantified { variable, body, .. } => {
            variables.insert(*variable);
            collect_metas(body, formulas, variables);
        }
        _ => (),
    }
}
