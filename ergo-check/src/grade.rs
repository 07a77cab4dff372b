/*! Grades submitted answers.

[`grade_derivation`] checks a derivation against the question it answers and turns the check
into points, derating partial credit by the progress the derivation makes compared to a
reference answer. [`grade_translation`] compares a symbolic translation against the accepted
answers with the equivalence [`Prover`].

[`grade_derivation`]: crate::grade::grade_derivation()
[`grade_translation`]: crate::grade::grade_translation()
[`Prover`]: crate::equivalence::Prover
*/
use crate::{
    checker::{Checker, Problem},
    config::CheckOptions,
    derivation::{Derivation, ProofInput},
    equivalence::Prover,
    report::{Category, ErrorReport, GroupedErrors, Severity},
    schema::System,
};
use ergo_fol::ParseContext;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Is the verdict on a submission.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Correct,
    Incorrect,

    /// The equivalence of the submission to an accepted answer could not be decided.
    Indeterminate,

    /// The submission answers a different question than the one asked.
    Edited,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Correct => "correct",
            Status::Incorrect => "incorrect",
            Status::Indeterminate => "indeterminate",
            Status::Edited => "edited",
        };
        write!(f, "{}", name)
    }
}

/// Is how a submission is scored.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeSettings {
    pub partial_credit: bool,

    /// Is the score of a correct answer.
    pub points: f64,

    /// Allows error descriptions and syntax reasons to be shown to the learner.
    pub disclose: bool,
}

impl Default for GradeSettings {
    fn default() -> Self {
        Self {
            partial_credit: true,
            points: 1.0,
            disclose: true,
        }
    }
}

/// Is a graded submission.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct Grade {
    pub successstatus: Status,
    pub points: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<GroupedErrors>,

    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
}

impl Grade {
    fn new(successstatus: Status, points: f64, message: impl Into<String>) -> Self {
        Self {
            successstatus,
            points,
            errors: None,
            message: message.into(),
        }
    }
}

/// Grades `submission` as an answer to the derivation exercise `question`.
///
/// The submission must echo the question's premises and conclusion when it carries them;
/// otherwise it is graded `edited`. The progress of `reference`, if given, bounds the partial
/// credit of an incomplete submission.
#[allow(clippy::too_many_arguments)]
pub fn grade_derivation(
    ctx: &ParseContext,
    system: &System,
    options: &CheckOptions,
    question: &Problem,
    reference: Option<&ProofInput>,
    submission: &ProofInput,
    settings: &GradeSettings,
) -> Grade {
    if is_edited(ctx, question, submission) {
        return Grade::new(
            Status::Edited,
            0.0,
            "the premises or conclusion differ from the question",
        );
    }

    let options = CheckOptions {
        thorough: settings.partial_credit,
        ..options.clone()
    };
    let checker = Checker::new(ctx, system, &options);
    let report = checker.check(question, &derivation(system, question, submission));
    if report.is_correct() {
        return Grade::new(Status::Correct, settings.points, "");
    }

    let points = if settings.partial_credit {
        let progress = report.progress() as f64;
        let derate = reference
            .map(|r| checker.check(question, &derivation(system, question, r)).progress())
            .filter(|p| *p > 0)
            .map_or(1.0, |expected| (progress / expected as f64).min(1.0));
        settings.points * report.points_portion * derate
    } else {
        0.0
    };
    let errors = if settings.disclose {
        report.errors.grouped()
    } else {
        report.errors.redacted().grouped()
    };
    Grade {
        errors: Some(errors),
        ..Grade::new(
            Status::Incorrect,
            points,
            format!("the derivation has {} error(s)", report.errors.len()),
        )
    }
}

fn is_edited(ctx: &ParseContext, question: &Problem, submission: &ProofInput) -> bool {
    if submission.premises.is_empty() && submission.conclusion.is_empty() {
        return false;
    }
    submission.premises.len() != question.premises.len()
        || submission
            .premises
            .iter()
            .zip(&question.premises)
            .any(|(p, q)| ctx.parse(p) != *q)
        || ctx.parse(&submission.conclusion) != question.conclusion
}

fn derivation(system: &System, question: &Problem, proof: &ProofInput) -> Derivation {
    let premise_rule = system
        .rules()
        .iter()
        .find(|r| r.premise_rule)
        .map_or("", |r| r.name.as_str());
    let premises: Vec<String> = question
        .premises
        .iter()
        .map(|p| p.normal_form().to_owned())
        .collect();
    Derivation::from_input(&premises, premise_rule, &proof.parts)
}

/// Grades the formula `submission` as a translation whose accepted answers are `accepted`.
///
/// **Example**:
/// ```rust
/// use ergo_check::{
///     config::ProverConfig,
///     equivalence::Prover,
///     grade::{grade_translation, GradeSettings, Status},
/// };
/// use ergo_fol::ParseContext;
///
/// let ctx = ParseContext::default();
/// let config = ProverConfig::default();
/// let prover = Prover::new(&ctx, &config);
/// let settings = GradeSettings::default();
///
/// let grade = grade_translation(&ctx, &prover, &["P → Q".into()], "¬Q → ¬P", &settings);
/// assert_eq!(Status::Correct, grade.successstatus);
/// ```
pub fn grade_translation(
    ctx: &ParseContext,
    prover: &Prover,
    accepted: &[String],
    submission: &str,
    settings: &GradeSettings,
) -> Grade {
    let formula = ctx.parse(submission);
    if !formula.is_well_formed() {
        let mut errors = ErrorReport::new();
        errors.push(1, Category::Syntax, Severity::High, formula.reasons());
        if !settings.disclose {
            errors = errors.redacted();
        }
        let message = if settings.disclose {
            formula.reasons()
        } else {
            "the formula is not well-formed".to_owned()
        };
        return Grade {
            errors: Some(errors.grouped()),
            ..Grade::new(Status::Incorrect, 0.0, message)
        };
    }

    let mut undecided = false;
    for answer in accepted {
        let result = prover.equivalent(&formula, &ctx.parse(answer));
        if result.equiv {
            return Grade::new(Status::Correct, settings.points, "");
        }
        if !result.determinate {
            undecided = true;
        }
    }
    if undecided {
        Grade::new(
            Status::Indeterminate,
            0.0,
            "the equivalence of the formula to an accepted answer could not be decided",
        )
    } else {
        Grade::new(Status::Incorrect, 0.0, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ProverConfig,
        derivation::{LineInput, PartInput},
        test_prelude::*,
    };

    fn line(number: usize, formula: &str, justification: &str) -> PartInput {
        PartInput::Line(LineInput {
            number,
            formula: formula.to_owned(),
            justification: justification.to_owned(),
        })
    }

    fn proof(parts: Vec<PartInput>) -> ProofInput {
        ProofInput {
            premises: vec!["P".to_owned(), "Q".to_owned()],
            conclusion: "(P ∧ Q) ∧ P".to_owned(),
            parts,
        }
    }

    fn grade(reference: &ProofInput, submission: &ProofInput, settings: &GradeSettings) -> Grade {
        let ctx = standard();
        let question = problem(&ctx, &["P", "Q"], "(P ∧ Q) ∧ P");
        grade_derivation(
            &ctx,
            &fitch(),
            &CheckOptions::default(),
            &question,
            Some(reference),
            submission,
            settings,
        )
    }

    fn reference() -> ProofInput {
        proof(vec![
            line(3, "P ∧ Q", "1, 2 ∧I"),
            line(4, "(P ∧ Q) ∧ P", "3, 1 ∧I"),
        ])
    }

    #[test]
    fn correct_derivation() {
        let result = grade(&reference(), &reference(), &GradeSettings::default());
        assert_eq!(Status::Correct, result.successstatus);
        assert_eq!(1.0, result.points);
        assert_eq!(None, result.errors);
    }

    #[test]
    fn partial_credit() {
        let settings = GradeSettings {
            points: 10.0,
            ..GradeSettings::default()
        };
        let prefix = proof(vec![line(3, "P ∧ Q", "1, 2 ∧I")]);
        let wrong = proof(vec![
            line(3, "P ∧ Q", "1, 2 ∧I"),
            line(4, "(P ∧ Q) ∧ P", "3 ∧I"),
        ]);

        // the conclusion is missing and half of the reference's progress is made
        let result = grade(&reference(), &prefix, &settings);
        assert_eq!(Status::Incorrect, result.successstatus);
        assert!((result.points - 10.0 * 0.8 * 0.5).abs() < 1e-9);

        // line 4 has a low and a high error and makes no progress
        let result = grade(&reference(), &wrong, &settings);
        assert!((result.points - 10.0 * 0.8 * 0.5).abs() < 1e-9);
        let errors = result.errors.unwrap();
        assert_eq!(vec![4], errors.keys().cloned().collect::<Vec<_>>());

        let strict = GradeSettings {
            partial_credit: false,
            ..settings
        };
        assert_eq!(0.0, grade(&reference(), &wrong, &strict).points);
    }

    #[test]
    fn partial_credit_grows_with_valid_steps() {
        let steps = vec![
            line(3, "P ∧ Q", "1, 2 ∧I"),
            line(4, "Q ∧ P", "2, 1 ∧I"),
            line(5, "(P ∧ Q) ∧ P", "3, 1 ∧I"),
        ];
        let points: Vec<f64> = (0..=steps.len())
            .map(|n| grade(&reference(), &proof(steps[..n].to_vec()), &GradeSettings::default()))
            .map(|g| g.points)
            .collect();

        for pair in points.windows(2) {
            assert!(pair[0] <= pair[1], "{:?}", points);
        }
        assert_eq!(0.0, points[0]);
        assert!(points[1] < points[2]);
        assert_eq!(1.0, points[3]);
    }

    #[test]
    fn redacted_errors() {
        let settings = GradeSettings {
            disclose: false,
            ..GradeSettings::default()
        };
        let result = grade(&reference(), &proof(vec![]), &settings);
        let errors = result.errors.unwrap();
        let descriptions = &errors[&1][&Category::Completion][&Severity::High];
        assert_eq!(Some(&1), descriptions.get(""));
    }

    #[test]
    fn edited_question() {
        let mut submission = reference();
        submission.premises = vec!["P".to_owned(), "R".to_owned()];
        let result = grade(&reference(), &submission, &GradeSettings::default());
        assert_eq!(Status::Edited, result.successstatus);
        assert_eq!(0.0, result.points);

        let mut submission = reference();
        submission.premises.clear();
        submission.conclusion.clear();
        let result = grade(&reference(), &submission, &GradeSettings::default());
        assert_eq!(Status::Correct, result.successstatus);
    }

    #[test]
    fn translations() {
        let ctx = standard();
        let config = ProverConfig::default();
        let prover = Prover::new(&ctx, &config);
        let accepted = vec!["∀x(Fx → Gx)".to_owned(), "¬∃x(Fx ∧ ¬Gx)".to_owned()];
        let settings = GradeSettings::default();

        let result = grade_translation(&ctx, &prover, &accepted, "¬∃x(Fx ∧ ¬Gx)", &settings);
        assert_eq!(Status::Correct, result.successstatus);

        let result = grade_translation(&ctx, &prover, &accepted, "∀x(Gx → Fx)", &settings);
        assert_eq!(Status::Incorrect, result.successstatus);
        assert_eq!(0.0, result.points);

        let result = grade_translation(&ctx, &prover, &accepted, "∀x(Fx →", &settings);
        assert_eq!(Status::Incorrect, result.successstatus);
        assert!(result.errors.is_some());

        let hidden = GradeSettings {
            disclose: false,
            ..GradeSettings::default()
        };
        let result = grade_translation(&ctx, &prover, &accepted, "∀x(Fx →", &hidden);
        assert_eq!("the formula is not well-formed", result.message);
    }

    #[test]
    fn undecided_translation() {
        let ctx = standard();
        let config = ProverConfig {
            budget: std::time::Duration::from_secs(0),
            ..ProverConfig::default()
        };
        let prover = Prover::new(&ctx, &config);
        let accepted = vec!["∀x∃yRxy".to_owned()];
        let result =
            grade_translation(&ctx, &prover, &accepted, "∃y∀xRxy", &GradeSettings::default());
        assert_eq!(Status::Indeterminate, result.successstatus);
    }
}
