use crate::{constants::*, store::JsonFileStore, terminal::Stylus, utils::*};
use anyhow::{Context, Error};
use ergo_check::{
    checker::Problem,
    config::{CheckOptions, ProverConfig},
    derivation::ProofInput,
    equivalence::{EquivalenceStore, Prover},
    grade::{grade_derivation, grade_translation, GradeSettings},
    trace::{subscriber::JsonLogger, DEFAULT_JSON_LOG_FILE},
};
use ergo_fol::ParseContext;
use serde_derive::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use structopt::StructOpt;

/// Is an exercise together with the answer to grade.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Exercise {
    Derivation {
        premises: Vec<String>,
        conclusion: String,
        #[serde(default)]
        reference: Option<ProofInput>,
        submission: ProofInput,
        #[serde(default)]
        options: CheckOptions,
    },
    Translation {
        accepted: Vec<String>,
        submission: String,
    },
}

/// Is what every command needs to run.
struct Environment {
    ctx: ParseContext,
    system: String,
    config: ProverConfig,
    store: Option<JsonFileStore>,
}

impl Environment {
    fn prover(&self) -> Prover {
        let prover = Prover::new(&self.ctx, &self.config);
        match &self.store {
            Some(store) => prover.with_store(store as &dyn EquivalenceStore),
            None => prover,
        }
    }
}

#[derive(StructOpt)]
enum ProcessCommand {
    #[structopt(name = "parse", about = "Print the normal form of a formula")]
    Parse {
        #[structopt(help = "The formula to read")]
        text: String,
    },
    #[structopt(name = "equiv", about = "Decide whether two formulae are equivalent")]
    Equiv {
        #[structopt(help = "The first formula")]
        first: String,
        #[structopt(help = "The second formula")]
        second: String,
    },
    #[structopt(name = "check", about = "Grade an answer to an exercise")]
    Check {
        #[structopt(
            short = "i",
            long = "input",
            parse(from_os_str),
            help = "Path to the exercise file"
        )]
        input: Option<PathBuf>,
        #[structopt(long = "partial", help = "Give partial credit.")]
        partial: bool,
        #[structopt(long = "points", default_value = "1", help = "Points of a correct answer")]
        points: f64,
    },
}

impl ProcessCommand {
    fn run(self, env: &Environment, stylus: &Stylus) -> Result<(), Error> {
        match self {
            ProcessCommand::Parse { text } => {
                let formula = env.ctx.parse(&text);
                print_formula(&formula, stylus);
                Ok(())
            }
            ProcessCommand::Equiv { first, second } => {
                let first = env.ctx.parse(&first);
                let second = env.ctx.parse(&second);
                stylus.set(STYLE_FORMULA);
                println!("{}\n{}\n", first, second);
                print_equivalence(&env.prover().equivalent(&first, &second), stylus);
                Ok(())
            }
            ProcessCommand::Check {
                input,
                partial,
                points,
            } => {
                let text = if let Some(input) = input {
                    read_file(&input)?
                } else {
                    read_stdin()?
                };
                let exercise: Exercise =
                    serde_json::from_str(&text).context("failed to read the exercise")?;
                let settings = GradeSettings {
                    partial_credit: partial,
                    points,
                    disclose: true,
                };

                let grade = match exercise {
                    Exercise::Derivation {
                        premises,
                        conclusion,
                        reference,
                        submission,
                        options,
                    } => {
                        let system = system(&env.system)?;
                        let problem = Problem::parse(&env.ctx, &premises, &conclusion);
                        stylus.set(STYLE_INFO);
                        println!("Checking a derivation in {}:", system.name());
                        stylus.set(STYLE_FORMULA);
                        println!(
                            "{} ⊢ {}\n",
                            problem
                                .premises
                                .iter()
                                .map(|p| p.to_string())
                                .collect::<Vec<_>>()
                                .join(", "),
                            problem.conclusion
                        );
                        grade_derivation(
                            &env.ctx,
                            &system,
                            &options,
                            &problem,
                            reference.as_ref(),
                            &submission,
                            &settings,
                        )
                    }
                    Exercise::Translation {
                        accepted,
                        submission,
                    } => {
                        stylus.set(STYLE_INFO);
                        println!("Checking a translation:");
                        stylus.set(STYLE_FORMULA);
                        println!("{}\n", submission);
                        grade_translation(
                            &env.ctx,
                            &env.prover(),
                            &accepted,
                            &submission,
                            &settings,
                        )
                    }
                };
                print_grade(&grade, stylus);
                Ok(())
            }
        }
    }
}

#[derive(StructOpt)]
#[structopt(
    name = "Ergo",
    about = "A tool for checking derivations and formula equivalence"
)]
#[structopt(raw(setting = "structopt::clap::AppSettings::ColoredHelp"))]
pub(super) struct Command {
    #[structopt(subcommand, name = "command")]
    command: ProcessCommand,
    #[structopt(
        long = "notation",
        default_value = "standard",
        help = "Name of a built-in notation or path to a notation file."
    )]
    notation: String,
    #[structopt(
        long = "system",
        default_value = "fitch",
        help = "Name of a built-in deductive system or path to a system file."
    )]
    system: String,
    #[structopt(
        long = "store",
        parse(from_os_str),
        help = "Path to a file of proven equivalences."
    )]
    store: Option<PathBuf>,
    #[structopt(
        long = "budget",
        default_value = "5",
        help = "Seconds an equivalence test may take."
    )]
    budget: u64,
    #[structopt(long = "no-color", help = "Disable colored output.")]
    no_color: bool,
    #[structopt(
        short = "l",
        long = "log",
        parse(from_os_str),
        help = "Path to the log file."
    )]
    log: Option<PathBuf>,
}

impl Command {
    pub fn run(self) -> Result<(), Error> {
        let process = self.command;
        let stylus = stylus(!self.no_color);
        let env = Environment {
            ctx: ParseContext::new(notation(&self.notation)?),
            system: self.system,
            config: ProverConfig {
                budget: Duration::from_secs(self.budget),
                ..ProverConfig::default()
            },
            store: self.store.as_ref().map(|s| JsonFileStore::new(s)),
        };

        let log = self
            .log
            .map(|l| l.to_str().unwrap_or(DEFAULT_JSON_LOG_FILE).to_owned());

        if !self.no_color {
            stylus.set(STYLE_LOGO);
            println!("{}", ASCII_ART);
        }

        let run = || process.run(&env, &stylus);

        if let Some(log) = log {
            let log = fs::File::create(log).context("cannot create the log file")?;
            let logger = JsonLogger::new(log);
            tracing::subscriber::with_default(logger, run)
        } else {
            run()
        }
    }
}
