use crate::{
    constants::*,
    terminal::{Style, Stylus},
};
use anyhow::{Context, Error};
use ergo_check::{
    equivalence::Equivalence,
    grade::{Grade, Status},
    schema::System,
};
use ergo_fol::{Formula, Notation};
use itertools::Itertools;
use std::{
    fs,
    io::{stdin, Read},
    path::Path,
};

pub(crate) fn stylus(color: bool) -> Stylus {
    let mut stylus = Stylus::new();
    if color {
        stylus.insert_style(
            STYLE_LOGO,
            Style::new().foreground(59).attribute(term::Attr::Dim),
        );
        stylus.insert_style(
            STYLE_INFO,
            Style::new().foreground(59).attribute(term::Attr::Bold),
        );
        stylus.insert_style(STYLE_FORMULA, Style::new().foreground(252));
        stylus.insert_style(
            STYLE_SUCCESS,
            Style::new()
                .foreground(term::color::GREEN)
                .attribute(term::Attr::Bold),
        );
        stylus.insert_style(
            STYLE_FAILURE,
            Style::new()
                .foreground(term::color::BRIGHT_RED)
                .attribute(term::Attr::Bold),
        );
        stylus.insert_style(STYLE_WARNING, Style::new().foreground(term::color::YELLOW));
    }

    stylus
}

pub(crate) fn read_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read the input file `{}`", path.display()))
}

pub(crate) fn read_stdin() -> Result<String, Error> {
    let mut buf: Vec<u8> = Vec::new();
    stdin().read_to_end(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Returns the built-in notation with the given name, or reads one from the JSON file at `name`.
pub(crate) fn notation(name: &str) -> Result<Notation, Error> {
    match Notation::builtin(name) {
        Ok(notation) => Ok(notation),
        Err(_) => Notation::from_json(&read_file(Path::new(name))?)
            .context("failed to read the notation"),
    }
}

/// Returns the built-in system with the given name, or reads one from the JSON file at `name`.
pub(crate) fn system(name: &str) -> Result<System, Error> {
    match System::builtin(name) {
        Ok(system) => Ok(system),
        Err(_) => System::from_json(&read_file(Path::new(name))?)
            .context("failed to read the deductive system"),
    }
}

pub(crate) fn print_formula(formula: &Formula, stylus: &Stylus) {
    if formula.is_well_formed() {
        stylus.set(STYLE_FORMULA);
        println!("{}", formula);
        stylus.set(STYLE_INFO);
        println!(
            "predicates: {}",
            formula
                .predicates()
                .iter()
                .map(|(p, arity)| format!("{}/{}", p, arity))
                .join(", ")
        );
        println!("names: {}", formula.names().iter().join(", "));
    } else {
        stylus.set(STYLE_FAILURE);
        println!("not well-formed: {}", formula.reasons());
    }
}

pub(crate) fn print_equivalence(result: &Equivalence, stylus: &Stylus) {
    if !result.determinate {
        stylus.set(STYLE_WARNING);
        println!("undecided");
    } else if result.equiv {
        stylus.set(STYLE_SUCCESS);
        println!("equivalent ({})", result.method);
    } else {
        stylus.set(STYLE_FAILURE);
        println!("not equivalent ({})", result.method);
    }
}

pub(crate) fn print_grade(grade: &Grade, stylus: &Stylus) {
    let style = match grade.successstatus {
        Status::Correct => STYLE_SUCCESS,
        Status::Indeterminate => STYLE_WARNING,
        Status::Incorrect | Status::Edited => STYLE_FAILURE,
    };
    stylus.set(style);
    println!("{}: {} point(s)", grade.successstatus, grade.points);
    if !grade.message.is_empty() {
        stylus.set(STYLE_INFO);
        println!("{}", grade.message);
    }

    if let Some(errors) = &grade.errors {
        println!();
        for (line, categories) in errors {
            for (category, severities) in categories {
                for (severity, descriptions) in severities {
                    for (description, count) in descriptions {
                        stylus.set(STYLE_INFO);
                        print!("line {:>3} ", line);
                        stylus.set(STYLE_WARNING);
                        print!("{} ({})", category, severity);
                        stylus.set(STYLE_FORMULA);
                        if *count > 1 {
                            println!(" {} ×{}", description, count);
                        } else {
                            println!(" {}", description);
                        }
                    }
                }
            }
        }
    }
    println!();
}
