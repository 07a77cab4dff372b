//! Defines the typed error records produced by checking a derivation.
use crate::trace::ERROR;
use serde_derive::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use tracing::debug;

/// Is the kind of mistake an error reports.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The formula is malformed.
    Syntax,

    /// A citation is malformed, unavailable or names an unknown rule.
    Justification,

    /// The cited material does not fit the cited rule.
    Rule,

    /// A show line or the derivation itself is unfinished.
    Completion,

    /// The line relies on a line with an error.
    Dependency,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Category::Syntax => "syntax",
            Category::Justification => "justification",
            Category::Rule => "rule",
            Category::Completion => "completion",
            Category::Dependency => "dependency",
        };
        write!(f, "{}", name)
    }
}

/// Is how certainly an error invalidates the derivation.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{}", name)
    }
}

/// Is an error found on a line.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub line: usize,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "line {}: {} ({}, {})",
            self.line, self.description, self.category, self.severity
        )
    }
}

/// Is the nested presentation of errors: line, category, severity, description, count.
pub type GroupedErrors =
    BTreeMap<usize, BTreeMap<Category, BTreeMap<Severity, BTreeMap<String, usize>>>>;

/// Accumulates the errors of a check in the order they are found.
#[derive(PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorReport {
    records: Vec<ErrorRecord>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        line: usize,
        category: Category,
        severity: Severity,
        description: impl Into<String>,
    ) {
        let description = description.into();
        debug!(
            event = ERROR,
            line = line,
            category = %category,
            severity = %severity,
            description = %description,
        );
        self.records.push(ErrorRecord {
            line,
            category,
            severity,
            description,
        });
    }

    #[inline(always)]
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns the errors on line `line`.
    pub fn for_line(&self, line: usize) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(move |r| r.line == line)
    }

    /// Returns true if line `line` has an error of any category.
    pub fn has_errors(&self, line: usize) -> bool {
        self.for_line(line).next().is_some()
    }

    /// Returns the records grouped by line, category, severity and description, counting
    /// repeated descriptions.
    pub fn grouped(&self) -> GroupedErrors {
        let mut result = GroupedErrors::new();
        for record in &self.records {
            *result
                .entry(record.line)
                .or_default()
                .entry(record.category)
                .or_default()
                .entry(record.severity)
                .or_default()
                .entry(record.description.clone())
                .or_default() += 1;
        }
        result
    }

    /// Replaces every description, keeping where and how severe the errors are.
    pub fn redacted(&self) -> Self {
        Self {
            records: self
                .records
                .iter()
                .map(|r| ErrorRecord {
                    description: String::new(),
                    ..r.clone()
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn grouped() {
        let mut report = ErrorReport::new();
        report.push(3, Category::Rule, Severity::High, "bad");
        report.push(3, Category::Rule, Severity::High, "bad");
        report.push(3, Category::Justification, Severity::Low, "two rules");
        report.push(1, Category::Completion, Severity::High, "unfinished");

        assert_eq!(4, report.len());
        assert_eq!(3, report.for_line(3).count());
        assert!(!report.has_errors(2));

        let grouped = report.grouped();
        assert_eq!(vec![1, 3], grouped.keys().cloned().collect::<Vec<_>>());
        assert_eq!(2, grouped[&3][&Category::Rule][&Severity::High]["bad"]);
        assert_eq!(
            r#"{"1":{"completion":{"high":{"unfinished":1}}},"3":{"justification":{"low":{"two rules":1}},"rule":{"high":{"bad":2}}}}"#,
            serde_json::to_string(&grouped).unwrap()
        );
    }

    #[test]
    fn redacted() {
        let mut report = ErrorReport::new();
        report.push(2, Category::Syntax, Severity::High, "ambiguous");
        let redacted = report.redacted();
        assert_eq!("", redacted.records()[0].description);
        assert_eq!(Severity::High, redacted.records()[0].severity);
        assert_eq!(
            "line 2: ambiguous (syntax, high)",
            report.records()[0].to_string()
        );
    }
}
