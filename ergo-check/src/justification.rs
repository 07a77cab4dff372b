//! Reads the justification of a derivation line.
//!
//! A justification is a list of tokens separated by commas or whitespace. Each token is a line
//! number, a `?` standing for a citation that has been deleted, a range of two line numbers
//! joined by an en-dash (a hyphen is accepted too), or the name of a rule.
use serde_derive::Serialize;

/// Is the content of a justification.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct Justification {
    /// Are the cited line numbers, in the order they are written.
    pub lines: Vec<usize>,

    /// Are the cited inclusive ranges of line numbers.
    pub ranges: Vec<(usize, usize)>,

    /// Are the cited rule names.
    pub rules: Vec<String>,

    /// Is the number of `?` placeholders.
    pub placeholders: usize,
}

impl Justification {
    /// Reads `text` into a justification. Reading never fails: any token that is neither a
    /// number, a placeholder nor a range is taken to be a rule name.
    pub fn parse(text: &str) -> Self {
        let mut result = Self::default();
        let tokens = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty());

        for token in tokens {
            if token == "?" {
                result.placeholders += 1;
            } else if let Ok(number) = token.parse::<usize>() {
                result.lines.push(number);
            } else if let Some(range) = range(token) {
                match range {
                    (Some(from), Some(to)) => result.ranges.push((from, to)),
                    _ => result.placeholders += 1,
                }
            } else {
                result.rules.push(token.to_owned());
            }
        }
        result
    }

    /// Returns the first cited rule.
    pub fn rule(&self) -> Option<&str> {
        self.rules.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
            && self.ranges.is_empty()
            && self.rules.is_empty()
            && self.placeholders == 0
    }
}

// Reads `i–j`; either end may be a `?` placeholder.
fn range(token: &str) -> Option<(Option<usize>, Option<usize>)> {
    let mut ends = token.splitn(2, |c| c == '–' || c == '-');
    let from = ends.next()?;
    let to = ends.next()?;
    let end = |s: &str| -> Option<Option<usize>> {
        if s == "?" {
            Some(None)
        } else {
            s.parse::<usize>().ok().map(Some)
        }
    };
    Some((end(from)?, end(to)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_and_rule() {
        let justification = Justification::parse("2,1 →E");
        assert_eq!(vec![2, 1], justification.lines);
        assert_eq!(Some("→E"), justification.rule());
        assert!(justification.ranges.is_empty());
    }

    #[test]
    fn ranges() {
        let justification = Justification::parse("1, 2–4, 5-7 ∨E");
        assert_eq!(vec![1], justification.lines);
        assert_eq!(vec![(2, 4), (5, 7)], justification.ranges);
        assert_eq!(vec!["∨E".to_owned()], justification.rules);
    }

    #[test]
    fn placeholders() {
        let justification = Justification::parse("?, 3 ∧I");
        assert_eq!(1, justification.placeholders);
        assert_eq!(vec![3], justification.lines);

        let justification = Justification::parse("2–? →I");
        assert_eq!(1, justification.placeholders);
        assert!(justification.ranges.is_empty());
    }

    #[test]
    fn rule_names() {
        let justification = Justification::parse("MP MT");
        assert_eq!(vec!["MP".to_owned(), "MT".to_owned()], justification.rules);
        assert!(Justification::parse("   ").is_empty());
        assert_eq!(Some("->E"), Justification::parse("1 ->E").rule());
    }
}
