//! Frozen structural block detection for Typst.
//!
//! A `#set`, `#show`, `#import`, `#let` or `#include` statement may span
//! several lines while its arguments are open. Every line of such a
//! statement is frozen: edits touching it are dropped by the filter.

use serde::Serialize;

use super::patterns::TYPST_STRUCTURAL_PREFIXES;
use crate::lines::LineMap;

/// Inclusive line range of a frozen structural block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrozenRange {
    /// First line of the block.
    pub start: u32,
    /// Last line of the block.
    pub end: u32,
}

impl FrozenRange {
    /// Creates a range covering `start..=end`.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns whether `line` lies within the range.
    #[must_use]
    pub const fn contains(self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Returns whether `line` falls inside any of `ranges`.
#[must_use]
pub fn is_in_frozen_range(line: u32, ranges: &[FrozenRange]) -> bool {
    ranges.iter().any(|range| range.contains(line))
}

/// Scans lines in ascending order and returns every frozen block.
///
/// A block opens on a line beginning with a structural prefix and closes on
/// the first line where the running delimiter balance drops to zero or
/// below. A block still open at the end of the document closes on the last
/// line.
#[must_use]
pub fn find_frozen_ranges(lines: &LineMap) -> Vec<FrozenRange> {
    let mut ranges = Vec::new();
    let mut open: Option<(u32, i64)> = None;

    for (line, text) in lines.iter() {
        let delta = count_delimiters(text);
        let next = match open {
            None if starts_structural(text) => Some((line, delta)),
            None => None,
            Some((start, depth)) => Some((start, depth + delta)),
        };
        open = match next {
            Some((start, depth)) if depth <= 0 => {
                ranges.push(FrozenRange::new(start, line));
                None
            }
            other => other,
        };
    }

    if let (Some((start, _)), Some(last)) = (open, lines.last_line()) {
        ranges.push(FrozenRange::new(start, last));
    }
    ranges
}

fn starts_structural(text: &str) -> bool {
    let trimmed = text.trim();
    TYPST_STRUCTURAL_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Net count of opening minus closing delimiters on one line, ignoring
/// string literals and a trailing `//` comment.
#[must_use]
pub fn count_delimiters(line: &str) -> i64 {
    strip_string_literals(strip_trailing_comment(line))
        .chars()
        .map(|ch| match ch {
            '(' | '[' | '{' => 1,
            ')' | ']' | '}' => -1,
            _ => 0,
        })
        .sum()
}

/// Removes a `//` comment that is not inside a string literal.
#[must_use]
pub fn strip_trailing_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let mut previous_slash: Option<usize> = None;
    for (index, ch) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                previous_slash = None;
            }
            '/' => {
                if let Some(start) = previous_slash {
                    return line.get(..start).unwrap_or(line);
                }
                previous_slash = Some(index);
            }
            _ => previous_slash = None,
        }
    }
    line
}

/// Removes double-quoted string literals, honouring backslash escapes.
#[must_use]
pub fn strip_string_literals(line: &str) -> String {
    let mut kept = String::with_capacity(line.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in line.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else {
            kept.push(ch);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn map(entries: &[(u32, &str)]) -> LineMap {
        entries
            .iter()
            .map(|(line, text)| (*line, (*text).to_owned()))
            .collect()
    }

    #[test]
    fn multi_line_set_rule_is_one_range() {
        let lines = map(&[
            (1, "#set page("),
            (2, "margin: 1in,"),
            (3, ")"),
            (4, "= Experience"),
        ]);
        let ranges = find_frozen_ranges(&lines);
        assert_eq!(ranges, vec![FrozenRange::new(1, 3)]);
        assert!(!is_in_frozen_range(4, &ranges));
        for line in 1..=3 {
            assert!(is_in_frozen_range(line, &ranges));
        }
    }

    #[test]
    fn single_line_statements_close_immediately() {
        let lines = map(&[(1, "#import \"lib.typ\": *"), (2, "#let accent = blue"), (3, "Body")]);
        assert_eq!(
            find_frozen_ranges(&lines),
            vec![FrozenRange::new(1, 1), FrozenRange::new(2, 2)]
        );
    }

    #[test]
    fn unterminated_block_runs_to_last_line() {
        let lines = map(&[(1, "Intro"), (2, "#show heading: it => {"), (3, "it.body"), (5, "tail")]);
        assert_eq!(find_frozen_ranges(&lines), vec![FrozenRange::new(2, 5)]);
    }

    #[test]
    fn detection_is_idempotent() {
        let lines = map(&[(1, "#set text("), (2, "size: 10pt)"), (3, "Body")]);
        assert_eq!(find_frozen_ranges(&lines), find_frozen_ranges(&lines));
    }

    #[rstest]
    #[case("#set text(font: \"A (B\")", 0)]
    #[case("#set page( // open paren ( in comment", 1)]
    #[case("#let url = \"http://x.y\" + (", 1)]
    #[case("[{(", 3)]
    #[case("\"esc \\\" )\" )", -1)]
    fn delimiters_ignore_strings_and_comments(#[case] line: &str, #[case] expected: i64) {
        assert_eq!(count_delimiters(line), expected);
    }

    #[test]
    fn empty_ranges_contain_nothing() {
        assert!(!is_in_frozen_range(1, &[]));
    }
}
