//! The sparse line model shared by every format.
//!
//! A [`LineMap`] maps 1-based line numbers to line text. Keys may have gaps
//! (blank paragraphs dropped by the DOCX reader, for example) and iteration
//! is always in ascending key order. Line zero is never stored.

use std::collections::BTreeMap;
use std::collections::btree_map;

use diffy::DiffOptions;
use serde::{Deserialize, Serialize};

/// Sparse mapping from 1-based line number to line text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineMap(BTreeMap<u32, String>);

impl LineMap {
    /// Creates an empty line map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds a map from the non-blank lines of `text`, trimmed and numbered
    /// densely from 1.
    #[must_use]
    pub fn from_text_dense(text: &str) -> Self {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .zip(1_u32..)
            .map(|(line, number)| (number, line.to_owned()))
            .collect()
    }

    /// Builds a map keyed by physical line number, keeping blank lines as
    /// empty entries. Every line is trimmed.
    #[must_use]
    pub fn from_text_preserving(text: &str) -> Self {
        text.lines()
            .zip(1_u32..)
            .map(|(line, number)| (number, line.trim().to_owned()))
            .collect()
    }

    /// Stores `text` at `line`, returning any previous value.
    ///
    /// Line zero is not a valid line number and is ignored.
    pub fn insert(&mut self, line: u32, text: impl Into<String>) -> Option<String> {
        if line == 0 {
            return None;
        }
        self.0.insert(line, text.into())
    }

    /// Removes the entry at `line`.
    pub fn remove(&mut self, line: u32) -> Option<String> {
        self.0.remove(&line)
    }

    /// Returns the text stored at `line`.
    #[must_use]
    pub fn get(&self, line: u32) -> Option<&str> {
        self.0.get(&line).map(String::as_str)
    }

    /// Returns whether `line` is present.
    #[must_use]
    pub fn contains(&self, line: u32) -> bool {
        self.0.contains_key(&line)
    }

    /// Number of stored lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the map holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Smallest line number, if any.
    #[must_use]
    pub fn first_line(&self) -> Option<u32> {
        self.0.keys().next().copied()
    }

    /// Largest line number, if any.
    #[must_use]
    pub fn last_line(&self) -> Option<u32> {
        self.0.keys().next_back().copied()
    }

    /// Iterates `(line, text)` pairs in ascending line order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u32, &str)> + '_ {
        self.0.iter().map(|(line, text)| (*line, text.as_str()))
    }

    /// Iterates line numbers in ascending order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    /// Iterates entries whose line lies within `start..=end`.
    pub fn range(&self, start: u32, end: u32) -> impl DoubleEndedIterator<Item = (u32, &str)> + '_ {
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        self.0
            .range(low..=high)
            .map(|(line, text)| (*line, text.as_str()))
    }

    /// Greatest line number strictly below `line`.
    #[must_use]
    pub fn preceding_line(&self, line: u32) -> Option<u32> {
        self.0.range(..line).next_back().map(|(key, _)| *key)
    }

    /// Moves every entry whose key is greater than `after` by `delta` lines.
    ///
    /// Returns `None` when a shifted key would fall below one or overflow;
    /// the map is left untouched in that case.
    #[must_use]
    pub fn shifted_after(&self, after: u32, delta: i64) -> Option<Self> {
        let mut shifted = BTreeMap::new();
        for (line, text) in &self.0 {
            let key = if *line > after {
                let moved = i64::from(*line).checked_add(delta)?;
                u32::try_from(moved).ok().filter(|value| *value >= 1)?
            } else {
                *line
            };
            shifted.insert(key, text.clone());
        }
        Some(Self(shifted))
    }

    /// Renders the numbered-line representation, one `"{n:>4} {text}"` line
    /// per entry.
    #[must_use]
    pub fn render_numbered(&self) -> String {
        self.iter()
            .map(|(line, text)| format!("{line:>4} {text}\n"))
            .collect()
    }

    /// Joins the values with newlines, ending with a trailing newline when
    /// the map is non-empty.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = self.0.values().map(String::as_str).collect::<Vec<_>>().join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl FromIterator<(u32, String)> for LineMap {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(line, _)| *line >= 1).collect())
    }
}

impl<'a> IntoIterator for &'a LineMap {
    type Item = (&'a u32, &'a String);
    type IntoIter = btree_map::Iter<'a, u32, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Renders a unified diff between the numbered representations of two maps.
#[must_use]
pub fn diff_lines(before: &LineMap, after: &LineMap) -> String {
    let old_text = before.render_numbered();
    let new_text = after.render_numbered();
    let mut options = DiffOptions::new();
    options.set_context_len(3);
    options.create_patch(&old_text, &new_text).to_string()
}
