//! Turning a target line map into concrete document edits.
//!
//! [`plan_edits`] compares the original and target maps key by key. The
//! resulting [`EditPlan`] is replayed against a [`LineSink`], which is the
//! seam between the line model and a concrete document representation.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::DocumentError;
use crate::lines::LineMap;

/// A line present in the target but not in the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addition {
    /// Greatest original line number below `line`, if any.
    pub anchor: Option<u32>,
    /// Line number in the target map.
    pub line: u32,
    /// Line text.
    pub text: String,
}

/// Key-level difference between an original and a target line map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    /// Lines present in both maps whose text changed.
    pub modifications: BTreeMap<u32, String>,
    /// Lines present only in the original.
    pub deletions: BTreeSet<u32>,
    /// Lines present only in the target, in ascending line order.
    pub additions: Vec<Addition>,
}

impl EditPlan {
    /// Returns whether applying the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty() && self.deletions.is_empty() && self.additions.is_empty()
    }

    /// Renders a short human-readable description of the plan.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} modification(s), {} deletion(s), {} addition(s)\n",
            self.modifications.len(),
            self.deletions.len(),
            self.additions.len()
        );
        for (line, text) in &self.modifications {
            out.push_str(&format!("~ {line}: {text}\n"));
        }
        for line in &self.deletions {
            out.push_str(&format!("- {line}\n"));
        }
        for addition in &self.additions {
            let anchor = addition
                .anchor
                .map_or_else(|| "start".to_owned(), |anchor| anchor.to_string());
            out.push_str(&format!(
                "+ {} (after {anchor}): {}\n",
                addition.line, addition.text
            ));
        }
        out
    }
}

/// Computes the plan that turns `original` into `target`.
#[must_use]
pub fn plan_edits(original: &LineMap, target: &LineMap) -> EditPlan {
    let modifications = target
        .iter()
        .filter(|(line, text)| original.get(*line).is_some_and(|before| before != *text))
        .map(|(line, text)| (line, text.to_owned()))
        .collect();
    let deletions = original
        .keys()
        .filter(|line| !target.contains(*line))
        .collect();
    let additions = target
        .iter()
        .filter(|(line, _)| !original.contains(*line))
        .map(|(line, text)| Addition {
            anchor: original.preceding_line(line),
            line,
            text: text.to_owned(),
        })
        .collect();
    EditPlan {
        modifications,
        deletions,
        additions,
    }
}

/// A document that accepts line-level edits addressed by original line
/// numbers.
pub trait LineSink {
    /// Removes the content of original line `line`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the sink cannot apply the change.
    fn delete_line(&mut self, line: u32) -> Result<(), DocumentError>;

    /// Replaces the text of original line `line`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the sink cannot apply the change.
    fn modify_line(&mut self, line: u32, text: &str) -> Result<(), DocumentError>;

    /// Inserts a new line directly after original line `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the sink cannot apply the change.
    fn insert_after(&mut self, anchor: u32, text: &str) -> Result<(), DocumentError>;

    /// Inserts a new line before all other content.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the sink cannot apply the change.
    fn prepend(&mut self, text: &str) -> Result<(), DocumentError>;
}

/// Replays `plan` against `sink`.
///
/// Deletions run from the highest line down, then modifications, then
/// additions grouped by anchor with the highest anchor first. Each group is
/// inserted in reverse so its lines end up ascending after the anchor.
///
/// # Errors
///
/// Propagates the first error reported by the sink.
pub fn apply_plan<S: LineSink + ?Sized>(plan: &EditPlan, sink: &mut S) -> Result<(), DocumentError> {
    for line in plan.deletions.iter().rev() {
        sink.delete_line(*line)?;
    }
    for (line, text) in &plan.modifications {
        sink.modify_line(*line, text)?;
    }

    let mut groups: BTreeMap<Option<u32>, Vec<&Addition>> = BTreeMap::new();
    for addition in &plan.additions {
        groups.entry(addition.anchor).or_default().push(addition);
    }
    for (anchor, mut group) in groups.into_iter().rev() {
        group.sort_by_key(|addition| addition.line);
        for addition in group.into_iter().rev() {
            match anchor {
                Some(line) => sink.insert_after(line, &addition.text)?,
                None => sink.prepend(&addition.text)?,
            }
        }
    }
    debug!(
        target: "loom::apply",
        modifications = plan.modifications.len(),
        deletions = plan.deletions.len(),
        additions = plan.additions.len(),
        "applied edit plan"
    );
    Ok(())
}

/// In-memory text document used for LaTeX and Typst output.
///
/// Each entry remembers the original line number it came from so edits stay
/// addressable after earlier deletions and insertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDocument {
    entries: Vec<(Option<u32>, String)>,
}

impl TextDocument {
    /// Builds a document from the lines of an original map.
    #[must_use]
    pub fn from_lines(lines: &LineMap) -> Self {
        Self {
            entries: lines
                .iter()
                .map(|(line, text)| (Some(line), text.to_owned()))
                .collect(),
        }
    }

    /// Returns the current lines, renumbered densely from 1.
    #[must_use]
    pub fn into_lines(self) -> LineMap {
        self.entries
            .into_iter()
            .zip(1_u32..)
            .map(|((_, text), line)| (line, text))
            .collect()
    }

    fn position(&self, line: u32) -> Result<usize, DocumentError> {
        self.entries
            .iter()
            .position(|(origin, _)| *origin == Some(line))
            .ok_or_else(|| DocumentError::unsupported(format!("line {line} is not in the document")))
    }
}

impl LineSink for TextDocument {
    fn delete_line(&mut self, line: u32) -> Result<(), DocumentError> {
        let index = self.position(line)?;
        self.entries.remove(index);
        Ok(())
    }

    fn modify_line(&mut self, line: u32, text: &str) -> Result<(), DocumentError> {
        let index = self.position(line)?;
        if let Some(entry) = self.entries.get_mut(index) {
            entry.1 = text.to_owned();
        }
        Ok(())
    }

    fn insert_after(&mut self, anchor: u32, text: &str) -> Result<(), DocumentError> {
        let index = self.position(anchor)?;
        self.entries.insert(index + 1, (None, text.to_owned()));
        Ok(())
    }

    fn prepend(&mut self, text: &str) -> Result<(), DocumentError> {
        self.entries.insert(0, (None, text.to_owned()));
        Ok(())
    }
}
