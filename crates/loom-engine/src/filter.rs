//! Format-aware safety pass over an edit batch.
//!
//! The filter is independent of the validator: it drops operations that are
//! individually well formed but would touch structural lines, frozen
//! template regions or, for LaTeX, silently remove commands. A dropped
//! operation is never an error; it produces a note and the batch carries on
//! without it.

use tracing::info;

use crate::analysis::patterns;
use crate::analysis::{FrozenRange, is_in_frozen_range};
use crate::edits::{EditBatch, EditOperation, OpKind};
use crate::format::DocumentFormat;
use crate::lines::LineMap;
use crate::template::TemplateDescriptor;

/// The surviving batch and one note per dropped operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    /// Operations that passed the filter, in original order.
    pub batch: EditBatch,
    /// Human-readable reasons for each drop.
    pub notes: Vec<String>,
}

const ITEM_COMMAND: &str = r"\item";

/// Filters `batch` for `format`.
///
/// `frozen_ranges` only has an effect for Typst; other formats pass an
/// empty slice.
#[must_use]
pub fn filter_edits(
    format: DocumentFormat,
    batch: &EditBatch,
    lines: &LineMap,
    descriptor: Option<&TemplateDescriptor>,
    frozen_ranges: &[FrozenRange],
) -> FilterResult {
    let mut kept = Vec::with_capacity(batch.ops.len());
    let mut notes = Vec::new();
    for op in &batch.ops {
        match check(format, op, lines, descriptor, frozen_ranges) {
            Ok(()) => kept.push(op.clone()),
            Err(note) => {
                info!(target: "loom::filter", format = %format, %note, "dropped edit operation");
                notes.push(note);
            }
        }
    }
    FilterResult {
        batch: batch.with_ops(kept),
        notes,
    }
}

fn check(
    format: DocumentFormat,
    op: &EditOperation,
    lines: &LineMap,
    descriptor: Option<&TemplateDescriptor>,
    frozen_ranges: &[FrozenRange],
) -> Result<(), String> {
    let kind = op.kind();
    let (start, end) = op.span();
    let verb = if kind == OpKind::InsertAfter { "on" } else { "touching" };

    for (line, text) in lines.range(start, end) {
        if format == DocumentFormat::Typst && is_in_frozen_range(line, frozen_ranges) {
            return Err(format!("Skipped {kind} on frozen range line {line}"));
        }
        if patterns::is_structural(format, text) {
            return Err(format!("Skipped {kind} {verb} structural line {line}"));
        }
        if let Some(reason) = descriptor.and_then(|template| template.frozen.matches(text)) {
            return Err(format!("Skipped {kind} {verb} frozen line {line} ({reason})"));
        }
    }

    if format == DocumentFormat::Latex {
        check_latex_commands(op, lines)?;
    }
    Ok(())
}

fn check_latex_commands(op: &EditOperation, lines: &LineMap) -> Result<(), String> {
    if op.kind() == OpKind::InsertAfter {
        return Ok(());
    }
    let (start, end) = op.span();
    let original: String = lines
        .range(start, end)
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join("\n");
    let original_commands = patterns::latex_commands(&original);

    let Some(replacement) = op.text() else {
        if original_commands.is_empty() {
            return Ok(());
        }
        return Err("Dropped delete_range that would remove LaTeX commands".to_owned());
    };

    let new_commands = patterns::latex_commands(replacement);
    if original_commands.contains(&ITEM_COMMAND) && !new_commands.contains(&ITEM_COMMAND) {
        return Err(format!("Dropped edit removing {ITEM_COMMAND} command"));
    }
    if original_commands
        .iter()
        .any(|command| !new_commands.contains(command))
    {
        return Err("Dropped edit removing LaTeX commands".to_owned());
    }
    Ok(())
}
