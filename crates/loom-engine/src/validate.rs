//! Edit batch validation.
//!
//! [`validate_edits`] never fails. Every problem with a batch, from a
//! missing field to two operations fighting over a line, is returned as a
//! warning string. Whether warnings stop the pipeline is decided by the
//! strategy engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::debug;

use crate::edits::{EditOperation, OpKind, parse_operation};
use crate::lines::LineMap;

/// Caller-supplied strictness tier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RiskLevel {
    /// Advisory findings only.
    Low,
    /// Line-count mismatches are flagged as collisions.
    #[default]
    #[serde(alias = "med")]
    #[strum(to_string = "medium", serialize = "med")]
    Medium,
    /// As medium.
    High,
    /// As high.
    Strict,
}

impl RiskLevel {
    /// Returns whether a range line-count mismatch is called out as a
    /// collision at this level.
    #[must_use]
    pub const fn flags_collisions(self) -> bool {
        !matches!(self, Self::Low)
    }
}

/// Validates a raw edit batch against the document's lines.
///
/// Per-operation checks stop at the first failure for that operation and
/// move on to the next. Batch-level conflict checks run afterwards over the
/// operations that passed.
#[must_use]
pub fn validate_edits(batch: &Value, lines: &LineMap, risk: RiskLevel) -> Vec<String> {
    let Some(raw_ops) = batch.get("ops") else {
        return vec!["Missing 'ops' field in edits".to_owned()];
    };
    let Some(ops) = raw_ops.as_array() else {
        return vec!["'ops' field must be a list".to_owned()];
    };
    if ops.is_empty() {
        return vec!["'ops' list is empty".to_owned()];
    }

    let mut warnings = Vec::new();
    let mut touched: BTreeMap<u32, (usize, OpKind)> = BTreeMap::new();
    let mut accepted: Vec<(usize, EditOperation)> = Vec::new();

    for (index, raw) in ops.iter().enumerate() {
        let op = match parse_operation(index, raw) {
            Ok(op) => op,
            Err(message) => {
                warnings.push(message);
                continue;
            }
        };
        if let Err(message) = check_operation(index, &op, lines, risk, &mut warnings) {
            warnings.push(message);
            continue;
        }
        record_touches(index, &op, &mut touched, &mut warnings);
        accepted.push((index, op));
    }

    cross_operation_checks(&accepted, &mut warnings);
    debug!(
        target: "loom::validate",
        ops = ops.len(),
        warnings = warnings.len(),
        risk = %risk,
        "validated edit batch"
    );
    warnings
}

/// Checks line-break and bounds rules for one decoded operation. Returns the
/// short-circuiting failure; non-fatal findings go to `warnings`.
fn check_operation(
    index: usize,
    op: &EditOperation,
    lines: &LineMap,
    risk: RiskLevel,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if let EditOperation::ReplaceLine { text, .. } = op {
        if text.contains(crate::edits::LINE_BREAK) {
            return Err(format!(
                "Op {index}: replace_line text contains newline; use replace_range instead"
            ));
        }
    }

    let (start, end) = op.span();
    if let Some(missing) = (start..=end).find(|line| !lines.contains(*line)) {
        return Err(format!("Op {index}: line {missing} not in resume bounds"));
    }

    if let EditOperation::ReplaceRange { .. } = op {
        let produced = op.output_lines().len();
        let expected = u64::from(end - start) + 1;
        if u64::try_from(produced).ok() != Some(expected) {
            let mut message = format!(
                "Op {index}: replace_range line count mismatch ({expected} -> {produced})"
            );
            if risk.flags_collisions() {
                message.push_str(" (will cause line collisions)");
            }
            warnings.push(message);
        }
    }
    Ok(())
}

fn record_touches(
    index: usize,
    op: &EditOperation,
    touched: &mut BTreeMap<u32, (usize, OpKind)>,
    warnings: &mut Vec<String>,
) {
    let kind = op.kind();
    if kind == OpKind::InsertAfter {
        return;
    }
    let (start, end) = op.span();
    if let Some((line, (other, other_kind))) = touched.range(start..=end).next() {
        if kind.is_range() && other_kind.is_range() {
            warnings.push(format!(
                "Op {index}: overlaps {other_kind} (op {other}) on line {line}"
            ));
        } else {
            warnings.push(format!("Op {index}: duplicate operation on line {line}"));
        }
    }
    for line in start..=end {
        touched.insert(line, (index, kind));
    }
}

fn cross_operation_checks(accepted: &[(usize, EditOperation)], warnings: &mut Vec<String>) {
    let with_kind = |wanted: OpKind| {
        accepted
            .iter()
            .filter(move |(_, op)| op.kind() == wanted)
            .map(|(index, op)| (*index, op.span()))
    };
    let overlaps = |(a_start, a_end): (u32, u32), (b_start, b_end): (u32, u32)| {
        a_start <= b_end && b_start <= a_end
    };

    let mut anchors: BTreeMap<u32, usize> = BTreeMap::new();
    for (index, (anchor, _)) in with_kind(OpKind::InsertAfter) {
        if let Some((deleter, _)) = with_kind(OpKind::DeleteRange)
            .find(|(_, span)| overlaps(*span, (anchor, anchor)))
        {
            warnings.push(format!(
                "Op {index}: insert_after on line {anchor} deleted by op {deleter}"
            ));
        }
        if let Some((replacer, _)) = with_kind(OpKind::ReplaceLine)
            .chain(with_kind(OpKind::ReplaceRange))
            .find(|(_, span)| overlaps(*span, (anchor, anchor)))
        {
            warnings.push(format!(
                "Op {index}: insert_after on line {anchor} anchors on a line replaced by op {replacer}"
            ));
        }
        let seen = anchors.entry(anchor).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            warnings.push(format!("Op {index}: multiple insert_after on line {anchor}"));
        }
    }

    for (index, span) in with_kind(OpKind::DeleteRange) {
        if let Some((replacer, _)) =
            with_kind(OpKind::ReplaceRange).find(|(_, other)| overlaps(span, *other))
        {
            warnings.push(format!(
                "Op {index}: delete_range overlaps replace_range (op {replacer}); split or reorder ops"
            ));
        }
    }
}
