//! Builds the post-edit line map from an edit batch.

use std::cmp::Reverse;

use tracing::debug;

use super::{EditBatch, EditOperation};
use crate::error::EditError;
use crate::lines::LineMap;

/// Applies `batch` to a copy of `lines` and returns the target map.
///
/// Operations run from the highest primary line to the lowest, so earlier
/// lines keep their numbers while later ones shift. Several `insert_after`
/// operations on the same anchor produce their lines in batch order.
///
/// A `replace_range` whose text has a different line count than its span
/// shifts every later line by the difference.
///
/// # Errors
///
/// Returns [`EditError`] when an operation references a missing line, a
/// range is reversed, or renumbering would leave the valid line range.
pub fn build_target(lines: &LineMap, batch: &EditBatch) -> Result<LineMap, EditError> {
    let mut order: Vec<(usize, &EditOperation)> = batch.ops.iter().enumerate().collect();
    order.sort_by_key(|(index, op)| (Reverse(op.span().0), Reverse(*index)));

    let mut target = lines.clone();
    for (_, op) in order {
        target = apply_one(target, op)?;
    }
    debug!(
        target: "loom::apply",
        ops = batch.ops.len(),
        before = lines.len(),
        after = target.len(),
        "built target line map"
    );
    Ok(target)
}

fn apply_one(mut map: LineMap, op: &EditOperation) -> Result<LineMap, EditError> {
    let kind = op.kind().as_str();
    let (start, end) = op.span();
    if start > end {
        return Err(EditError::InvalidRange {
            op: kind,
            start,
            end,
        });
    }
    if let Some(line) = (start..=end).find(|line| !map.contains(*line)) {
        return Err(EditError::MissingLine { op: kind, line });
    }

    match op {
        EditOperation::ReplaceLine { line, text, .. } => {
            map.insert(*line, text.clone());
            Ok(map)
        }
        EditOperation::ReplaceRange { .. } => {
            let replacement = op.output_lines();
            for line in start..=end {
                map.remove(line);
            }
            let delta = count(&replacement) - span_len(start, end);
            let mut shifted = map
                .shifted_after(end, delta)
                .ok_or(EditError::Renumber { line: end })?;
            write_lines(&mut shifted, start, replacement, end)?;
            Ok(shifted)
        }
        EditOperation::InsertAfter { line, .. } => {
            let inserted = op.output_lines();
            let mut shifted = map
                .shifted_after(*line, count(&inserted))
                .ok_or(EditError::Renumber { line: *line })?;
            let first = line.checked_add(1).ok_or(EditError::Renumber { line: *line })?;
            write_lines(&mut shifted, first, inserted, *line)?;
            Ok(shifted)
        }
        EditOperation::DeleteRange { .. } => {
            for line in start..=end {
                map.remove(line);
            }
            map.shifted_after(end, -span_len(start, end))
                .ok_or(EditError::Renumber { line: end })
        }
    }
}

fn write_lines(
    map: &mut LineMap,
    first: u32,
    texts: Vec<String>,
    context_line: u32,
) -> Result<(), EditError> {
    let mut line = first;
    for text in texts {
        map.insert(line, text);
        line = line
            .checked_add(1)
            .ok_or(EditError::Renumber { line: context_line })?;
    }
    Ok(())
}

fn count(lines: &[String]) -> i64 {
    i64::try_from(lines.len()).unwrap_or(i64::MAX)
}

fn span_len(start: u32, end: u32) -> i64 {
    i64::from(end) - i64::from(start) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(count: u32) -> LineMap {
        (1..=count).map(|line| (line, format!("line {line}"))).collect()
    }

    fn values(map: &LineMap) -> Vec<(u32, String)> {
        map.iter().map(|(line, text)| (line, text.to_owned())).collect()
    }

    #[test]
    fn replace_line_keeps_numbering() {
        let batch = EditBatch::new(vec![EditOperation::replace_line(2, "two")]);
        let target = build_target(&lines(3), &batch).expect("target");
        assert_eq!(target.get(2), Some("two"));
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn growing_range_shifts_later_lines() {
        let batch = EditBatch::new(vec![EditOperation::replace_range(2, 2, "a\nb\nc")]);
        let target = build_target(&lines(3), &batch).expect("target");
        assert_eq!(
            values(&target),
            vec![
                (1, "line 1".to_owned()),
                (2, "a".to_owned()),
                (3, "b".to_owned()),
                (4, "c".to_owned()),
                (5, "line 3".to_owned()),
            ]
        );
    }

    #[test]
    fn shrinking_range_pulls_later_lines_up() {
        let batch = EditBatch::new(vec![EditOperation::replace_range(1, 3, "merged")]);
        let target = build_target(&lines(4), &batch).expect("target");
        assert_eq!(
            values(&target),
            vec![(1, "merged".to_owned()), (2, "line 4".to_owned())]
        );
    }

    #[test]
    fn operations_apply_bottom_up() {
        let batch = EditBatch::new(vec![
            EditOperation::insert_after(1, "after one"),
            EditOperation::delete_range(3, 4),
            EditOperation::replace_line(5, "five"),
        ]);
        let target = build_target(&lines(5), &batch).expect("target");
        assert_eq!(
            values(&target),
            vec![
                (1, "line 1".to_owned()),
                (2, "after one".to_owned()),
                (3, "line 2".to_owned()),
                (4, "five".to_owned()),
            ]
        );
    }

    #[test]
    fn inserts_on_one_anchor_keep_batch_order() {
        let batch = EditBatch::new(vec![
            EditOperation::insert_after(1, "first"),
            EditOperation::insert_after(1, "second"),
        ]);
        let target = build_target(&lines(2), &batch).expect("target");
        assert_eq!(target.get(2), Some("first"));
        assert_eq!(target.get(3), Some("second"));
        assert_eq!(target.get(4), Some("line 2"));
    }

    #[test]
    fn missing_lines_are_errors() {
        let batch = EditBatch::new(vec![EditOperation::delete_range(2, 9)]);
        assert_eq!(
            build_target(&lines(3), &batch),
            Err(EditError::MissingLine {
                op: "delete_range",
                line: 4
            })
        );
    }
}
