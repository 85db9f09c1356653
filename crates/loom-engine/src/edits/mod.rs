//! Edit batch model and decoding.
//!
//! An edit batch arrives as JSON from the edit generator:
//!
//! ```json
//! {"version": 1, "meta": {}, "ops": [{"op": "replace_line", "line": 3, "text": "..."}]}
//! ```
//!
//! Decoding is lenient per operation: malformed or unknown operations are
//! dropped and reported, so one bad op never discards the batch. The
//! envelope itself is strict; a non-object batch or a version other than 1
//! is a hard error.

mod target;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

pub use target::build_target;

use crate::error::EditBatchError;

/// The only batch version this engine accepts.
pub const SUPPORTED_VERSION: u64 = 1;

/// Separator between output lines inside an operation's `text`.
pub const LINE_BREAK: char = '\n';

/// Operation tags understood by the engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpKind {
    /// Replace one line with one line.
    ReplaceLine,
    /// Replace an inclusive range with zero or more lines.
    ReplaceRange,
    /// Insert lines after an anchor line.
    InsertAfter,
    /// Delete an inclusive range.
    DeleteRange,
}

impl OpKind {
    /// Returns the wire tag for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Returns whether the operation addresses a `start..=end` range.
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::ReplaceRange | Self::DeleteRange)
    }
}

/// A single line-addressed edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    /// Replace `line` with `text`, which must not contain a line break.
    ReplaceLine {
        /// Target line.
        line: u32,
        /// Replacement text.
        text: String,
        /// Text the caller believes is currently at the line.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_snippet: Option<String>,
        /// Rationale for the change.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        why: Option<String>,
    },
    /// Replace `start..=end` with the lines of `text`.
    ReplaceRange {
        /// First replaced line.
        start: u32,
        /// Last replaced line.
        end: u32,
        /// Replacement lines separated by `\n`.
        text: String,
        /// Text the caller believes is currently in the range.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_snippet: Option<String>,
        /// Rationale for the change.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        why: Option<String>,
    },
    /// Insert the lines of `text` after `line`.
    InsertAfter {
        /// Anchor line.
        line: u32,
        /// Inserted lines separated by `\n`.
        text: String,
        /// Text the caller believes is currently at the anchor.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_snippet: Option<String>,
        /// Rationale for the change.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        why: Option<String>,
    },
    /// Delete `start..=end`.
    DeleteRange {
        /// First deleted line.
        start: u32,
        /// Last deleted line.
        end: u32,
        /// Text the caller believes is currently in the range.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_snippet: Option<String>,
        /// Rationale for the change.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        why: Option<String>,
    },
}

impl EditOperation {
    /// Builds a bare `replace_line` operation.
    #[must_use]
    pub fn replace_line(line: u32, text: impl Into<String>) -> Self {
        Self::ReplaceLine {
            line,
            text: text.into(),
            current_snippet: None,
            why: None,
        }
    }

    /// Builds a bare `replace_range` operation.
    #[must_use]
    pub fn replace_range(start: u32, end: u32, text: impl Into<String>) -> Self {
        Self::ReplaceRange {
            start,
            end,
            text: text.into(),
            current_snippet: None,
            why: None,
        }
    }

    /// Builds a bare `insert_after` operation.
    #[must_use]
    pub fn insert_after(line: u32, text: impl Into<String>) -> Self {
        Self::InsertAfter {
            line,
            text: text.into(),
            current_snippet: None,
            why: None,
        }
    }

    /// Builds a bare `delete_range` operation.
    #[must_use]
    pub const fn delete_range(start: u32, end: u32) -> Self {
        Self::DeleteRange {
            start,
            end,
            current_snippet: None,
            why: None,
        }
    }

    /// Returns the operation's tag.
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::ReplaceLine { .. } => OpKind::ReplaceLine,
            Self::ReplaceRange { .. } => OpKind::ReplaceRange,
            Self::InsertAfter { .. } => OpKind::InsertAfter,
            Self::DeleteRange { .. } => OpKind::DeleteRange,
        }
    }

    /// Returns the inclusive span of existing lines the operation
    /// references. For `insert_after` this is the anchor alone.
    #[must_use]
    pub const fn span(&self) -> (u32, u32) {
        match self {
            Self::ReplaceLine { line, .. } | Self::InsertAfter { line, .. } => (*line, *line),
            Self::ReplaceRange { start, end, .. } | Self::DeleteRange { start, end, .. } => {
                (*start, *end)
            }
        }
    }

    /// Returns the operation's replacement or inserted text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::ReplaceLine { text, .. }
            | Self::ReplaceRange { text, .. }
            | Self::InsertAfter { text, .. } => Some(text),
            Self::DeleteRange { .. } => None,
        }
    }

    /// Splits the operation's text into output lines. Empty text is one
    /// empty line; `delete_range` has none.
    #[must_use]
    pub fn output_lines(&self) -> Vec<String> {
        self.text().map_or_else(Vec::new, split_output_lines)
    }
}

/// Splits operation text on [`LINE_BREAK`], dropping carriage returns.
#[must_use]
pub fn split_output_lines(text: &str) -> Vec<String> {
    text.split(LINE_BREAK)
        .map(|line| line.trim_end_matches('\r').to_owned())
        .collect()
}

/// A decoded edit batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditBatch {
    /// Batch format version; always [`SUPPORTED_VERSION`].
    pub version: u64,
    /// Free-form metadata from the generator.
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Operations in generator order.
    pub ops: Vec<EditOperation>,
}

impl EditBatch {
    /// Creates a batch at the supported version with empty metadata.
    #[must_use]
    pub fn new(ops: Vec<EditOperation>) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            meta: Map::new(),
            ops,
        }
    }

    /// Decodes a batch, dropping operations that fail to parse.
    ///
    /// Returns the batch and one message per dropped operation.
    ///
    /// # Errors
    ///
    /// Returns [`EditBatchError`] when `value` is not an object or its
    /// `version` is not 1.
    pub fn from_value(value: &Value) -> Result<(Self, Vec<String>), EditBatchError> {
        let object = value.as_object().ok_or(EditBatchError::NotAnObject)?;
        match object.get("version") {
            Some(version) if version.as_u64() == Some(SUPPORTED_VERSION) => {}
            Some(other) => {
                return Err(EditBatchError::UnsupportedVersion {
                    found: other.to_string(),
                });
            }
            None => {
                return Err(EditBatchError::UnsupportedVersion {
                    found: "missing".to_owned(),
                });
            }
        }
        let meta = object
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut ops = Vec::new();
        let mut dropped = Vec::new();
        let raw_ops = object.get("ops").and_then(Value::as_array);
        for (index, raw) in raw_ops.into_iter().flatten().enumerate() {
            match parse_operation(index, raw) {
                Ok(op) => ops.push(op),
                Err(message) => {
                    warn!(target: "loom::validate", %message, "dropped malformed operation");
                    dropped.push(message);
                }
            }
        }
        Ok((
            Self {
                version: SUPPORTED_VERSION,
                meta,
                ops,
            },
            dropped,
        ))
    }

    /// Parses JSON text and decodes it with [`EditBatch::from_value`].
    ///
    /// # Errors
    ///
    /// Returns [`EditBatchError::Json`] for invalid JSON, or any error from
    /// [`EditBatch::from_value`].
    pub fn from_json(text: &str) -> Result<(Self, Vec<String>), EditBatchError> {
        let value: Value = serde_json::from_str(text).map_err(|error| EditBatchError::Json {
            message: error.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Returns the batch with `ops` replaced, keeping version and metadata.
    #[must_use]
    pub fn with_ops(&self, ops: Vec<EditOperation>) -> Self {
        Self {
            version: self.version,
            meta: self.meta.clone(),
            ops,
        }
    }
}

/// Parses one raw operation. `index` is the zero-based position used in
/// messages.
///
/// # Errors
///
/// Returns a human-readable message for the first missing or ill-typed field
/// or an unknown tag.
pub fn parse_operation(index: usize, raw: &Value) -> Result<EditOperation, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| format!("Op {index}: operation must be an object"))?;
    let tag = object
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Op {index}: missing 'op' field"))?;
    let kind = tag
        .parse::<OpKind>()
        .map_err(|_| format!("Op {index}: unknown operation type '{tag}'"))?;
    let fields = OpFields { index, kind, object };
    let current_snippet = fields.optional_text("current_snippet");
    let why = fields.optional_text("why");

    let op = match kind {
        OpKind::ReplaceLine => EditOperation::ReplaceLine {
            line: fields.line("line")?,
            text: fields.text()?,
            current_snippet,
            why,
        },
        OpKind::InsertAfter => EditOperation::InsertAfter {
            line: fields.line("line")?,
            text: fields.text()?,
            current_snippet,
            why,
        },
        OpKind::ReplaceRange => {
            let (start, end) = fields.range()?;
            EditOperation::ReplaceRange {
                start,
                end,
                text: fields.text()?,
                current_snippet,
                why,
            }
        }
        OpKind::DeleteRange => {
            let (start, end) = fields.range()?;
            EditOperation::DeleteRange {
                start,
                end,
                current_snippet,
                why,
            }
        }
    };
    Ok(op)
}

struct OpFields<'a> {
    index: usize,
    kind: OpKind,
    object: &'a Map<String, Value>,
}

impl OpFields<'_> {
    fn line(&self, field: &str) -> Result<u32, String> {
        let value = self.object.get(field).ok_or_else(|| {
            format!("Op {}: {} missing '{field}' field", self.index, self.kind)
        })?;
        value
            .as_u64()
            .and_then(|number| u32::try_from(number).ok())
            .filter(|number| *number >= 1)
            .ok_or_else(|| format!("Op {}: '{field}' must be integer >= 1", self.index))
    }

    fn range(&self) -> Result<(u32, u32), String> {
        let start = self.line("start")?;
        let end = self.line("end")?;
        if start > end {
            return Err(format!(
                "Op {}: {} start ({start}) must be <= end ({end})",
                self.index, self.kind
            ));
        }
        Ok((start, end))
    }

    fn text(&self) -> Result<String, String> {
        match self.object.get("text") {
            None => Err(format!(
                "Op {}: {} missing 'text' field",
                self.index, self.kind
            )),
            Some(Value::String(text)) => Ok(text.clone()),
            Some(_) => Err(format!(
                "Op {}: {} 'text' must be a string",
                self.index, self.kind
            )),
        }
    }

    fn optional_text(&self, field: &str) -> Option<String> {
        self.object
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}
