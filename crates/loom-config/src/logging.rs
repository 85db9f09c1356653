//! Log output format selection.

use serde::{Deserialize, Serialize};

/// How the `loom` binary renders its tracing output on stderr.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened.
    Json,
    /// Terse single-line text.
    #[default]
    Compact,
}

impl LogFormat {
    /// Whether events are emitted as JSON.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}
