//! Hard-channel error types.
//!
//! Readers, template loaders and the edit batch decoder fail fast with the
//! errors defined here. Problems with individual edit operations never use
//! these types; they are reported as warning strings by the validator and as
//! notes by the filter.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::DocumentFormat;
use crate::syntax::SyntaxIssue;

/// Errors raised while reading or writing a document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    /// The file extension does not map to a supported format.
    #[error("unsupported document type: {}", path.display())]
    UnsupportedFormat {
        /// The path whose extension was not recognised.
        path: PathBuf,
    },

    /// The file could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid UTF-8.
    #[error("{} is not valid UTF-8: {message}", path.display())]
    Decode {
        /// The path that failed to decode.
        path: PathBuf,
        /// Description of the decoding failure.
        message: String,
    },

    /// The source failed the format's delimiter balance check.
    #[error("{format} syntax error in {}: {issue}", path.display())]
    Syntax {
        /// The document format whose check failed.
        format: DocumentFormat,
        /// The path of the offending document.
        path: PathBuf,
        /// Location and description of the first problem.
        issue: SyntaxIssue,
    },

    /// The word-processor package is corrupt or lacks its main part.
    #[error("invalid docx package {}: {message}", path.display())]
    Docx {
        /// The path of the package.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// An operation was requested that the loaded document cannot support.
    #[error("{message}")]
    Unsupported {
        /// Description of the mismatch.
        message: String,
    },
}

impl DocumentError {
    /// Creates an I/O error for the given path.
    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a DOCX package error for the given path.
    #[must_use]
    pub fn docx(path: &Path, message: impl Into<String>) -> Self {
        Self::Docx {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an error describing an unsupported operation.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

/// Errors raised while loading a template descriptor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    /// The descriptor file could not be read.
    #[error("failed to read template descriptor {}: {source}", path.display())]
    Io {
        /// Path of the descriptor.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The descriptor is not valid TOML or has the wrong shape.
    #[error("invalid template descriptor {}: {message}", path.display())]
    Parse {
        /// Path of the descriptor.
        path: PathBuf,
        /// Description of the parse failure.
        message: String,
    },

    /// A mandatory `[template]` key is absent.
    #[error("template descriptor {} is missing required field 'template.{field}'", path.display())]
    MissingField {
        /// Path of the descriptor.
        path: PathBuf,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A regex section rule does not compile.
    #[error("invalid regex for section '{key}' in {}: {message}", path.display())]
    InvalidPattern {
        /// Path of the descriptor.
        path: PathBuf,
        /// The section key owning the rule.
        key: String,
        /// Description of the compile failure.
        message: String,
    },
}

impl TemplateError {
    /// Creates a parse error for the given descriptor path.
    #[must_use]
    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a missing-field error for the given descriptor path.
    #[must_use]
    pub fn missing_field(path: &Path, field: &'static str) -> Self {
        Self::MissingField {
            path: path.to_path_buf(),
            field,
        }
    }
}

/// Errors raised when an edit batch envelope cannot be accepted at all.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditBatchError {
    /// The batch is not a JSON object.
    #[error("edit batch must be a JSON object")]
    NotAnObject,

    /// The batch declares a version this engine does not understand.
    #[error("unsupported edit batch version: {found}")]
    UnsupportedVersion {
        /// The version value as written in the batch.
        found: String,
    },

    /// The batch text is not valid JSON.
    #[error("edit batch is not valid JSON: {message}")]
    Json {
        /// Description of the parse failure.
        message: String,
    },
}

/// Errors raised while constructing a target line map from operations.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
    /// An operation referenced a line that does not exist.
    #[error("{op} references line {line}, which does not exist")]
    MissingLine {
        /// The operation kind.
        op: &'static str,
        /// The missing line.
        line: u32,
    },

    /// A range operation has its bounds reversed.
    #[error("{op} has start {start} greater than end {end}")]
    InvalidRange {
        /// The operation kind.
        op: &'static str,
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
    },

    /// Shifting line numbers would overflow or drop below one.
    #[error("line renumbering out of range after line {line}")]
    Renumber {
        /// The line after which renumbering failed.
        line: u32,
    },
}
