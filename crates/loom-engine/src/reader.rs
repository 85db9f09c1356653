//! Reading and writing LaTeX and Typst sources as line maps.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::DocumentError;
use crate::format::{DocumentFormat, ReadMode};
use crate::lines::LineMap;
use crate::syntax::{check_latex_balance, check_typst_balance};

/// Reads a text-based document and returns its line map and raw text.
///
/// The raw text must pass the format's balance check before any lines are
/// produced.
///
/// # Errors
///
/// Returns [`DocumentError::Io`] or [`DocumentError::Decode`] when the file
/// cannot be read as UTF-8, [`DocumentError::Syntax`] when the balance check
/// fails, and [`DocumentError::Unsupported`] for DOCX.
pub fn read_text_document(
    format: DocumentFormat,
    path: &Path,
    mode: ReadMode,
) -> Result<(LineMap, String), DocumentError> {
    let bytes = fs::read(path).map_err(|source| DocumentError::io(path, source))?;
    let text = String::from_utf8(bytes).map_err(|error| DocumentError::Decode {
        path: path.to_path_buf(),
        message: error.utf8_error().to_string(),
    })?;

    let balance = match format {
        DocumentFormat::Latex => check_latex_balance(&text),
        DocumentFormat::Typst => check_typst_balance(&text),
        DocumentFormat::Docx => {
            return Err(DocumentError::unsupported(
                "docx packages are not text documents",
            ));
        }
    };
    balance.map_err(|issue| DocumentError::Syntax {
        format,
        path: path.to_path_buf(),
        issue,
    })?;

    let lines = match mode {
        ReadMode::Default => LineMap::from_text_dense(&text),
        ReadMode::PreserveStructure => LineMap::from_text_preserving(&text),
    };
    debug!(
        target: "loom::reader",
        path = %path.display(),
        %format,
        ?mode,
        lines = lines.len(),
        "read text document"
    );
    Ok((lines, text))
}

/// Writes the values of `lines` in ascending order, one per line, creating
/// parent directories as needed.
///
/// # Errors
///
/// Returns [`DocumentError::Io`] when a directory or the file cannot be
/// written.
pub fn write_text_lines(lines: &LineMap, path: &Path) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DocumentError::io(parent, source))?;
    }
    fs::write(path, lines.to_text()).map_err(|source| DocumentError::io(path, source))
}
