//! Document formats and the per-format capability surface.
//!
//! [`DocumentFormat`] is resolved from a file extension and then dispatches
//! reading, template detection, analysis and filtering to the format's
//! implementation.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{self, DocumentAnalysis, FrozenRange};
use crate::apply::{EditPlan, TextDocument, apply_plan, plan_edits};
use crate::docx::{self, DocxApplyMode, DocxDocument, DocxEditor, ParagraphMap};
use crate::edits::EditBatch;
use crate::error::{DocumentError, TemplateError};
use crate::filter::{self, FilterResult};
use crate::lines::LineMap;
use crate::reader;
use crate::template::{DescriptorCache, TemplateDescriptor};

/// A supported document format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentFormat {
    /// Office Open XML word-processing package.
    Docx,
    /// LaTeX source.
    Latex,
    /// Typst source.
    Typst,
}

/// Extension lookup table, lowercase and without the leading dot.
const EXTENSIONS: &[(&str, DocumentFormat)] = &[
    ("docx", DocumentFormat::Docx),
    ("tex", DocumentFormat::Latex),
    ("latex", DocumentFormat::Latex),
    ("typ", DocumentFormat::Typst),
];

/// Error returned when a string names no supported format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown document format '{0}'")]
pub struct UnknownFormat(pub String);

impl DocumentFormat {
    /// Returns the lowercase format name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Latex => "latex",
            Self::Typst => "typst",
        }
    }

    /// Resolves a format from a bare extension such as `tex`.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(known, _)| *known == wanted)
            .map(|(_, format)| *format)
    }

    /// Resolves a format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] when the extension is
    /// missing or unknown.
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| DocumentError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    /// Reads `path` into a line map.
    ///
    /// DOCX ignores `mode`; its lines are always the non-empty paragraphs.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the file cannot be read, decoded or
    /// parsed, or when a text source fails its balance check.
    pub fn read(self, path: &Path, mode: ReadMode) -> Result<LoadedDocument, DocumentError> {
        match self {
            Self::Docx => {
                let (lines, document, paragraphs) = docx::read_docx(path)?;
                Ok(LoadedDocument {
                    format: self,
                    path: path.to_path_buf(),
                    lines,
                    source: DocumentSource::Docx {
                        document,
                        paragraphs,
                    },
                })
            }
            Self::Latex | Self::Typst => {
                let (lines, text) = reader::read_text_document(self, path, mode)?;
                Ok(LoadedDocument {
                    format: self,
                    path: path.to_path_buf(),
                    lines,
                    source: DocumentSource::Text(text),
                })
            }
        }
    }

    /// Resolves the template descriptor for a document through `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a descriptor file exists but is
    /// invalid.
    pub fn detect_template(
        self,
        cache: &mut DescriptorCache,
        path: &Path,
        text: &str,
    ) -> Result<Option<Arc<TemplateDescriptor>>, TemplateError> {
        cache.detect(self, path, text)
    }

    /// Detects sections in `lines`.
    #[must_use]
    pub fn analyze(
        self,
        lines: &LineMap,
        descriptor: Option<&TemplateDescriptor>,
    ) -> DocumentAnalysis {
        analysis::analyze(self, lines, descriptor)
    }

    /// Drops operations that would damage this format's structure.
    #[must_use]
    pub fn filter_edits(
        self,
        batch: &EditBatch,
        lines: &LineMap,
        descriptor: Option<&TemplateDescriptor>,
        frozen_ranges: &[FrozenRange],
    ) -> FilterResult {
        filter::filter_edits(self, batch, lines, descriptor, frozen_ranges)
    }

    /// Detects the template and analyses a loaded document in one step.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a descriptor file exists but is
    /// invalid.
    pub fn build_context(
        self,
        cache: &mut DescriptorCache,
        loaded: &LoadedDocument,
    ) -> Result<DocumentContext, TemplateError> {
        let descriptor = self.detect_template(cache, &loaded.path, loaded.text().unwrap_or(""))?;
        let analysis = self.analyze(&loaded.lines, descriptor.as_deref());
        Ok(DocumentContext {
            descriptor,
            analysis,
        })
    }
}

impl FromStr for DocumentFormat {
    type Err = UnknownFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        [Self::Docx, Self::Latex, Self::Typst]
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .or_else(|| Self::from_extension(&wanted))
            .ok_or(UnknownFormat(wanted))
    }
}

/// How text sources are turned into line maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Trimmed, non-empty lines numbered densely from 1.
    #[default]
    Default,
    /// Every physical line, numbered by position, blank lines kept.
    PreserveStructure,
}

impl ReadMode {
    /// Maps the `preserve_structure` flag onto a mode.
    #[must_use]
    pub const fn from_preserve_flag(preserve: bool) -> Self {
        if preserve {
            Self::PreserveStructure
        } else {
            Self::Default
        }
    }
}

/// The format-specific source a line map was read from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Raw text of a LaTeX or Typst file.
    Text(String),
    /// A parsed DOCX package and its line-to-paragraph index.
    Docx {
        /// The parsed package.
        document: DocxDocument,
        /// Line number to paragraph handle.
        paragraphs: ParagraphMap,
    },
}

/// A document read from disk together with its line map.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Format the document was read as.
    pub format: DocumentFormat,
    /// Path the document was read from.
    pub path: PathBuf,
    /// The line model.
    pub lines: LineMap,
    /// The underlying source.
    pub source: DocumentSource,
}

impl LoadedDocument {
    /// Returns the raw text for text formats.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.source {
            DocumentSource::Text(text) => Some(text),
            DocumentSource::Docx { .. } => None,
        }
    }

    /// Applies the difference between this document's lines and `target`,
    /// writes the result to `output`, and returns the plan used.
    ///
    /// Text formats are rewritten line by line. DOCX packages are edited in
    /// place or rebuilt according to `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the output cannot be serialized or
    /// written.
    pub fn write_edited(
        self,
        target: &LineMap,
        output: &Path,
        mode: DocxApplyMode,
    ) -> Result<EditPlan, DocumentError> {
        let plan = plan_edits(&self.lines, target);
        match self.source {
            DocumentSource::Text(_) => {
                let mut document = TextDocument::from_lines(&self.lines);
                apply_plan(&plan, &mut document)?;
                reader::write_text_lines(&document.into_lines(), output)?;
            }
            DocumentSource::Docx {
                mut document,
                paragraphs,
            } => {
                match mode {
                    DocxApplyMode::InPlace => {
                        let mut editor = DocxEditor::new(&mut document, &paragraphs);
                        apply_plan(&plan, &mut editor)?;
                    }
                    DocxApplyMode::Rebuild => document.rebuild(target, &paragraphs),
                }
                document.save(output)?;
            }
        }
        Ok(plan)
    }
}

/// Template and section analysis for a loaded document.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    /// The resolved template descriptor, if any.
    pub descriptor: Option<Arc<TemplateDescriptor>>,
    /// Detected sections and notes.
    pub analysis: DocumentAnalysis,
}
