//! Multi-format line-edit engine for Loom.
//!
//! The `loom-engine` crate turns DOCX, LaTeX and Typst resumes into a sparse
//! [`LineMap`], works out where the document's sections and protected
//! regions are, and applies batches of line-addressed edit operations
//! without breaking the source format.
//!
//! # Pipeline
//!
//! 1. [`DocumentFormat::read`] produces a [`LoadedDocument`]. Text formats
//!    are balance-checked on the way in.
//! 2. [`DocumentFormat::build_context`] resolves the template descriptor and
//!    runs section analysis, including Typst frozen-range detection.
//! 3. [`validate_edits`] checks a raw JSON batch for type, bounds and
//!    conflict problems and returns warnings. The [`strategy`] module
//!    decides what those warnings mean for the run.
//! 4. [`DocumentFormat::filter_edits`] drops operations that would damage
//!    structural, frozen or command-bearing lines.
//! 5. [`build_target`] computes the edited line map and
//!    [`LoadedDocument::write_edited`] writes it back, keeping untouched
//!    formatting.
//!
//! Problems with individual operations are soft: they come back as warning
//! or note strings. Unreadable documents, bad descriptors and malformed
//! batch envelopes are hard errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use loom_engine::{
//!     DescriptorCache, DocumentFormat, DocxApplyMode, EditBatch, ReadMode, RiskLevel,
//!     build_target, validate_edits,
//! };
//!
//! let path = Path::new("resume.tex");
//! let format = DocumentFormat::from_path(path)?;
//! let loaded = format.read(path, ReadMode::Default)?;
//! let mut cache = DescriptorCache::new();
//! let context = format.build_context(&mut cache, &loaded)?;
//!
//! let raw = serde_json::json!({
//!     "version": 1,
//!     "ops": [{"op": "replace_line", "line": 5, "text": "Shipped the thing"}]
//! });
//! let warnings = validate_edits(&raw, &loaded.lines, RiskLevel::Medium);
//! assert!(warnings.is_empty());
//!
//! let (batch, _dropped) = EditBatch::from_value(&raw)?;
//! let filtered = format.filter_edits(
//!     &batch,
//!     &loaded.lines,
//!     context.descriptor.as_deref(),
//!     &context.analysis.frozen_ranges,
//! );
//! let target = build_target(&loaded.lines, &filtered.batch)?;
//! loaded.write_edited(&target, Path::new("resume.edited.tex"), DocxApplyMode::InPlace)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod apply;
pub mod docx;
pub mod edits;
pub mod error;
pub mod filter;
pub mod format;
pub mod lines;
pub mod reader;
pub mod strategy;
pub mod syntax;
pub mod template;
pub mod validate;

#[cfg(test)]
mod tests;

pub use self::analysis::{DocumentAnalysis, FrozenRange, Section, SectionPayload, SectionSource};
pub use self::apply::{EditPlan, LineSink, apply_plan, plan_edits};
pub use self::docx::DocxApplyMode;
pub use self::edits::{EditBatch, EditOperation, OpKind, build_target};
pub use self::error::{DocumentError, EditBatchError, EditError, TemplateError};
pub use self::filter::FilterResult;
pub use self::format::{DocumentContext, DocumentFormat, LoadedDocument, ReadMode};
pub use self::lines::{LineMap, diff_lines};
pub use self::strategy::{ValidationError, ValidationOutcome, ValidationPolicy};
pub use self::syntax::{SyntaxIssue, validate_output};
pub use self::template::{DescriptorCache, TemplateDescriptor};
pub use self::validate::{RiskLevel, validate_edits};
