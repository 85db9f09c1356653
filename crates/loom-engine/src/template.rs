//! Template descriptor discovery and loading.
//!
//! A descriptor is a `loom-template.toml` file found in the document's
//! directory or any ancestor. It declares section detection rules and frozen
//! regions for a specific resume template. A document can also name its
//! template through an inline `loom-template: <id>` comment; when no
//! descriptor file exists the marker alone yields an inline-only descriptor
//! with empty rules.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::analysis::patterns;
use crate::error::TemplateError;
use crate::format::DocumentFormat;

/// File name searched for in the document's ancestor directories.
pub const DESCRIPTOR_FILENAME: &str = "loom-template.toml";

/// Template type given to descriptors synthesized from an inline marker.
pub const INLINE_TEMPLATE_TYPE: &str = "resume";

/// How a section rule's pattern is matched against a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Substring match.
    #[default]
    Literal,
    /// Regular expression search.
    Regex,
}

/// A single section detection rule.
#[derive(Debug, Clone)]
pub struct SectionRule {
    /// The key under `[sections]`.
    pub key: String,
    /// Pattern text as written in the descriptor.
    pub pattern: String,
    /// Matching mode.
    pub pattern_type: PatternType,
    /// Canonical kind override; the key is used when absent.
    pub kind: Option<String>,
    /// Whether item lines are collected for sections from this rule.
    pub split_items: bool,
    /// Whether the section may be absent without a note.
    pub optional: bool,
    compiled: Option<Regex>,
}

impl SectionRule {
    /// Returns the kind this rule assigns to matched sections.
    #[must_use]
    pub fn section_kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.key)
    }

    /// Returns the matched heading text when `line` satisfies the rule.
    ///
    /// A rule with an empty pattern never matches.
    #[must_use]
    pub fn find_in<'a>(&self, line: &'a str) -> Option<&'a str> {
        if self.pattern.is_empty() {
            return None;
        }
        match (&self.pattern_type, &self.compiled) {
            (PatternType::Regex, Some(regex)) => regex.find(line).map(|found| found.as_str()),
            _ => line
                .find(self.pattern.as_str())
                .and_then(|start| line.get(start..start + self.pattern.len())),
        }
    }
}

/// Lines a template declares immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrozenRules {
    /// Path-like tokens; lines referencing them are frozen.
    pub paths: Vec<String>,
    /// Substrings; lines containing them are frozen.
    pub patterns: Vec<String>,
}

impl FrozenRules {
    /// Returns the reason a line is frozen, if any rule matches it.
    #[must_use]
    pub fn matches(&self, line: &str) -> Option<String> {
        if let Some(pattern) = self
            .patterns
            .iter()
            .find(|pattern| !pattern.is_empty() && line.contains(pattern.as_str()))
        {
            return Some(format!("frozen pattern '{pattern}'"));
        }
        self.paths
            .iter()
            .find(|path| path_matches(line, path))
            .map(|path| format!("frozen path '{path}'"))
    }

    /// Returns whether no frozen rules are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.patterns.is_empty()
    }
}

fn path_matches(line: &str, path: &str) -> bool {
    let normalised = path.replace('\\', "/");
    let stem = normalised
        .strip_suffix(".tex")
        .or_else(|| normalised.strip_suffix(".typ"))
        .unwrap_or(&normalised);
    !stem.is_empty() && line.contains(stem)
}

/// Section and frozen-region rules for one resume template.
#[derive(Debug, Clone)]
pub struct TemplateDescriptor {
    /// Template identifier.
    pub id: String,
    /// Template type, for example `resume`.
    pub template_type: String,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional version string.
    pub version: Option<String>,
    /// Section rules in declaration order.
    pub sections: IndexMap<String, SectionRule>,
    /// Frozen region rules.
    pub frozen: FrozenRules,
    /// Uninterpreted `[custom]` table.
    pub custom: toml::Table,
    /// Descriptor file path; absent for inline-only descriptors.
    pub source_path: Option<PathBuf>,
    /// Template id named by the document's inline marker, if any.
    pub inline_marker: Option<String>,
    /// Whether the descriptor was synthesized from a marker alone.
    pub inline_only: bool,
}

impl TemplateDescriptor {
    /// Builds an inline-only descriptor with empty rules.
    #[must_use]
    pub fn inline(template_id: impl Into<String>) -> Self {
        let id = template_id.into();
        Self {
            inline_marker: Some(id.clone()),
            id,
            template_type: INLINE_TEMPLATE_TYPE.to_owned(),
            name: None,
            version: None,
            sections: IndexMap::new(),
            frozen: FrozenRules::default(),
            custom: toml::Table::new(),
            source_path: None,
            inline_only: true,
        }
    }

    /// Parses descriptor text. `path` is used for error reporting and is
    /// recorded as the descriptor's source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the text is not valid TOML, when
    /// `template.id` or `template.type` is missing, or when a regex rule does
    /// not compile.
    pub fn parse(text: &str, path: &Path) -> Result<Self, TemplateError> {
        let raw: RawDescriptor =
            toml::from_str(text).map_err(|error| TemplateError::parse(path, error.to_string()))?;
        let header = raw.template.unwrap_or_default();
        let id = header
            .id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| TemplateError::missing_field(path, "id"))?;
        let template_type = header
            .template_type
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| TemplateError::missing_field(path, "type"))?;

        let mut sections = IndexMap::with_capacity(raw.sections.len());
        for (key, rule) in raw.sections {
            let compiled = compile_rule(path, &key, &rule)?;
            sections.insert(
                key.clone(),
                SectionRule {
                    key,
                    pattern: rule.pattern,
                    pattern_type: rule.pattern_type,
                    kind: rule.kind,
                    split_items: rule.split_items,
                    optional: rule.optional,
                    compiled,
                },
            );
        }

        Ok(Self {
            id,
            template_type,
            name: header.name,
            version: header.version.map(|value| match value {
                toml::Value::String(version) => version,
                other => other.to_string(),
            }),
            sections,
            frozen: FrozenRules {
                paths: raw.frozen.paths,
                patterns: raw.frozen.patterns,
            },
            custom: raw.custom,
            source_path: Some(path.to_path_buf()),
            inline_marker: None,
            inline_only: false,
        })
    }

    /// Reads and parses a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Io`] when the file cannot be read, or any
    /// error from [`TemplateDescriptor::parse`].
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn with_marker(&self, marker: Option<String>) -> Self {
        Self {
            inline_marker: marker,
            ..self.clone()
        }
    }
}

fn compile_rule(path: &Path, key: &str, rule: &RawSection) -> Result<Option<Regex>, TemplateError> {
    match rule.pattern_type {
        PatternType::Literal => Ok(None),
        PatternType::Regex => Regex::new(&rule.pattern)
            .map(Some)
            .map_err(|error| TemplateError::InvalidPattern {
                path: path.to_path_buf(),
                key: key.to_owned(),
                message: error.to_string(),
            }),
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    template: Option<RawHeader>,
    #[serde(default)]
    sections: IndexMap<String, RawSection>,
    #[serde(default)]
    frozen: RawFrozen,
    #[serde(default)]
    custom: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
struct RawHeader {
    id: Option<String>,
    #[serde(rename = "type")]
    template_type: Option<String>,
    name: Option<String>,
    version: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default)]
    pattern: String,
    #[serde(default)]
    pattern_type: PatternType,
    kind: Option<String>,
    #[serde(default)]
    split_items: bool,
    #[serde(default = "default_optional")]
    optional: bool,
}

const fn default_optional() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct RawFrozen {
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

/// Walks upward from the document's directory looking for a descriptor.
#[must_use]
pub fn find_descriptor(document: &Path) -> Option<PathBuf> {
    let parent = document
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let start = std::path::absolute(parent).unwrap_or_else(|_| parent.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join(DESCRIPTOR_FILENAME))
        .find(|candidate| candidate.is_file())
}

/// Finds the template id named by an inline marker in `text`.
///
/// LaTeX is searched in full; Typst only in its first 30 lines. DOCX has no
/// comment syntax and never carries a marker.
#[must_use]
pub fn detect_inline_marker(format: DocumentFormat, text: &str) -> Option<String> {
    patterns::inline_marker(format, text)
}

/// Resolves the descriptor for a document without caching.
///
/// # Errors
///
/// Returns [`TemplateError`] when a descriptor file exists but is invalid.
pub fn detect_template(
    format: DocumentFormat,
    document: &Path,
    text: &str,
) -> Result<Option<TemplateDescriptor>, TemplateError> {
    let marker = detect_inline_marker(format, text);
    match find_descriptor(document) {
        Some(path) => {
            debug!(target: "loom::template", path = %path.display(), "loaded template descriptor");
            let mut descriptor = TemplateDescriptor::load(&path)?;
            descriptor.inline_marker = marker;
            Ok(Some(descriptor))
        }
        None => Ok(marker.map(TemplateDescriptor::inline)),
    }
}

/// Memoizes loaded descriptor files by path.
///
/// The cache is an explicit handle owned by the caller. Descriptors are
/// immutable once loaded and are handed out as [`Arc`]s, so results can be
/// shared across documents processed in parallel.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    loaded: HashMap<PathBuf, Arc<TemplateDescriptor>>,
}

impl DescriptorCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of descriptor files held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Returns whether no descriptor has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Resolves the descriptor for a document, loading each descriptor file
    /// at most once.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a descriptor file exists but is invalid.
    pub fn detect(
        &mut self,
        format: DocumentFormat,
        document: &Path,
        text: &str,
    ) -> Result<Option<Arc<TemplateDescriptor>>, TemplateError> {
        let marker = detect_inline_marker(format, text);
        let Some(path) = find_descriptor(document) else {
            return Ok(marker.map(|id| Arc::new(TemplateDescriptor::inline(id))));
        };
        let base = match self.loaded.get(&path) {
            Some(descriptor) => Arc::clone(descriptor),
            None => {
                debug!(target: "loom::template", path = %path.display(), "loaded template descriptor");
                let descriptor = Arc::new(TemplateDescriptor::load(&path)?);
                self.loaded.insert(path, Arc::clone(&descriptor));
                descriptor
            }
        };
        if base.inline_marker == marker {
            Ok(Some(base))
        } else {
            Ok(Some(Arc::new(base.with_marker(marker))))
        }
    }
}
