//! DOCX packages as line maps.
//!
//! A [`DocxDocument`] keeps the original package bytes and an arena of body
//! paragraphs parsed from `word/document.xml`. Each non-empty top-level
//! paragraph becomes one line; [`ParagraphMap`] maps those line numbers back
//! to [`ParagraphId`] handles so edits can be applied without losing run and
//! paragraph formatting. Saving re-zips every original entry and only
//! re-serializes the main document part.

mod xml;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use self::xml::{BodyItem, OwnedEvent, ParagraphXml, RawBlock};
use crate::apply::LineSink;
use crate::error::DocumentError;
use crate::lines::LineMap;

/// Archive entry holding the main document part.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Handle to a paragraph in a [`DocxDocument`]'s arena.
///
/// Handles are only meaningful for the document that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParagraphId(usize);

/// Line number to paragraph handle, for the lines a document produced.
pub type ParagraphMap = BTreeMap<u32, ParagraphId>;

/// How edited lines are written back into a DOCX package.
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
pub enum DocxApplyMode {
    /// Edit paragraphs in place, keeping run and paragraph formatting.
    #[default]
    InPlace,
    /// Rebuild the body in target order, reusing formatting by line number.
    Rebuild,
}

#[derive(Debug, Clone)]
enum Node {
    Paragraph(ParagraphId),
    Other(Vec<OwnedEvent>),
}

/// A parsed DOCX package.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: Vec<u8>,
    head: Vec<OwnedEvent>,
    paragraphs: Vec<ParagraphXml>,
    order: Vec<Node>,
    removed: BTreeSet<ParagraphId>,
    tail: Vec<OwnedEvent>,
}

impl DocxDocument {
    /// Reads and parses the package at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] when the file cannot be read and
    /// [`DocumentError::Docx`] when it is not a valid package.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let package = fs::read(path).map_err(|source| DocumentError::io(path, source))?;
        Self::from_package(package, path)
    }

    /// Parses package bytes. `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Docx`] when the archive is corrupt, lacks
    /// `word/document.xml`, or the part is not well-formed XML.
    pub fn from_package(package: Vec<u8>, path: &Path) -> Result<Self, DocumentError> {
        let xml = read_document_part(&package)
            .map_err(|message| DocumentError::docx(path, message))?;
        let body = xml::parse_body(&xml).map_err(|message| DocumentError::docx(path, message))?;

        let mut paragraphs = Vec::new();
        let mut order = Vec::with_capacity(body.blocks.len());
        for block in body.blocks {
            match block {
                RawBlock::Paragraph(paragraph) => {
                    order.push(Node::Paragraph(ParagraphId(paragraphs.len())));
                    paragraphs.push(paragraph);
                }
                RawBlock::Other(events) => order.push(Node::Other(events)),
            }
        }
        debug!(
            target: "loom::reader",
            path = %path.display(),
            paragraphs = paragraphs.len(),
            "parsed docx package"
        );
        Ok(Self {
            package,
            head: body.head,
            paragraphs,
            order,
            removed: BTreeSet::new(),
            tail: body.tail,
        })
    }

    /// Numbers the non-empty top-level paragraphs from 1.
    #[must_use]
    pub fn lines(&self) -> (LineMap, ParagraphMap) {
        let mut lines = LineMap::new();
        let mut map = ParagraphMap::new();
        let live = self.live_paragraphs().filter_map(|id| {
            let text = self.paragraph_text(id)?;
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| (id, trimmed.to_owned()))
        });
        for ((id, text), line) in live.zip(1_u32..) {
            lines.insert(line, text);
            map.insert(line, id);
        }
        (lines, map)
    }

    /// Returns the visible text of a paragraph.
    #[must_use]
    pub fn paragraph_text(&self, id: ParagraphId) -> Option<String> {
        self.paragraphs.get(id.0).map(ParagraphXml::text)
    }

    /// Serializes the package, replacing only the main document part.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the archive cannot be
    /// re-read or written.
    pub fn to_package(&self) -> Result<Vec<u8>, String> {
        let document = xml::serialize(&self.head, self.body_items(), &self.tail)?;
        let mut archive =
            ZipArchive::new(Cursor::new(self.package.as_slice())).map_err(|error| error.to_string())?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|error| error.to_string())?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                writer
                    .start_file(DOCUMENT_PART, SimpleFileOptions::default())
                    .map_err(|error| error.to_string())?;
                writer.write_all(&document).map_err(|error| error.to_string())?;
            } else {
                writer.raw_copy_file(entry).map_err(|error| error.to_string())?;
            }
        }
        let cursor = writer.finish().map_err(|error| error.to_string())?;
        Ok(cursor.into_inner())
    }

    /// Writes the package to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let bytes = self
            .to_package()
            .map_err(|message| DocumentError::docx(path, message))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| DocumentError::io(parent, source))?;
        }
        fs::write(path, bytes).map_err(|source| DocumentError::io(path, source))?;
        debug!(target: "loom::apply", path = %path.display(), "saved docx package");
        Ok(())
    }

    /// Rebuilds the body so its paragraphs follow `target` in order.
    ///
    /// Lines whose number has a paragraph in `paragraphs` reuse that
    /// paragraph's properties and first-run formatting; other lines are new
    /// unformatted paragraphs. Non-paragraph blocks keep their position
    /// relative to the original lines, and blocks after the last paragraph
    /// (such as the final `w:sectPr`) stay at the end.
    pub fn rebuild(&mut self, target: &LineMap, paragraphs: &ParagraphMap) {
        let line_of: HashMap<ParagraphId, u32> =
            paragraphs.iter().map(|(line, id)| (*id, *line)).collect();
        let last_paragraph = self
            .order
            .iter()
            .rposition(|node| matches!(node, Node::Paragraph(_)));

        let mut anchored = Vec::new();
        let mut trailing = Vec::new();
        let mut current_line = 0_u32;
        for (index, node) in std::mem::take(&mut self.order).into_iter().enumerate() {
            match node {
                Node::Paragraph(id) => {
                    if let Some(line) = line_of.get(&id) {
                        current_line = *line;
                    }
                }
                Node::Other(events) if xml::is_whitespace(&events) => {}
                Node::Other(events) => {
                    if last_paragraph.is_none_or(|last| index > last) {
                        trailing.push(Node::Other(events));
                    } else {
                        anchored.push((current_line, Node::Other(events)));
                    }
                }
            }
        }

        let mut order = Vec::new();
        let mut pending = anchored.into_iter().peekable();
        for (line, text) in target.iter() {
            while let Some((_, node)) = pending.next_if(|(anchor, _)| *anchor < line) {
                order.push(node);
            }
            let paragraph = paragraphs
                .get(&line)
                .and_then(|id| self.paragraphs.get(id.0))
                .map_or_else(|| ParagraphXml::new(text, None, None), |original| original.with_text(text));
            order.push(Node::Paragraph(self.push_paragraph(paragraph)));
        }
        order.extend(pending.map(|(_, node)| node));
        order.extend(trailing);
        self.order = order;
        self.removed.clear();
        debug!(target: "loom::apply", lines = target.len(), "rebuilt docx body");
    }

    fn live_paragraphs(&self) -> impl Iterator<Item = ParagraphId> + '_ {
        self.order.iter().filter_map(|node| match node {
            Node::Paragraph(id) if !self.removed.contains(id) => Some(*id),
            _ => None,
        })
    }

    fn body_items(&self) -> impl Iterator<Item = BodyItem<'_>> + '_ {
        self.order.iter().filter_map(|node| match node {
            Node::Paragraph(id) if self.removed.contains(id) => None,
            Node::Paragraph(id) => self.paragraphs.get(id.0).map(BodyItem::Paragraph),
            Node::Other(events) => Some(BodyItem::Other(events)),
        })
    }

    fn push_paragraph(&mut self, paragraph: ParagraphXml) -> ParagraphId {
        let id = ParagraphId(self.paragraphs.len());
        self.paragraphs.push(paragraph);
        id
    }

    fn position_of(&self, id: ParagraphId) -> Option<usize> {
        self.order
            .iter()
            .position(|node| matches!(node, Node::Paragraph(candidate) if *candidate == id))
    }

    fn remove_paragraph(&mut self, id: ParagraphId) -> bool {
        self.position_of(id).is_some() && self.removed.insert(id)
    }

    fn set_paragraph_text(&mut self, id: ParagraphId, text: &str) -> bool {
        let Some(paragraph) = self.paragraphs.get_mut(id.0) else {
            return false;
        };
        let run_properties = paragraph.first_run_properties();
        paragraph.set_text(text, run_properties.as_deref());
        true
    }

    /// Inserts a paragraph after `anchor` carrying the anchor's paragraph
    /// properties. Removed anchors still mark their original position.
    fn insert_paragraph_after(&mut self, anchor: ParagraphId, text: &str) -> bool {
        let (Some(position), Some(reference)) = (self.position_of(anchor), self.paragraphs.get(anchor.0))
        else {
            return false;
        };
        let paragraph = ParagraphXml::new(text, reference.properties(), None);
        let id = self.push_paragraph(paragraph);
        self.order.insert(position + 1, Node::Paragraph(id));
        true
    }

    fn prepend_paragraph(&mut self, text: &str) {
        let id = self.push_paragraph(ParagraphXml::new(text, None, None));
        self.order.insert(0, Node::Paragraph(id));
    }
}

fn read_document_part(package: &[u8]) -> Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(package)).map_err(|error| error.to_string())?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| format!("package has no {DOCUMENT_PART}"))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(|error| error.to_string())?;
    Ok(xml)
}

/// Reads a DOCX package, returning its lines, the parsed document and the
/// line-to-paragraph map.
///
/// # Errors
///
/// Returns [`DocumentError`] when the package cannot be read or parsed.
pub fn read_docx(path: &Path) -> Result<(LineMap, DocxDocument, ParagraphMap), DocumentError> {
    let document = DocxDocument::open(path)?;
    let (lines, paragraphs) = document.lines();
    Ok((lines, document, paragraphs))
}

/// Applies line edits to a [`DocxDocument`] in place.
#[derive(Debug)]
pub struct DocxEditor<'a> {
    document: &'a mut DocxDocument,
    paragraphs: &'a ParagraphMap,
}

impl<'a> DocxEditor<'a> {
    /// Creates an editor addressing `document` through `paragraphs`.
    #[must_use]
    pub const fn new(document: &'a mut DocxDocument, paragraphs: &'a ParagraphMap) -> Self {
        Self {
            document,
            paragraphs,
        }
    }

    fn paragraph(&self, line: u32) -> Result<ParagraphId, DocumentError> {
        self.paragraphs
            .get(&line)
            .copied()
            .ok_or_else(|| DocumentError::unsupported(format!("line {line} has no paragraph")))
    }
}

impl LineSink for DocxEditor<'_> {
    fn delete_line(&mut self, line: u32) -> Result<(), DocumentError> {
        let id = self.paragraph(line)?;
        if !self.document.remove_paragraph(id) {
            warn!(target: "loom::apply", line, "paragraph already removed");
        }
        Ok(())
    }

    fn modify_line(&mut self, line: u32, text: &str) -> Result<(), DocumentError> {
        let id = self.paragraph(line)?;
        if !self.document.set_paragraph_text(id, text) {
            warn!(target: "loom::apply", line, "paragraph missing for modification");
        }
        Ok(())
    }

    fn insert_after(&mut self, anchor: u32, text: &str) -> Result<(), DocumentError> {
        let id = self.paragraph(anchor)?;
        if !self.document.insert_paragraph_after(id, text) {
            warn!(target: "loom::apply", anchor, "anchor paragraph missing; skipped insertion");
        }
        Ok(())
    }

    fn prepend(&mut self, text: &str) -> Result<(), DocumentError> {
        self.document.prepend_paragraph(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
