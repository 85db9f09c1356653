//! Section analysis for LaTeX, Typst and DOCX line maps.
//!
//! Headings are detected over the body region in three tiers: template
//! rules from the descriptor, then the format's own heading syntax, then the
//! shared keyword table. Keyword matching only promotes lines to headings
//! when neither of the first two tiers found anything; otherwise it is used
//! to classify headings those tiers found. A document with no headings at
//! all gets one fallback section covering the whole body.
//!
//! Sections are ordered by start line and never overlap: each ends on the
//! line before the next heading, and the last ends on the last body line.

mod frozen;
pub(crate) mod patterns;

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

pub use frozen::{
    FrozenRange, count_delimiters, find_frozen_ranges, is_in_frozen_range, strip_string_literals,
    strip_trailing_comment,
};

use crate::format::DocumentFormat;
use crate::lines::LineMap;
use crate::template::{SectionRule, TemplateDescriptor};

/// Confidence assigned to sections matched by a template rule.
pub const TEMPLATE_CONFIDENCE: f64 = 0.88;
/// Confidence assigned to headings found by format syntax or keywords.
pub const GENERIC_CONFIDENCE: f64 = 0.72;
/// Confidence of the synthesized whole-body section.
pub const FALLBACK_CONFIDENCE: f64 = 0.4;

/// Key, kind and heading text of the fallback section.
pub const FALLBACK_KEY: &str = "body";
const FALLBACK_HEADING: &str = "Body";

/// Lines with more words than this are never keyword headings.
const MAX_KEYWORD_HEADING_WORDS: usize = 5;

/// How a section's heading was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionSource {
    /// Matched a descriptor section rule.
    Template,
    /// Matched the format's heading syntax.
    Generic,
    /// Matched the keyword table.
    Semantic,
    /// Synthesized because no heading was found.
    Fallback,
}

/// One detected section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Rule key for template sections; otherwise the kind.
    pub key: String,
    /// Canonical classification, such as `experience`.
    pub kind: String,
    /// Heading text as found in the document.
    pub heading_text: String,
    /// First line of the section (the heading line).
    pub start_line: u32,
    /// Last line of the section.
    pub end_line: u32,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    /// Item lines within the section, ascending.
    pub items: Vec<u32>,
    /// Detection tier.
    pub source: SectionSource,
}

/// Result of analysing one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAnalysis {
    /// Format the analysis ran for.
    pub format: DocumentFormat,
    /// Sections ordered by start line.
    pub sections: Vec<Section>,
    /// Upper-cased section kinds in document order, without repeats.
    pub section_order: Vec<String>,
    /// Human-readable notes gathered during analysis.
    pub notes: Vec<String>,
    /// Id of the descriptor used, if any.
    pub template_id: Option<String>,
    /// Lines before the document-begin marker.
    pub preamble_lines: Vec<u32>,
    /// Lines between the document markers.
    pub body_lines: Vec<u32>,
    /// Frozen structural blocks; only populated for Typst.
    pub frozen_ranges: Vec<FrozenRange>,
}

impl DocumentAnalysis {
    /// Builds the JSON payload handed to the edit generator as context.
    #[must_use]
    pub fn to_payload(&self) -> SectionPayload {
        SectionPayload {
            sections: self
                .sections
                .iter()
                .map(|section| PayloadSection {
                    kind: section.kind.clone(),
                    heading_text: section.heading_text.clone(),
                    start_line: section.start_line,
                    end_line: section.end_line,
                    confidence: section.confidence,
                    items: section.items.clone(),
                })
                .collect(),
            section_order: self.section_order.clone(),
            notes: self.notes.clone(),
            template_id: self.template_id.clone(),
        }
    }
}

/// Serializable section summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionPayload {
    /// One entry per section.
    pub sections: Vec<PayloadSection>,
    /// Upper-cased kinds in document order.
    pub section_order: Vec<String>,
    /// Analysis notes.
    pub notes: Vec<String>,
    /// Descriptor id, omitted when no descriptor applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

/// One section in a [`SectionPayload`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadSection {
    /// Section kind.
    pub kind: String,
    /// Heading text.
    pub heading_text: String,
    /// First line.
    pub start_line: u32,
    /// Last line.
    pub end_line: u32,
    /// Detection confidence.
    pub confidence: f64,
    /// Item lines, omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<u32>,
}

#[derive(Debug)]
struct Heading {
    line: u32,
    key: String,
    kind: String,
    text: String,
    confidence: f64,
    source: SectionSource,
    split_items: bool,
}

/// Splits line numbers into preamble and body.
///
/// The body starts at the first line containing `\begin{document}` and stops
/// before the line containing `\end{document}`. Without markers, every line
/// is body.
#[must_use]
pub fn split_regions(format: DocumentFormat, lines: &LineMap) -> (Vec<u32>, Vec<u32>) {
    let all: Vec<u32> = lines.keys().collect();
    if format != DocumentFormat::Latex {
        return (Vec::new(), all);
    }
    let begin = lines
        .iter()
        .find(|(_, text)| text.contains(patterns::LATEX_BEGIN_DOCUMENT))
        .map(|(line, _)| line);
    let end = lines
        .iter()
        .find(|(line, text)| {
            begin.is_none_or(|start| *line > start) && text.contains(patterns::LATEX_END_DOCUMENT)
        })
        .map(|(line, _)| line);
    let preamble = begin.map_or_else(Vec::new, |start| {
        all.iter().copied().filter(|line| *line < start).collect()
    });
    let body = all
        .into_iter()
        .filter(|line| begin.is_none_or(|start| *line >= start))
        .filter(|line| end.is_none_or(|stop| *line < stop))
        .collect();
    (preamble, body)
}

/// Detects sections in `lines`.
#[must_use]
pub fn analyze(
    format: DocumentFormat,
    lines: &LineMap,
    descriptor: Option<&TemplateDescriptor>,
) -> DocumentAnalysis {
    let (preamble_lines, body_lines) = split_regions(format, lines);
    let rules: Vec<&SectionRule> = descriptor
        .map(|template| template.sections.values().collect())
        .unwrap_or_default();
    let generic_mode = rules.is_empty();

    let mut notes = Vec::new();
    let mut headings = detect_headings(format, lines, &body_lines, &rules, generic_mode);

    if let Some(template) = descriptor {
        let found: HashSet<&str> = headings
            .iter()
            .filter(|heading| heading.source == SectionSource::Template)
            .map(|heading| heading.key.as_str())
            .collect();
        notes.extend(
            rules
                .iter()
                .filter(|rule| !rule.optional && !found.contains(rule.key.as_str()))
                .map(|rule| {
                    format!(
                        "Missing required section '{}' for template {}",
                        rule.key, template.id
                    )
                }),
        );
    }

    if headings.is_empty() {
        if let Some(first) = body_lines.first() {
            headings.push(Heading {
                line: *first,
                key: FALLBACK_KEY.to_owned(),
                kind: FALLBACK_KEY.to_owned(),
                text: FALLBACK_HEADING.to_owned(),
                confidence: FALLBACK_CONFIDENCE,
                source: SectionSource::Fallback,
                split_items: generic_mode,
            });
        }
    }

    let sections = build_sections(format, lines, &body_lines, headings);
    let mut seen = HashSet::new();
    let section_order = sections
        .iter()
        .map(|section| section.kind.to_uppercase())
        .filter(|kind| seen.insert(kind.clone()))
        .collect();

    let frozen_ranges = if format == DocumentFormat::Typst {
        let ranges = find_frozen_ranges(lines);
        if !ranges.is_empty() {
            notes.push(format!("Found {} frozen structural block(s)", ranges.len()));
        }
        ranges
    } else {
        Vec::new()
    };

    debug!(
        target: "loom::analysis",
        format = %format,
        sections = sections.len(),
        notes = notes.len(),
        "analysed document"
    );

    DocumentAnalysis {
        format,
        sections,
        section_order,
        notes,
        template_id: descriptor.map(|template| template.id.clone()),
        preamble_lines,
        body_lines,
        frozen_ranges,
    }
}

fn detect_headings(
    format: DocumentFormat,
    lines: &LineMap,
    body: &[u32],
    rules: &[&SectionRule],
    generic_mode: bool,
) -> Vec<Heading> {
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut headings = Vec::new();
    for line in body {
        let Some(text) = lines.get(*line) else {
            continue;
        };
        if let Some((rule, matched)) = rules.iter().find_map(|rule| {
            if claimed.contains(rule.key.as_str()) {
                return None;
            }
            rule.find_in(text).map(|matched| (*rule, matched))
        }) {
            claimed.insert(rule.key.as_str());
            headings.push(Heading {
                line: *line,
                key: rule.key.clone(),
                kind: rule.section_kind().to_owned(),
                text: matched.to_owned(),
                confidence: TEMPLATE_CONFIDENCE,
                source: SectionSource::Template,
                split_items: rule.split_items,
            });
        } else if let Some(heading) = patterns::generic_heading(format, text) {
            let kind = patterns::semantic_kind(format, &heading.title)
                .map_or_else(|| normalise_kind(&heading.title), str::to_owned);
            headings.push(Heading {
                line: *line,
                key: kind.clone(),
                kind,
                text: heading.title,
                confidence: GENERIC_CONFIDENCE,
                source: SectionSource::Generic,
                split_items: generic_mode,
            });
        } else if format == DocumentFormat::Latex
            && let Some(heading) = keyword_heading(format, *line, text, generic_mode)
        {
            headings.push(heading);
        }
    }
    if headings.is_empty() {
        headings = body
            .iter()
            .filter_map(|line| {
                let text = lines.get(*line)?;
                keyword_heading(format, *line, text, generic_mode)
            })
            .collect();
    }
    headings
}

// LaTeX checks every plain line against the keyword table; other formats
// only fall back to it when no syntactic heading exists.
fn keyword_heading(
    format: DocumentFormat,
    line: u32,
    text: &str,
    generic_mode: bool,
) -> Option<Heading> {
    if !is_heading_shaped(format, text) {
        return None;
    }
    let kind = patterns::semantic_kind(format, text)?;
    Some(Heading {
        line,
        key: kind.to_owned(),
        kind: kind.to_owned(),
        text: text.trim().to_owned(),
        confidence: GENERIC_CONFIDENCE,
        source: SectionSource::Semantic,
        split_items: generic_mode,
    })
}

fn is_heading_shaped(format: DocumentFormat, text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('%')
        || trimmed.starts_with("//")
        || trimmed.ends_with(['.', ',', ';'])
    {
        return false;
    }
    let colon_inside = trimmed
        .find(':')
        .is_some_and(|index| index + 1 < trimmed.len());
    !colon_inside
        && trimmed.split_whitespace().count() <= MAX_KEYWORD_HEADING_WORDS
        && !patterns::is_item_line(format, trimmed)
        && !patterns::is_structural(format, trimmed)
}

fn normalise_kind(title: &str) -> String {
    let words: Vec<String> = title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        FALLBACK_KEY.to_owned()
    } else {
        words.join("_")
    }
}

fn build_sections(
    format: DocumentFormat,
    lines: &LineMap,
    body: &[u32],
    mut headings: Vec<Heading>,
) -> Vec<Section> {
    headings.sort_by_key(|heading| heading.line);
    let last_body = body.last().copied();
    let starts: Vec<u32> = headings.iter().map(|heading| heading.line).collect();

    headings
        .into_iter()
        .enumerate()
        .map(|(index, heading)| {
            let end_line = starts
                .get(index + 1)
                .and_then(|next| lines.preceding_line(*next))
                .or(last_body)
                .unwrap_or(heading.line)
                .max(heading.line);
            let items = if heading.split_items {
                collect_items(format, lines, heading.line, end_line, heading.source)
            } else {
                Vec::new()
            };
            Section {
                key: heading.key,
                kind: heading.kind,
                heading_text: heading.text,
                start_line: heading.line,
                end_line,
                confidence: heading.confidence,
                items,
                source: heading.source,
            }
        })
        .collect()
}

fn collect_items(
    format: DocumentFormat,
    lines: &LineMap,
    start: u32,
    end: u32,
    source: SectionSource,
) -> Vec<u32> {
    // The fallback section's first line is content, not a heading.
    let first = if source == SectionSource::Fallback {
        start
    } else {
        start.saturating_add(1)
    };
    if first > end {
        return Vec::new();
    }
    lines
        .range(first, end)
        .filter(|(_, text)| patterns::is_item_line(format, text))
        .map(|(line, _)| line)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn map(entries: &[&str]) -> LineMap {
        entries
            .iter()
            .zip(1_u32..)
            .map(|(text, line)| (line, (*text).to_owned()))
            .collect()
    }

    #[test]
    fn heading_free_document_gets_one_fallback_section() {
        let lines = map(&["Ada Lovelace", "London", "Analytical engines"]);
        let analysis = analyze(DocumentFormat::Typst, &lines, None);
        assert_eq!(analysis.sections.len(), 1);
        let section = analysis.sections.first().expect("section");
        assert_eq!(section.source, SectionSource::Fallback);
        assert_eq!(section.confidence.to_bits(), FALLBACK_CONFIDENCE.to_bits());
        assert_eq!((section.start_line, section.end_line), (1, 3));
    }

    #[test]
    fn latex_regions_exclude_preamble_and_end_marker() {
        let lines = map(&[
            r"\documentclass{article}",
            r"\begin{document}",
            r"\section{Experience}",
            r"\item Built a compiler",
            r"\section{Education}",
            "BSc Mathematics",
            r"\end{document}",
        ]);
        let analysis = analyze(DocumentFormat::Latex, &lines, None);
        assert_eq!(analysis.preamble_lines, vec![1]);
        assert_eq!(analysis.body_lines, vec![2, 3, 4, 5, 6]);
        let spans: Vec<_> = analysis
            .sections
            .iter()
            .map(|s| (s.kind.as_str(), s.start_line, s.end_line))
            .collect();
        assert_eq!(spans, vec![("experience", 3, 4), ("education", 5, 6)]);
        assert_eq!(analysis.section_order, vec!["EXPERIENCE", "EDUCATION"]);
        let experience = analysis.sections.first().expect("experience");
        assert_eq!(experience.items, vec![4]);
    }

    #[test]
    fn template_rules_take_priority_and_report_missing_sections() {
        let descriptor = TemplateDescriptor::parse(
            "[template]\nid = \"t\"\ntype = \"resume\"\n\
             [sections.work]\npattern = \"Where I worked\"\nkind = \"experience\"\n\
             [sections.awards]\npattern = \"Awards\"\noptional = false\n",
            Path::new("loom-template.toml"),
        )
        .expect("descriptor");
        let lines = map(&["= Where I worked", "- Shipped", "= Skills", "Rust"]);
        let analysis = analyze(DocumentFormat::Typst, &lines, Some(&descriptor));
        let first = analysis.sections.first().expect("template section");
        assert_eq!(first.source, SectionSource::Template);
        assert_eq!(first.kind, "experience");
        assert_eq!(first.heading_text, "Where I worked");
        assert!(first.items.is_empty(), "split_items defaults to false");
        let second = analysis.sections.get(1).expect("generic section");
        assert_eq!(second.source, SectionSource::Generic);
        assert_eq!(second.kind, "skills");
        assert!(
            analysis
                .notes
                .iter()
                .any(|note| note.contains("Missing required section 'awards'"))
        );
        assert_eq!(analysis.template_id.as_deref(), Some("t"));
    }

    #[test]
    fn keyword_headings_are_used_when_no_syntax_headings_exist() {
        let lines = map(&["Ada Lovelace", "Experience", "• Built engines", "Skills", "Mathematics"]);
        let analysis = analyze(DocumentFormat::Docx, &lines, None);
        let kinds: Vec<_> = analysis.sections.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["experience", "skills"]);
        let experience = analysis.sections.first().expect("experience");
        assert_eq!(experience.source, SectionSource::Semantic);
        assert_eq!(experience.items, vec![3]);
        assert_eq!(experience.end_line, 3);
    }

    #[test]
    fn latex_keyword_lines_split_sections_next_to_section_commands() {
        let lines = map(&[
            r"\begin{document}",
            r"\section{Experience}",
            "Built engines",
            "Skills",
            "Rust",
            r"\end{document}",
        ]);
        let analysis = analyze(DocumentFormat::Latex, &lines, None);
        let spans: Vec<_> = analysis
            .sections
            .iter()
            .map(|s| (s.kind.as_str(), s.source, s.start_line, s.end_line))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("experience", SectionSource::Generic, 2, 3),
                ("skills", SectionSource::Semantic, 4, 5),
            ]
        );
    }

    #[test]
    fn blank_template_rules_leave_headings_to_other_tiers() {
        let descriptor = TemplateDescriptor::parse(
            "[template]\nid = \"t\"\ntype = \"resume\"\n[sections.blank]\npattern = \"\"\n",
            Path::new("loom-template.toml"),
        )
        .expect("descriptor");
        let lines = map(&["= Experience", "- Shipped"]);
        let analysis = analyze(DocumentFormat::Typst, &lines, Some(&descriptor));
        let sections: Vec<_> = analysis
            .sections
            .iter()
            .map(|s| (s.kind.as_str(), s.source, s.heading_text.as_str()))
            .collect();
        assert_eq!(
            sections,
            vec![("experience", SectionSource::Generic, "Experience")]
        );
    }

    #[test]
    fn long_lines_mentioning_keywords_are_not_headings() {
        let lines = map(&["I have experience with many tools and languages", "More prose"]);
        let analysis = analyze(DocumentFormat::Docx, &lines, None);
        assert_eq!(
            analysis.sections.first().map(|s| s.source),
            Some(SectionSource::Fallback)
        );
    }

    #[test]
    fn typst_analysis_reports_frozen_blocks() {
        let lines = map(&["#set page(", "margin: 1in,", ")", "= Experience", "- Did it"]);
        let analysis = analyze(DocumentFormat::Typst, &lines, None);
        assert_eq!(analysis.frozen_ranges, vec![FrozenRange::new(1, 3)]);
        assert!(
            analysis
                .notes
                .contains(&"Found 1 frozen structural block(s)".to_owned())
        );
    }

    #[test]
    fn payload_omits_empty_items_and_template_id() {
        let lines = map(&["= Education", "MIT"]);
        let payload = analyze(DocumentFormat::Typst, &lines, None).to_payload();
        let json = serde_json::to_value(&payload).expect("serialise");
        assert!(json.get("template_id").is_none());
        let first = json
            .get("sections")
            .and_then(|s| s.get(0))
            .expect("section");
        assert!(first.get("items").is_none());
        assert_eq!(first.get("kind").and_then(|k| k.as_str()), Some("education"));
    }
}
