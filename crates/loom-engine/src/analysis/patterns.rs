//! Per-format pattern tables used by the analyzer, filter and template
//! marker scan.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::format::DocumentFormat;

#[expect(
    clippy::expect_used,
    reason = "patterns are string literals exercised by the unit tests"
)]
fn constant_regex(pattern: &'static str) -> Regex {
    Regex::new(pattern).expect("constant pattern compiles")
}

static LATEX_SECTION: Lazy<Regex> = Lazy::new(|| {
    constant_regex(
        r"\\(?P<cmd>section\*?|subsection\*?|subsubsection\*?|cvsection|sectionhead)\s*\{\s*(?P<title>[^}]*?)\s*\}",
    )
});
static LATEX_ITEM: Lazy<Regex> =
    Lazy::new(|| constant_regex(r"^\s*\\(?:item|entry|cventry|cvitem)\b"));
static LATEX_COMMAND: Lazy<Regex> = Lazy::new(|| constant_regex(r"\\[A-Za-z]+"));
static LATEX_MARKER: Lazy<Regex> =
    Lazy::new(|| constant_regex(r"%\s*loom-template:\s*(?P<id>[A-Za-z0-9_\-]+)"));

static TYPST_HEADING: Lazy<Regex> = Lazy::new(|| constant_regex(r"^(?P<level>=+)\s+(?P<title>.+)$"));
static TYPST_ITEM: Lazy<Regex> = Lazy::new(|| {
    constant_regex(r"^\s*(?:#(?:edu|work|project|extracurriculars|entry)\(|[-+]\s|\d+\.\s)")
});
static TYPST_MARKER: Lazy<Regex> = Lazy::new(|| {
    constant_regex(r"(?i)(?://|/\*)\s*loom-template:\s*(?P<id>[A-Za-z0-9_\-]+)")
});

static DOCX_ITEM: Lazy<Regex> = Lazy::new(|| constant_regex(r"^\s*[•\-*–]\s*"));

static SEMANTIC_KINDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("education", r"(?i)\beducation\b|\bacademic"),
        ("experience", r"(?i)\bexperience\b|\bemployment\b|\bwork\b"),
        ("projects", r"(?i)\bprojects?\b"),
        ("skills", r"(?i)\bskills?\b|\btechnologies\b|\btools\b"),
        ("publications", r"(?i)\bpublications?\b|\bresearch\b"),
        ("certifications", r"(?i)\bcertifications?\b|\blicenses?\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, constant_regex(pattern)))
    .collect()
});
static LATEX_EXTRA_KINDS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| vec![("heading", constant_regex(r"\\name\{|\\contact"))]);
static TYPST_EXTRA_KINDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![(
        "summary",
        constant_regex(r"(?i)\bsummary\b|\bobjective\b|\bprofile\b"),
    )]
});

/// Lines beginning with these prefixes are never edited in LaTeX.
pub(crate) const LATEX_STRUCTURAL_PREFIXES: &[&str] = &[
    r"\documentclass",
    r"\usepackage",
    r"\newcommand",
    r"\renewcommand",
    r"\begin{",
    r"\end{",
    r"\input{",
    r"\include{",
];

/// Lines beginning with these prefixes open Typst structural statements.
pub(crate) const TYPST_STRUCTURAL_PREFIXES: &[&str] = &["#set", "#show", "#import", "#let", "#include"];

/// How many leading lines of a Typst document are searched for the marker.
pub(crate) const TYPST_MARKER_SCAN_LINES: usize = 30;

/// Document-begin marker splitting the LaTeX preamble from the body.
pub(crate) const LATEX_BEGIN_DOCUMENT: &str = r"\begin{document}";
/// Document-end marker closing the LaTeX body.
pub(crate) const LATEX_END_DOCUMENT: &str = r"\end{document}";

/// A heading recognised by format syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenericHeading {
    pub(crate) title: String,
    pub(crate) level: usize,
}

pub(crate) const fn structural_prefixes(format: DocumentFormat) -> &'static [&'static str] {
    match format {
        DocumentFormat::Latex => LATEX_STRUCTURAL_PREFIXES,
        DocumentFormat::Typst => TYPST_STRUCTURAL_PREFIXES,
        DocumentFormat::Docx => &[],
    }
}

pub(crate) fn is_structural(format: DocumentFormat, text: &str) -> bool {
    let trimmed = text.trim_start();
    structural_prefixes(format)
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Recognises format heading syntax such as `\section{...}` or `== Title`.
pub(crate) fn generic_heading(format: DocumentFormat, text: &str) -> Option<GenericHeading> {
    match format {
        DocumentFormat::Latex => LATEX_SECTION.captures(text).and_then(|caps| {
            let level = match caps.name("cmd")?.as_str().trim_end_matches('*') {
                "subsection" => 2,
                "subsubsection" => 3,
                _ => 1,
            };
            Some(GenericHeading {
                title: caps.name("title")?.as_str().trim().to_owned(),
                level,
            })
        }),
        DocumentFormat::Typst => TYPST_HEADING.captures(text.trim()).and_then(|caps| {
            Some(GenericHeading {
                level: caps.name("level")?.as_str().len(),
                title: caps.name("title")?.as_str().trim().to_owned(),
            })
        }),
        DocumentFormat::Docx => None,
    }
}

pub(crate) fn is_item_line(format: DocumentFormat, text: &str) -> bool {
    match format {
        DocumentFormat::Latex => LATEX_ITEM.is_match(text),
        DocumentFormat::Typst => TYPST_ITEM.is_match(text),
        DocumentFormat::Docx => DOCX_ITEM.is_match(text),
    }
}

/// Classifies `text` against the shared keyword table, then the format's
/// extras.
pub(crate) fn semantic_kind(format: DocumentFormat, text: &str) -> Option<&'static str> {
    let extras: &[(&'static str, Regex)] = match format {
        DocumentFormat::Latex => LATEX_EXTRA_KINDS.as_slice(),
        DocumentFormat::Typst => TYPST_EXTRA_KINDS.as_slice(),
        DocumentFormat::Docx => &[],
    };
    SEMANTIC_KINDS
        .iter()
        .chain(extras)
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(kind, _)| *kind)
}

/// Extracts the set of `\command` tokens present in LaTeX text.
pub(crate) fn latex_commands(text: &str) -> Vec<&str> {
    let mut commands: Vec<&str> = LATEX_COMMAND
        .find_iter(text)
        .map(|found| found.as_str())
        .collect();
    commands.sort_unstable();
    commands.dedup();
    commands
}

/// Finds the template id named by an inline marker comment.
pub(crate) fn inline_marker(format: DocumentFormat, text: &str) -> Option<String> {
    let found = match format {
        DocumentFormat::Latex => LATEX_MARKER.captures(text),
        DocumentFormat::Typst => text
            .lines()
            .take(TYPST_MARKER_SCAN_LINES)
            .find_map(|line| TYPST_MARKER.captures(line)),
        DocumentFormat::Docx => None,
    };
    found
        .and_then(|caps| caps.name("id"))
        .map(|id| id.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r"\section{Experience}", "Experience", 1)]
    #[case(r"\section*{ Skills }", "Skills", 1)]
    #[case(r"\subsection{Side work}", "Side work", 2)]
    #[case(r"\cvsection{Education}", "Education", 1)]
    fn latex_headings_are_recognised(#[case] line: &str, #[case] title: &str, #[case] level: usize) {
        let heading = generic_heading(DocumentFormat::Latex, line).expect("heading");
        assert_eq!(heading.title, title);
        assert_eq!(heading.level, level);
    }

    #[rstest]
    #[case("= Experience", Some(("Experience", 1)))]
    #[case("=== Deep", Some(("Deep", 3)))]
    #[case("=Nope", None)]
    fn typst_headings_are_recognised(#[case] line: &str, #[case] expected: Option<(&str, usize)>) {
        let heading = generic_heading(DocumentFormat::Typst, line);
        assert_eq!(
            heading.as_ref().map(|h| (h.title.as_str(), h.level)),
            expected
        );
    }

    #[rstest]
    #[case(DocumentFormat::Latex, r"\item Built things", true)]
    #[case(DocumentFormat::Latex, r"\itemize", false)]
    #[case(DocumentFormat::Typst, "#work(title: \"Dev\")", true)]
    #[case(DocumentFormat::Typst, "- shipped it", true)]
    #[case(DocumentFormat::Typst, "2. second", true)]
    #[case(DocumentFormat::Typst, "plain prose", false)]
    #[case(DocumentFormat::Docx, "• bullet", true)]
    fn item_lines_match_per_format(
        #[case] format: DocumentFormat,
        #[case] line: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(is_item_line(format, line), expected);
    }

    #[rstest]
    #[case(DocumentFormat::Typst, "Professional Experience", Some("experience"))]
    #[case(DocumentFormat::Typst, "Technical Skills", Some("skills"))]
    #[case(DocumentFormat::Typst, "Summary", Some("summary"))]
    #[case(DocumentFormat::Latex, "Summary", None)]
    #[case(DocumentFormat::Latex, r"\name{Ada}", Some("heading"))]
    #[case(DocumentFormat::Docx, "Hobbies", None)]
    fn semantic_kinds_follow_the_keyword_table(
        #[case] format: DocumentFormat,
        #[case] line: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(semantic_kind(format, line), expected);
    }

    #[test]
    fn typst_marker_is_only_found_near_the_top() {
        let early = "// loom-template: swiss\n= Name";
        assert_eq!(inline_marker(DocumentFormat::Typst, early).as_deref(), Some("swiss"));
        let late = format!("{}/* LOOM-TEMPLATE: late */", "x\n".repeat(40));
        assert_eq!(inline_marker(DocumentFormat::Typst, &late), None);
    }

    #[test]
    fn latex_marker_is_found_anywhere() {
        let text = format!("{}% loom-template: classic-cv\n", "line\n".repeat(80));
        assert_eq!(
            inline_marker(DocumentFormat::Latex, &text).as_deref(),
            Some("classic-cv")
        );
    }

    #[test]
    fn latex_commands_are_deduplicated() {
        assert_eq!(
            latex_commands(r"\textbf{a} \item \textbf{b}"),
            vec![r"\item", r"\textbf"]
        );
    }
}
