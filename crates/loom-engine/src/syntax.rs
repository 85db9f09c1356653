//! Delimiter balance checks for LaTeX and Typst sources.
//!
//! Both readers refuse input that fails these checks, and the output
//! validator runs them again on edited text before it is written.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::format::DocumentFormat;

/// Location and description of the first balance problem in a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    /// One-based line number.
    pub line: u32,
    /// One-based column number, counted in characters.
    pub column: u32,
    /// Human-readable description.
    pub message: String,
}

impl SyntaxIssue {
    fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            line: position.line,
            column: position.column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    line: u32,
    column: u32,
}

/// Character cursor that tracks line and column.
struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    position: Position,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            position: Position { line: 1, column: 0 },
        }
    }

    /// Advances one character, returning it with its position.
    fn next_char(&mut self) -> Option<(char, Position)> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            let at = self.position;
            self.position.line = self.position.line.saturating_add(1);
            self.position.column = 0;
            return Some((ch, at));
        }
        self.position.column = self.position.column.saturating_add(1);
        Some((ch, self.position))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_to_line_end(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.next_char();
        }
    }
}

/// Checks that unescaped braces balance in LaTeX source.
///
/// Escaped braces (`\{`, `\}`) are ignored, as is everything after an
/// unescaped `%` on a line.
///
/// # Errors
///
/// Returns the first closing brace without a matching opener, or the last
/// unclosed opener when the text ends with a positive balance.
pub fn check_latex_balance(text: &str) -> Result<(), SyntaxIssue> {
    let mut cursor = Cursor::new(text);
    let mut open = Vec::new();
    while let Some((ch, position)) = cursor.next_char() {
        match ch {
            '\\' => {
                if cursor.peek().is_some_and(|next| next != '\n') {
                    cursor.next_char();
                }
            }
            '%' => cursor.skip_to_line_end(),
            '{' => open.push(position),
            '}' => {
                if open.pop().is_none() {
                    return Err(SyntaxIssue::new(position, "unmatched closing brace '}'"));
                }
            }
            _ => {}
        }
    }
    open.pop().map_or(Ok(()), |position| {
        Err(SyntaxIssue::new(position, "unclosed brace '{'"))
    })
}

#[derive(Debug, Clone, Copy)]
enum Delimiter {
    Paren,
    Bracket,
    Brace,
}

impl Delimiter {
    const fn opening(self) -> char {
        match self {
            Self::Paren => '(',
            Self::Bracket => '[',
            Self::Brace => '{',
        }
    }

    const fn closing(self) -> char {
        match self {
            Self::Paren => ')',
            Self::Bracket => ']',
            Self::Brace => '}',
        }
    }

    const fn classify(ch: char) -> Option<(Self, bool)> {
        match ch {
            '(' => Some((Self::Paren, true)),
            ')' => Some((Self::Paren, false)),
            '[' => Some((Self::Bracket, true)),
            ']' => Some((Self::Bracket, false)),
            '{' => Some((Self::Brace, true)),
            '}' => Some((Self::Brace, false)),
            _ => None,
        }
    }
}

#[derive(Default)]
struct DelimiterStacks {
    paren: Vec<Position>,
    bracket: Vec<Position>,
    brace: Vec<Position>,
}

impl DelimiterStacks {
    fn stack(&mut self, delimiter: Delimiter) -> &mut Vec<Position> {
        match delimiter {
            Delimiter::Paren => &mut self.paren,
            Delimiter::Bracket => &mut self.bracket,
            Delimiter::Brace => &mut self.brace,
        }
    }

    fn first_unclosed(&self) -> Option<(Delimiter, Position)> {
        [
            (Delimiter::Paren, self.paren.last()),
            (Delimiter::Bracket, self.bracket.last()),
            (Delimiter::Brace, self.brace.last()),
        ]
        .into_iter()
        .filter_map(|(delimiter, position)| position.map(|pos| (delimiter, *pos)))
        .min_by_key(|(_, position)| (position.line, position.column))
    }
}

/// Checks parenthesis, bracket and brace balance in Typst source.
///
/// Each delimiter kind is counted independently. String literals, line
/// comments and block comments are skipped.
///
/// # Errors
///
/// Returns the first closer that drives its count negative, an unterminated
/// string or block comment, or the earliest unclosed opener.
pub fn check_typst_balance(text: &str) -> Result<(), SyntaxIssue> {
    let mut cursor = Cursor::new(text);
    let mut stacks = DelimiterStacks::default();
    while let Some((ch, position)) = cursor.next_char() {
        match ch {
            '/' if cursor.peek() == Some('/') => cursor.skip_to_line_end(),
            '/' if cursor.peek() == Some('*') => {
                cursor.next_char();
                skip_block_comment(&mut cursor, position)?;
            }
            '"' => skip_string(&mut cursor, position)?,
            _ => {
                if let Some((delimiter, opens)) = Delimiter::classify(ch) {
                    if opens {
                        stacks.stack(delimiter).push(position);
                    } else if stacks.stack(delimiter).pop().is_none() {
                        return Err(SyntaxIssue::new(
                            position,
                            format!("unmatched closing '{}'", delimiter.closing()),
                        ));
                    }
                }
            }
        }
    }
    stacks.first_unclosed().map_or(Ok(()), |(delimiter, position)| {
        Err(SyntaxIssue::new(
            position,
            format!("unclosed '{}'", delimiter.opening()),
        ))
    })
}

fn skip_block_comment(cursor: &mut Cursor<'_>, start: Position) -> Result<(), SyntaxIssue> {
    while let Some((ch, _)) = cursor.next_char() {
        if ch == '*' && cursor.peek() == Some('/') {
            cursor.next_char();
            return Ok(());
        }
    }
    Err(SyntaxIssue::new(start, "unterminated block comment"))
}

fn skip_string(cursor: &mut Cursor<'_>, start: Position) -> Result<(), SyntaxIssue> {
    while let Some((ch, _)) = cursor.next_char() {
        match ch {
            '\\' => {
                cursor.next_char();
            }
            '"' => return Ok(()),
            _ => {}
        }
    }
    Err(SyntaxIssue::new(start, "unterminated string literal"))
}

/// Runs the output checks for `format` over rendered document text.
///
/// For LaTeX, `require_document_markers` additionally demands both
/// `\begin{document}` and `\end{document}`; callers pass `true` when the
/// original document had them. DOCX output has no textual syntax to check.
#[must_use]
pub fn validate_output(
    format: DocumentFormat,
    text: &str,
    require_document_markers: bool,
) -> Vec<String> {
    let mut findings = Vec::new();
    match format {
        DocumentFormat::Latex => {
            if let Err(issue) = check_latex_balance(text) {
                findings.push(format!("LaTeX balance check failed at {issue}"));
            }
            if require_document_markers {
                for marker in [r"\begin{document}", r"\end{document}"] {
                    if !text.contains(marker) {
                        findings.push(format!("LaTeX output is missing {marker}"));
                    }
                }
            }
        }
        DocumentFormat::Typst => {
            if let Err(issue) = check_typst_balance(text) {
                findings.push(format!("Typst balance check failed at {issue}"));
            }
        }
        DocumentFormat::Docx => {}
    }
    findings
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("\\section{Skills}\n\\textbf{Rust}")]
    #[case("100\\% done \\{literal\\}")]
    #[case("% a comment with { an open brace\n\\item ok")]
    fn balanced_latex_passes(#[case] source: &str) {
        assert!(check_latex_balance(source).is_ok());
    }

    #[test]
    fn latex_reports_stray_closer_location() {
        let issue = check_latex_balance("ok\nbad}").expect_err("stray closer");
        assert_eq!((issue.line, issue.column), (2, 4));
    }

    #[test]
    fn latex_reports_unclosed_opener_location() {
        let issue = check_latex_balance("\\textbf{open\nmore").expect_err("unclosed");
        assert_eq!((issue.line, issue.column), (1, 8));
        assert!(issue.message.contains("unclosed"));
    }

    #[rstest]
    #[case("#set page(margin: 1in)\n= Heading")]
    #[case("#let s = \"a ) string\"")]
    #[case("// comment (\n#work(title: [x])")]
    #[case("/* block ( comment */ text")]
    fn balanced_typst_passes(#[case] source: &str) {
        assert!(check_typst_balance(source).is_ok());
    }

    #[rstest]
    #[case("#set page(\nmargin: 1in,", 1, 10)]
    #[case("text ]", 1, 6)]
    #[case("#let s = \"open", 1, 10)]
    #[case("/* never closed", 1, 1)]
    fn unbalanced_typst_reports_location(
        #[case] source: &str,
        #[case] line: u32,
        #[case] column: u32,
    ) {
        let issue = check_typst_balance(source).expect_err("should fail");
        assert_eq!((issue.line, issue.column), (line, column));
    }

    #[test]
    fn latex_output_requires_markers_when_asked() {
        let findings = validate_output(DocumentFormat::Latex, "\\section{A}", true);
        assert_eq!(findings.len(), 2);
        assert!(validate_output(DocumentFormat::Latex, "\\section{A}", false).is_empty());
    }
}
