//! Tests for DOCX reading, in-place editing and rebuilding.

use std::io::{Cursor, Read, Write};

use rstest::{fixture, rstest};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::*;
use crate::apply::{apply_plan, plan_edits};
use crate::edits::{EditBatch, EditOperation, build_target};

const CONTENT_TYPES: &str = "<?xml version=\"1.0\"?><Types/>";

const BODY: &str = concat!(
    "<w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr>",
    "<w:r><w:rPr><w:b/></w:rPr><w:t>Experience</w:t></w:r></w:p>",
    "<w:p/>",
    "<w:p><w:r><w:t xml:space=\"preserve\">Built R&amp;D </w:t></w:r>",
    "<w:r><w:tab/><w:t>tools</w:t></w:r></w:p>",
    "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
    "<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>Skills</w:t></w:r></w:p>",
    "<w:sectPr/>",
);

fn package(body: &str) -> Vec<u8> {
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("[Content_Types].xml", SimpleFileOptions::default())
        .expect("start content types");
    writer
        .write_all(CONTENT_TYPES.as_bytes())
        .expect("write content types");
    writer
        .start_file(DOCUMENT_PART, SimpleFileOptions::default())
        .expect("start document");
    writer.write_all(document.as_bytes()).expect("write document");
    writer.finish().expect("finish").into_inner()
}

fn entry(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive");
    let mut file = archive.by_name(name).expect("entry");
    let mut text = String::new();
    file.read_to_string(&mut text).expect("read entry");
    text
}

struct Fixture {
    dir: TempDir,
    path: std::path::PathBuf,
}

#[fixture]
fn resume() -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("resume.docx");
    fs::write(&path, package(BODY)).expect("write package");
    Fixture { dir, path }
}

fn texts(lines: &LineMap) -> Vec<&str> {
    lines.iter().map(|(_, text)| text).collect()
}

#[rstest]
fn reads_non_empty_top_level_paragraphs(resume: Fixture) {
    let (lines, document, paragraphs) = read_docx(&resume.path).expect("read");
    assert_eq!(texts(&lines), vec!["Experience", "Built R&D \ttools", "Skills"]);
    assert_eq!(paragraphs.len(), 3);
    let first = paragraphs.get(&1).copied().expect("line 1");
    assert_eq!(document.paragraph_text(first).as_deref(), Some("Experience"));
}

#[rstest]
fn save_round_trips_lines_and_other_entries(resume: Fixture) {
    let (lines, document, _) = read_docx(&resume.path).expect("read");
    let copy = resume.dir.path().join("out/copy.docx");
    document.save(&copy).expect("save");
    let (reread, _, _) = read_docx(&copy).expect("reread");
    assert_eq!(reread, lines);
    let bytes = fs::read(&copy).expect("read copy");
    assert_eq!(entry(&bytes, "[Content_Types].xml"), CONTENT_TYPES);
}

#[rstest]
fn in_place_edits_keep_formatting(resume: Fixture) {
    let (lines, mut document, paragraphs) = read_docx(&resume.path).expect("read");
    let batch = EditBatch::new(vec![
        EditOperation::replace_line(1, "Work History"),
        EditOperation::delete_range(2, 2),
    ]);
    let target = build_target(&lines, &batch).expect("target");
    let plan = plan_edits(&lines, &target);
    let mut editor = DocxEditor::new(&mut document, &paragraphs);
    apply_plan(&plan, &mut editor).expect("apply");

    let (edited, _) = document.lines();
    assert_eq!(edited, target);

    let bytes = document.to_package().expect("package");
    let xml = entry(&bytes, DOCUMENT_PART);
    assert!(xml.contains("<w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">Work History</w:t>"));
    assert!(xml.contains("Heading1"));
    assert!(!xml.contains("tools"));
    assert!(xml.contains("<w:tbl>"));
    assert!(xml.ends_with("<w:sectPr/></w:body></w:document>"));
}

#[rstest]
fn inserted_paragraphs_copy_anchor_properties(resume: Fixture) {
    let (_, mut document, paragraphs) = read_docx(&resume.path).expect("read");
    let mut editor = DocxEditor::new(&mut document, &paragraphs);
    editor.insert_after(1, "Lead").expect("insert");

    let (edited, _) = document.lines();
    assert_eq!(
        texts(&edited),
        vec!["Experience", "Lead", "Built R&D \ttools", "Skills"]
    );
    let bytes = document.to_package().expect("package");
    assert_eq!(entry(&bytes, DOCUMENT_PART).matches("Heading1").count(), 2);
}

#[rstest]
fn deleted_anchors_still_position_insertions(resume: Fixture) {
    let (_, mut document, paragraphs) = read_docx(&resume.path).expect("read");
    let mut editor = DocxEditor::new(&mut document, &paragraphs);
    editor.delete_line(2).expect("delete");
    editor.insert_after(2, "Replacement").expect("insert");

    let (edited, _) = document.lines();
    assert_eq!(texts(&edited), vec!["Experience", "Replacement", "Skills"]);
}

#[rstest]
fn rebuild_follows_target_order_and_keeps_blocks(resume: Fixture) {
    let (_, mut document, paragraphs) = read_docx(&resume.path).expect("read");
    let target: LineMap = [(1, "Experience"), (2, "Rust"), (3, "Go"), (4, "New line")]
        .into_iter()
        .map(|(line, text)| (line, text.to_owned()))
        .collect();
    document.rebuild(&target, &paragraphs);

    let (rebuilt, _) = document.lines();
    assert_eq!(rebuilt, target);

    let bytes = document.to_package().expect("package");
    let xml = entry(&bytes, DOCUMENT_PART);
    let table = xml.find("<w:tbl>").expect("table kept");
    let rust = xml.find(">Rust<").expect("rust");
    let go = xml.find(">Go<").expect("go");
    assert!(rust < table && table < go);
    assert!(xml.contains("<w:rPr><w:i/></w:rPr><w:t xml:space=\"preserve\">Go</w:t>"));
    assert!(xml.contains("<w:p><w:r><w:t xml:space=\"preserve\">New line</w:t></w:r></w:p>"));
    assert!(xml.ends_with("<w:sectPr/></w:body></w:document>"));
}

#[rstest]
fn prepended_paragraphs_come_first(resume: Fixture) {
    let (lines, mut document, paragraphs) = read_docx(&resume.path).expect("read");
    let mut editor = DocxEditor::new(&mut document, &paragraphs);
    editor.prepend("Ada Lovelace").expect("prepend");

    let (edited, _) = document.lines();
    assert_eq!(edited.get(1), Some("Ada Lovelace"));
    assert_eq!(edited.len(), lines.len() + 1);
}

#[test]
fn missing_document_part_is_rejected() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("[Content_Types].xml", SimpleFileOptions::default())
        .expect("start");
    writer.write_all(CONTENT_TYPES.as_bytes()).expect("write");
    let bytes = writer.finish().expect("finish").into_inner();
    let error = DocxDocument::from_package(bytes, Path::new("broken.docx")).expect_err("error");
    assert!(matches!(error, DocumentError::Docx { .. }));
}

#[test]
fn corrupt_archives_are_rejected() {
    let error = DocxDocument::from_package(b"not a zip".to_vec(), Path::new("broken.docx"))
        .expect_err("error");
    assert!(matches!(error, DocumentError::Docx { .. }));
}

#[rstest]
#[case("in_place", DocxApplyMode::InPlace)]
#[case("Rebuild", DocxApplyMode::Rebuild)]
fn apply_modes_parse(#[case] raw: &str, #[case] expected: DocxApplyMode) {
    assert_eq!(raw.parse::<DocxApplyMode>(), Ok(expected));
}
