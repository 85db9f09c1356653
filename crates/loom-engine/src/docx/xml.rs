//! Event-level handling of `word/document.xml`.
//!
//! The main part is kept as owned `quick-xml` events so that everything the
//! editor does not touch is written back unchanged. Only the direct children
//! of `w:body` are split out: paragraphs become [`ParagraphXml`] values and
//! every other element (tables, `w:sectPr`, bookmarks) stays opaque.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::{resolve_xml_entity, unescape};
use quick_xml::events::{BytesEnd, BytesRef, BytesStart, BytesText, Event};

pub(super) type OwnedEvent = Event<'static>;

const PARAGRAPH: &[u8] = b"p";
const RUN: &[u8] = b"r";
const TEXT: &[u8] = b"t";
const PARAGRAPH_PROPERTIES: &[u8] = b"pPr";
const RUN_PROPERTIES: &[u8] = b"rPr";

/// `word/document.xml` split around the children of `w:body`.
#[derive(Debug, Clone)]
pub(super) struct ParsedBody {
    /// Events up to and including the `w:body` start tag.
    pub(super) head: Vec<OwnedEvent>,
    /// Direct children of `w:body`, in document order.
    pub(super) blocks: Vec<RawBlock>,
    /// Events from the `w:body` end tag to the end of the part.
    pub(super) tail: Vec<OwnedEvent>,
}

#[derive(Debug, Clone)]
pub(super) enum RawBlock {
    Paragraph(ParagraphXml),
    Other(Vec<OwnedEvent>),
}

/// One `w:p` element.
#[derive(Debug, Clone)]
pub(super) struct ParagraphXml {
    start: BytesStart<'static>,
    children: Vec<OwnedEvent>,
}

impl ParagraphXml {
    /// Builds a fresh paragraph.
    pub(super) fn new(
        text: &str,
        properties: Option<Vec<OwnedEvent>>,
        run_properties: Option<&[OwnedEvent]>,
    ) -> Self {
        let mut paragraph = Self {
            start: BytesStart::new("w:p"),
            children: properties.unwrap_or_default(),
        };
        paragraph.push_run(text, run_properties);
        paragraph
    }

    /// Visible text: `w:t` content, `\t` for `w:tab` and `\n` for
    /// `w:br`/`w:cr`, counted only inside runs.
    pub(super) fn text(&self) -> String {
        let mut out = String::new();
        let mut run_depth = 0_usize;
        let mut in_text = false;
        for event in &self.children {
            match event {
                Event::Start(start) => match start.local_name().as_ref() {
                    RUN => run_depth += 1,
                    TEXT if run_depth > 0 => in_text = true,
                    _ => {}
                },
                Event::End(end) => match end.local_name().as_ref() {
                    RUN => run_depth = run_depth.saturating_sub(1),
                    TEXT => in_text = false,
                    _ => {}
                },
                Event::Empty(empty) if run_depth > 0 && !in_text => {
                    match empty.local_name().as_ref() {
                        b"tab" => out.push('\t'),
                        b"br" | b"cr" => out.push('\n'),
                        _ => {}
                    }
                }
                Event::Text(text) if in_text => {
                    if let Ok(decoded) = text.decode() {
                        match unescape(&decoded) {
                            Ok(unescaped) => out.push_str(&unescaped),
                            Err(_) => out.push_str(&decoded),
                        }
                    }
                }
                Event::GeneralRef(reference) if in_text => push_reference(&mut out, reference),
                _ => {}
            }
        }
        out
    }

    /// The direct `w:pPr` child, if present.
    pub(super) fn properties(&self) -> Option<Vec<OwnedEvent>> {
        extract_element(&self.children, PARAGRAPH_PROPERTIES, true)
    }

    /// The `w:rPr` of the first run, if present.
    pub(super) fn first_run_properties(&self) -> Option<Vec<OwnedEvent>> {
        let run = extract_element(&self.children, RUN, false)?;
        let inner = run.get(1..run.len().saturating_sub(1))?;
        extract_element(inner, RUN_PROPERTIES, true)
    }

    /// Replaces all runs with a single run holding `text`, keeping the
    /// paragraph properties.
    pub(super) fn set_text(&mut self, text: &str, run_properties: Option<&[OwnedEvent]>) {
        self.children = self.properties().unwrap_or_default();
        self.push_run(text, run_properties);
    }

    /// A copy of this paragraph holding `text` with its own first-run
    /// formatting.
    pub(super) fn with_text(&self, text: &str) -> Self {
        let run_properties = self.first_run_properties();
        let mut copy = self.clone();
        copy.set_text(text, run_properties.as_deref());
        copy
    }

    fn push_run(&mut self, text: &str, run_properties: Option<&[OwnedEvent]>) {
        if text.is_empty() {
            return;
        }
        self.children.push(Event::Start(BytesStart::new("w:r")));
        if let Some(properties) = run_properties {
            self.children.extend(properties.iter().cloned());
        }
        let mut chunk = String::new();
        for ch in text.chars() {
            let separator = match ch {
                '\t' => Some("w:tab"),
                '\n' => Some("w:br"),
                _ => None,
            };
            match separator {
                Some(name) => {
                    push_text(&mut self.children, &chunk);
                    chunk.clear();
                    self.children.push(Event::Empty(BytesStart::new(name)));
                }
                None => chunk.push(ch),
            }
        }
        push_text(&mut self.children, &chunk);
        self.children.push(Event::End(BytesEnd::new("w:r")));
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> std::io::Result<()> {
        if self.children.is_empty() {
            return writer.write_event(Event::Empty(self.start.borrow()));
        }
        writer.write_event(Event::Start(self.start.borrow()))?;
        write_events(writer, &self.children)?;
        writer.write_event(Event::End(self.start.to_end()))
    }
}

fn push_text(children: &mut Vec<OwnedEvent>, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    children.push(Event::Start(
        BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
    ));
    children.push(Event::Text(BytesText::new(chunk).into_owned()));
    children.push(Event::End(BytesEnd::new("w:t")));
}

fn push_reference(out: &mut String, reference: &BytesRef<'_>) {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        out.push(ch);
        return;
    }
    if let Some(value) = reference
        .decode()
        .ok()
        .and_then(|name| resolve_xml_entity(&name))
    {
        out.push_str(value);
    }
}

/// Finds the first element named `name` and returns its events.
///
/// With `direct_only`, only elements at the top level of `events` match.
fn extract_element(events: &[OwnedEvent], name: &[u8], direct_only: bool) -> Option<Vec<OwnedEvent>> {
    let mut depth = 0_usize;
    for (index, event) in events.iter().enumerate() {
        let eligible = !direct_only || depth == 0;
        match event {
            Event::Empty(empty) if eligible && empty.local_name().as_ref() == name => {
                return Some(vec![event.clone()]);
            }
            Event::Start(start) => {
                if eligible && start.local_name().as_ref() == name {
                    return element_span(events, index).map(<[OwnedEvent]>::to_vec);
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Events of the element whose start tag is at `start`, end tag included.
fn element_span(events: &[OwnedEvent], start: usize) -> Option<&[OwnedEvent]> {
    let mut depth = 0_usize;
    for (offset, event) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return events.get(start..=offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_start_of(event: &Event<'_>, name: &[u8]) -> bool {
    matches!(event, Event::Start(start) if start.local_name().as_ref() == name)
}

fn is_end_of(event: &Event<'_>, name: &[u8]) -> bool {
    matches!(event, Event::End(end) if end.local_name().as_ref() == name)
}

/// Splits the main document part into head, body blocks and tail.
pub(super) fn parse_body(xml: &str) -> Result<ParsedBody, String> {
    let mut reader = Reader::from_str(xml);
    let mut head = Vec::new();
    loop {
        let event = reader.read_event().map_err(|error| error.to_string())?;
        if matches!(event, Event::Eof) {
            return Err("document part has no w:body element".to_owned());
        }
        let found_body = is_start_of(&event, b"body");
        head.push(event.into_owned());
        if found_body {
            break;
        }
    }

    let mut blocks = Vec::new();
    let mut tail = Vec::new();
    loop {
        let event = reader.read_event().map_err(|error| error.to_string())?;
        if is_end_of(&event, b"body") {
            tail.push(event.into_owned());
            break;
        }
        match event {
            Event::Eof => return Err("w:body element is not closed".to_owned()),
            Event::Start(start) => {
                let (children, end) = read_children(&mut reader)?;
                if start.local_name().as_ref() == PARAGRAPH {
                    blocks.push(RawBlock::Paragraph(ParagraphXml {
                        start: start.into_owned(),
                        children,
                    }));
                } else {
                    let mut events = Vec::with_capacity(children.len() + 2);
                    events.push(Event::Start(start.into_owned()));
                    events.extend(children);
                    events.push(Event::End(end));
                    blocks.push(RawBlock::Other(events));
                }
            }
            Event::Empty(empty) if empty.local_name().as_ref() == PARAGRAPH => {
                blocks.push(RawBlock::Paragraph(ParagraphXml {
                    start: empty.into_owned(),
                    children: Vec::new(),
                }));
            }
            other => blocks.push(RawBlock::Other(vec![other.into_owned()])),
        }
    }

    loop {
        let event = reader.read_event().map_err(|error| error.to_string())?;
        if matches!(event, Event::Eof) {
            break;
        }
        tail.push(event.into_owned());
    }
    Ok(ParsedBody { head, blocks, tail })
}

fn read_children(reader: &mut Reader<&[u8]>) -> Result<(Vec<OwnedEvent>, BytesEnd<'static>), String> {
    let mut depth = 0_usize;
    let mut children = Vec::new();
    loop {
        let event = reader.read_event().map_err(|error| error.to_string())?;
        match event {
            Event::Eof => return Err("unexpected end of document part".to_owned()),
            Event::End(end) if depth == 0 => return Ok((children, end.into_owned())),
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
        children.push(event.into_owned());
    }
}

/// Body content for serialization.
pub(super) enum BodyItem<'a> {
    Paragraph(&'a ParagraphXml),
    Other(&'a [OwnedEvent]),
}

/// Writes head, body items and tail back into XML bytes.
pub(super) fn serialize<'a>(
    head: &[OwnedEvent],
    items: impl IntoIterator<Item = BodyItem<'a>>,
    tail: &[OwnedEvent],
) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    write_events(&mut writer, head).map_err(|error| error.to_string())?;
    for item in items {
        match item {
            BodyItem::Paragraph(paragraph) => paragraph.write(&mut writer),
            BodyItem::Other(events) => write_events(&mut writer, events),
        }
        .map_err(|error| error.to_string())?;
    }
    write_events(&mut writer, tail).map_err(|error| error.to_string())?;
    Ok(writer.into_inner())
}

fn write_events(writer: &mut Writer<Vec<u8>>, events: &[OwnedEvent]) -> std::io::Result<()> {
    for event in events {
        writer.write_event(event.borrow())?;
    }
    Ok(())
}

/// Whether an opaque block is only inter-element whitespace.
pub(super) fn is_whitespace(events: &[OwnedEvent]) -> bool {
    events.iter().all(|event| match event {
        Event::Text(text) => text.iter().all(u8::is_ascii_whitespace),
        _ => false,
    })
}
