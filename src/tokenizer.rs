//! Start/end tag event stream over markup text.
//!
//! The matcher only needs tag boundaries, so the tokenizer reports start and
//! end tags with their raw text and a `(line, column)` position; text, comments
//! and doctypes are consumed silently.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::Error;

use crate::line_index::{LineIndex, TextPosition};

/// Input text paired with its line-start table.
#[derive(Clone, Debug)]
pub struct Source<'a> {
    text: &'a str,
    lines: LineIndex,
}

impl<'a> Source<'a> {
    /// Index `text` for position conversion.
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            lines: LineIndex::new(text),
        }
    }

    /// Raw input text.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Line-start table for this text.
    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }
}

/// One attribute as written in the start tag, value not unescaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Raw value, empty for bare attributes.
    pub value: String,
}

impl Attribute {
    /// Construct an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// First value of `name` in an attribute list.
pub fn attribute<'v>(attributes: &'v [Attribute], name: &str) -> Option<&'v str> {
    attributes
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| attr.value.as_str())
}

/// Start tag event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartTag<'a> {
    /// Lowercased local tag name.
    pub name: String,
    /// Attributes in source order, duplicates kept.
    pub attributes: Vec<Attribute>,
    /// Position of the opening `<`.
    pub position: TextPosition,
    /// Raw start tag text, `<` through `>`.
    pub raw: &'a str,
    /// Written as `<name ... />`.
    pub self_closing: bool,
}

/// End tag event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndTag<'a> {
    /// Lowercased local tag name.
    pub name: String,
    /// Position of the opening `<`.
    pub position: TextPosition,
    /// Raw end tag text, `</` through `>`.
    pub raw: &'a str,
}

/// Tokenizer output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagEvent<'a> {
    /// `<name ...>` or `<name .../>`.
    Start(StartTag<'a>),
    /// `</name>`.
    End(EndTag<'a>),
}

/// Source of ordered start/end tag events.
///
/// Implementations recover from malformed input on a best-effort basis and
/// never fail: at worst they stop emitting events early.
pub trait MarkupTokenizer {
    /// Stream every tag event in `source` to `on_event`, in document order.
    fn tokenize<'a, F>(&self, source: &Source<'a>, on_event: F)
    where
        F: FnMut(TagEvent<'a>);
}

/// Elements whose content is raw text rather than markup.
pub const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// quick-xml backed tokenizer configured for HTML-ish input.
///
/// End tag names are not checked against open elements and dangling end tags
/// are allowed, so unclosed `<p>` or `<img>` elements do not abort the stream.
/// A bare `&` in text is accepted as is. The content of `<script>` and
/// `<style>` is skipped up to the matching end tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlTokenizer;

impl MarkupTokenizer for XmlTokenizer {
    fn tokenize<'a, F>(&self, source: &Source<'a>, mut on_event: F)
    where
        F: FnMut(TagEvent<'a>),
    {
        let text = source.text();
        let mut base = 0usize;
        let mut reader = html_reader(text.as_bytes());
        let mut buf = Vec::with_capacity(256);
        let mut last_error: Option<usize> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let end = base.saturating_add(reader_offset(&reader));
                    let Some(tag) = start_tag(&reader, source, &e, end, false) else {
                        buf.clear();
                        continue;
                    };
                    let raw_text = RAW_TEXT_TAGS.contains(&tag.name.as_str());
                    let name = tag.name.clone();
                    on_event(TagEvent::Start(tag));
                    if raw_text {
                        let Some(close) = find_raw_text_end(text, end, &name) else {
                            log::debug!("Unterminated <{}> at byte {}; rest is raw text", name, end);
                            break;
                        };
                        base = close;
                        reader = html_reader(text.as_bytes().get(close..).unwrap_or_default());
                    }
                }
                Ok(Event::Empty(e)) => {
                    let end = base.saturating_add(reader_offset(&reader));
                    if let Some(tag) = start_tag(&reader, source, &e, end, true) {
                        on_event(TagEvent::Start(tag));
                    }
                }
                Ok(Event::End(e)) => {
                    let end = base.saturating_add(reader_offset(&reader));
                    let Some(start) = text.get(..end).and_then(|head| head.rfind("</")) else {
                        buf.clear();
                        continue;
                    };
                    let Some(name) = decode_tag_name(&reader, e.name().as_ref()) else {
                        buf.clear();
                        continue;
                    };
                    on_event(TagEvent::End(EndTag {
                        name,
                        position: source.lines().position(start),
                        raw: &text[start..end],
                    }));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(Error::IllFormed(err)) => {
                    let at = base.saturating_add(reader_offset(&reader));
                    log::debug!("Ill-formed markup before byte {}: {}", at, err);
                    // Recovery must make progress or the stream ends here.
                    if last_error.replace(at) == Some(at) {
                        break;
                    }
                }
                Err(err) => {
                    log::debug!(
                        "Tokenizer stopped at byte {}: {}",
                        base.saturating_add(usize::try_from(reader.error_position()).unwrap_or(usize::MAX)),
                        err
                    );
                    break;
                }
            }
            buf.clear();
        }
    }
}

fn html_reader(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;
    reader
}

fn reader_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

/// Byte offset of the `</name` that closes a raw text element opened before
/// `from`. Names compare ASCII case-insensitively.
fn find_raw_text_end(text: &str, from: usize, name: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut at = from;
    while let Some(rel) = text.get(at..)?.find("</") {
        let open = at + rel;
        let name_start = open + 2;
        let name_end = name_start + name.len();
        let same_name = bytes
            .get(name_start..name_end)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name.as_bytes()));
        let terminated = matches!(
            bytes.get(name_end).copied(),
            None | Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
        );
        if same_name && terminated {
            return Some(open);
        }
        at = name_start;
    }
    None
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Option<String> {
    let decoded = reader.decoder().decode(raw).ok()?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Some(local_name.to_ascii_lowercase())
}

fn start_tag<'a>(
    reader: &Reader<&[u8]>,
    source: &Source<'a>,
    e: &BytesStart<'_>,
    end: usize,
    self_closing: bool,
) -> Option<StartTag<'a>> {
    let text = source.text();
    // Event content excludes `<`, `>` and the `/` of an empty element.
    let delimiters = if self_closing { 3 } else { 2 };
    let start = end.checked_sub(e.len() + delimiters)?;
    if text.as_bytes().get(start) != Some(&b'<') {
        log::debug!("Start tag at byte {} does not begin with '<'; skipped", start);
        return None;
    }
    let name = decode_tag_name(reader, e.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in e.html_attributes().with_checks(false).flatten() {
        let Ok(key) = reader.decoder().decode(attr.key.as_ref()) else {
            continue;
        };
        let Ok(value) = reader.decoder().decode(&attr.value) else {
            continue;
        };
        attributes.push(Attribute::new(key.to_ascii_lowercase(), value.to_string()));
    }
    Some(StartTag {
        name,
        attributes,
        position: source.lines().position(start),
        raw: text.get(start..end)?,
        self_closing,
    })
}
