//! "Find elements and splice" behind one interface.
//!
//! [`StructuralSplicer`] matches a full ancestor selector with the streaming
//! [`TagMatcher`]; [`FlatSplicer`] runs the byte-level [`FlatScanner`] and only
//! knows a single tag. Both collect their hits over the unmodified input and
//! apply the resulting [`EditList`] in one pass, so every hit is reported in
//! original-text coordinates.
//!
//! [`Strategy::for_selector`] picks flat scanning when no ancestor context is
//! needed, and structural matching otherwise.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use core::ops::Range;
use std::collections::BTreeMap;

use crate::matcher::{is_void, MatchRecord, TagMatcher};
use crate::rewrite::{EditList, Splice};
use crate::scanner::{FlatScanner, InsertAnchor, ScanHit};
use crate::selector::Selector;
use crate::tokenizer::{attribute, Attribute};

#[derive(Clone, Copy, Debug)]
enum HitAttributes<'a> {
    Listed(&'a [Attribute]),
    Tracked(&'a BTreeMap<String, String>),
}

/// Element handed to a splice decision.
#[derive(Clone, Copy, Debug)]
pub struct ElementHit<'a> {
    tag: &'a str,
    attributes: HitAttributes<'a>,
    start_tag: (usize, usize),
    element: (usize, usize),
}

impl<'a> ElementHit<'a> {
    fn from_match(record: &'a MatchRecord) -> Self {
        let span = record.span();
        Self {
            tag: &record.tag,
            attributes: HitAttributes::Listed(&record.attributes),
            start_tag: (record.start_tag.start, record.start_tag.end),
            element: (span.start, span.end),
        }
    }

    fn from_scan(tag: &'a str, hit: &'a ScanHit) -> Self {
        let span = hit.span();
        Self {
            tag,
            attributes: HitAttributes::Tracked(hit.values()),
            start_tag: (span.start, span.end),
            element: (span.start, span.end),
        }
    }

    /// Lowercased tag name.
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    /// First non-empty value of attribute `name`.
    ///
    /// The flat strategy only sees the attributes it was built to track;
    /// anything else reads as absent.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        let value = match self.attributes {
            HitAttributes::Listed(list) => attribute(list, name),
            HitAttributes::Tracked(map) => map.get(name).map(String::as_str),
        };
        value.filter(|value| !value.is_empty())
    }

    /// Start tag span in the original text.
    pub fn start_tag(&self) -> Range<usize> {
        self.start_tag.0..self.start_tag.1
    }

    /// Whole element span in the original text (the start tag alone for void,
    /// self-closing and unterminated elements).
    pub fn span(&self) -> Range<usize> {
        self.element.0..self.element.1
    }
}

/// Finds elements in a text and splices around them.
pub trait ElementSplicer {
    /// Rewrite `text`, asking `decide` what to do at each element.
    ///
    /// Returns `text` unchanged when nothing is spliced or when the edits
    /// cannot be applied.
    fn splice<F>(&self, text: &str, decide: F) -> String
    where
        F: FnMut(&ElementHit<'_>) -> Splice;
}

/// Ancestor-aware splicer backed by [`TagMatcher`].
#[derive(Clone, Debug)]
pub struct StructuralSplicer {
    matcher: TagMatcher,
}

impl StructuralSplicer {
    /// Splicer for elements matching `selector`.
    pub fn new(selector: Selector) -> Self {
        Self {
            matcher: TagMatcher::new(selector),
        }
    }

    /// Selector being matched.
    pub fn selector(&self) -> &Selector {
        self.matcher.selector()
    }
}

impl ElementSplicer for StructuralSplicer {
    fn splice<F>(&self, text: &str, mut decide: F) -> String
    where
        F: FnMut(&ElementHit<'_>) -> Splice,
    {
        let matches = self.matcher.find_matches(text);
        let mut edits = EditList::new();
        for record in &matches {
            let hit = ElementHit::from_match(record);
            match decide(&hit) {
                Splice::Keep => {}
                Splice::Insert(attrs) => {
                    if let Some((at, attrs)) = attribute_insertion(text, hit.start_tag(), attrs) {
                        edits.insert(at, attrs);
                    }
                }
                Splice::Wrap { before, after } => edits.wrap(hit.span(), before, after),
            }
        }
        apply_edits(text, &edits, "structural")
    }
}

/// Tag-only splicer backed by [`FlatScanner`].
#[derive(Clone, Debug)]
pub struct FlatSplicer {
    scanner: FlatScanner,
}

impl FlatSplicer {
    /// Splicer for `<tag` tracking `attributes`.
    pub fn new(tag: &str, attributes: &[&str]) -> Self {
        Self {
            scanner: FlatScanner::new(tag, attributes.iter().copied()),
        }
    }

    /// Wrap an already configured scanner.
    pub fn from_scanner(scanner: FlatScanner) -> Self {
        Self { scanner }
    }

    /// Choose where attribute insertions land.
    pub fn with_anchor(mut self, anchor: InsertAnchor) -> Self {
        self.scanner = self.scanner.with_anchor(anchor);
        self
    }

    /// Underlying scanner.
    pub fn scanner(&self) -> &FlatScanner {
        &self.scanner
    }
}

impl ElementSplicer for FlatSplicer {
    fn splice<F>(&self, text: &str, mut decide: F) -> String
    where
        F: FnMut(&ElementHit<'_>) -> Splice,
    {
        let hits = self.scanner.scan(text);
        let mut edits = EditList::new();
        for scan_hit in &hits {
            let hit = ElementHit::from_scan(self.scanner.tag(), scan_hit);
            match decide(&hit) {
                Splice::Keep => {}
                Splice::Insert(attrs) => {
                    let edit = self.scanner.insertion(text, scan_hit, attrs);
                    edits.insert(edit.span().start, edit.text().to_string());
                }
                Splice::Wrap { before, after } => edits.wrap(hit.span(), before, after),
            }
        }
        apply_edits(text, &edits, "flat")
    }
}

/// Either splicer, chosen from the selector shape.
#[derive(Clone, Debug)]
pub enum Strategy {
    /// Streaming ancestor matcher.
    Structural(StructuralSplicer),
    /// Flat byte scanner.
    Flat(FlatSplicer),
}

impl Strategy {
    /// Flat scanning for a lone void tag (`img`), structural matching for
    /// everything else. `attributes` are the names the flat scanner tracks.
    pub fn for_selector(selector: Selector, attributes: &[&str]) -> Self {
        match selector.bare_tag() {
            Some(tag) if is_void(tag) => Self::Flat(FlatSplicer::new(tag, attributes)),
            _ => Self::Structural(StructuralSplicer::new(selector)),
        }
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Structural(_) => "structural",
            Self::Flat(_) => "flat",
        }
    }
}

impl ElementSplicer for Strategy {
    fn splice<F>(&self, text: &str, decide: F) -> String
    where
        F: FnMut(&ElementHit<'_>) -> Splice,
    {
        match self {
            Self::Structural(splicer) => splicer.splice(text, decide),
            Self::Flat(splicer) => splicer.splice(text, decide),
        }
    }
}

/// Insertion point right after `<name` and one whitespace byte, mirroring the
/// flat scanner's default anchor. Tags without whitespace after the name
/// (`<img/>`) get a leading space instead.
fn attribute_insertion(text: &str, start_tag: Range<usize>, attrs: String) -> Option<(usize, String)> {
    let raw = text.get(start_tag.clone())?;
    let name_len = raw
        .get(1..)?
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(raw.len().saturating_sub(1));
    let name_end = start_tag.start + 1 + name_len;
    match text.as_bytes().get(name_end) {
        Some(b) if b.is_ascii_whitespace() => Some((name_end + 1, attrs)),
        _ => Some((name_end, format!(" {}", attrs))),
    }
}

fn apply_edits(text: &str, edits: &EditList, strategy: &str) -> String {
    if edits.is_empty() {
        return text.to_string();
    }
    match edits.apply(text) {
        Ok(spliced) => {
            log::debug!("{} splicer applied {} edit(s)", strategy, spliced.applied.len());
            spliced.text
        }
        Err(err) => {
            log::warn!("{} splicer left text unchanged: {}", strategy, err);
            text.to_string()
        }
    }
}
