//! Flat-text attribute scanner.
//!
//! A byte-level state machine that looks for one literal tag marker (`<img`)
//! and a fixed set of `name=` attributes, without any notion of nesting. It is
//! cheaper than the structural matcher and needs no tokenizer, at the cost of
//! also hitting tag-like text the structural path would skip, for example
//! inside a `<script>` string.
//!
//! ```rust
//! use markup_splice::rewrite::Splice;
//! use markup_splice::scanner::FlatScanner;
//!
//! let html = r#"<p><img src="a.png"></p>"#;
//! let out = FlatScanner::img().rewrite(html, |hit| {
//!     assert_eq!(hit.value("src"), Some("a.png"));
//!     Splice::insert(r#"width="10" "#)
//! });
//! assert_eq!(out, r#"<p><img width="10" src="a.png"></p>"#);
//! ```

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::ops::Range;
use std::collections::BTreeMap;

use crate::rewrite::{Edit, LiveBuffer, Splice};

/// Where [`Splice::Insert`] text lands inside a hit's start tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertAnchor {
    /// Right after `<marker` and the whitespace byte that follows it.
    #[default]
    AfterMarker,
    /// Immediately before the closing `>` (or `/>`).
    BeforeClose,
}

/// Hard bounds that keep a runaway tag from swallowing the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanLimits {
    /// Longest start tag, in bytes, before the hit is abandoned.
    pub max_tag_bytes: usize,
    /// Longest attribute value, in bytes, before the hit is abandoned.
    pub max_value_bytes: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_tag_bytes: 64 * 1024,
            max_value_bytes: 8 * 1024,
        }
    }
}

/// One complete start tag found by the scanner.
///
/// Offsets are in the coordinates of the buffer being rewritten at the time
/// the hit is reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanHit {
    /// Offset of the `<`.
    pub tag_start: usize,
    /// Offset just past `<marker` and its following whitespace byte.
    pub attrs_start: usize,
    /// Offset of the closing `>`.
    pub close: usize,
    values: BTreeMap<String, String>,
}

impl ScanHit {
    /// Value of a tracked attribute; `None` when absent or empty.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Every tracked attribute, empty string when absent.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Start tag span, `<` through `>`.
    pub fn span(&self) -> Range<usize> {
        self.tag_start..self.close + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    FindTag,
    FindAttr,
    GetValue {
        attr: usize,
        quote: Option<u8>,
        start: usize,
    },
}

struct PendingHit {
    tag_start: usize,
    attrs_start: usize,
    values: Vec<String>,
}

/// Scanner for one tag marker and a fixed attribute set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatScanner {
    marker: String,
    attributes: Vec<String>,
    anchor: InsertAnchor,
    limits: ScanLimits,
}

impl FlatScanner {
    /// Scanner for `<tag` with the given attribute names.
    pub fn new<I, S>(tag: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            marker: format!("<{}", tag),
            attributes: attributes.into_iter().map(Into::into).collect(),
            anchor: InsertAnchor::default(),
            limits: ScanLimits::default(),
        }
    }

    /// Scanner for `<img` tracking `src`, `width` and `height`.
    pub fn img() -> Self {
        Self::new("img", ["src", "width", "height"])
    }

    /// Choose where insertions land.
    pub fn with_anchor(mut self, anchor: InsertAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Override scan limits.
    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Tag name being scanned for.
    pub fn tag(&self) -> &str {
        &self.marker[1..]
    }

    /// Report every hit without changing the text.
    pub fn scan(&self, text: &str) -> Vec<ScanHit> {
        let mut hits = Vec::new();
        self.rewrite(text, |hit| {
            hits.push(hit.clone());
            Splice::Keep
        });
        hits
    }

    /// Scan `text`, asking `decide` what to splice at each hit.
    ///
    /// Splicing happens immediately; the scan continues right after the
    /// (possibly shifted) end of the tag just handled.
    pub fn rewrite<F>(&self, text: &str, mut decide: F) -> String
    where
        F: FnMut(&ScanHit) -> Splice,
    {
        let mut buf = LiveBuffer::new(text);
        let mut state = State::FindTag;
        let mut pending: Option<PendingHit> = None;

        loop {
            let pos = buf.cursor();
            let Some(byte) = buf.as_str().as_bytes().get(pos).copied() else {
                break;
            };
            if let Some(hit) = &pending {
                if pos - hit.tag_start > self.limits.max_tag_bytes {
                    log::debug!(
                        "<{}> at byte {} exceeds max_tag_bytes ({}); skipped",
                        self.tag(),
                        hit.tag_start,
                        self.limits.max_tag_bytes
                    );
                    buf.set_cursor(hit.attrs_start);
                    pending = None;
                    state = State::FindTag;
                    continue;
                }
            }

            match state {
                State::FindTag => {
                    let marker = self.marker.as_bytes();
                    let Some(found) = buf.as_str().as_bytes()[pos..]
                        .windows(marker.len())
                        .position(|window| window == marker)
                    else {
                        break;
                    };
                    let tag_start = pos + found;
                    let after = tag_start + self.marker.len();
                    match buf.as_str().as_bytes().get(after) {
                        Some(b) if b.is_ascii_whitespace() => {
                            pending = Some(PendingHit {
                                tag_start,
                                attrs_start: after + 1,
                                values: vec![String::new(); self.attributes.len()],
                            });
                            buf.set_cursor(after + 1);
                            state = State::FindAttr;
                        }
                        // `<imgx`, `<img>` or end of text.
                        _ => buf.set_cursor(after),
                    }
                }
                State::FindAttr => {
                    if byte == b'>' {
                        if let Some(hit) = pending.take() {
                            self.finish_hit(&mut buf, hit, pos, &mut decide);
                        }
                        state = State::FindTag;
                        continue;
                    }
                    if byte == b'<' {
                        pending = None;
                        state = State::FindTag;
                        continue;
                    }
                    if matches!(byte, b'"' | b'\'') {
                        // Untracked quoted values are opaque.
                        match buf.as_str().as_bytes()[pos + 1..]
                            .iter()
                            .position(|b| *b == byte)
                        {
                            Some(len) => buf.set_cursor(pos + len + 2),
                            None => {
                                pending = None;
                                state = State::FindTag;
                                buf.set_cursor(pos + 1);
                            }
                        }
                        continue;
                    }
                    match self.attribute_at(buf.as_str(), pos) {
                        Some(attr) => {
                            let mut value_start = pos + self.attributes[attr].len() + 1;
                            let quote = match buf.as_str().as_bytes().get(value_start).copied() {
                                Some(q @ (b'"' | b'\'')) => {
                                    value_start += 1;
                                    Some(q)
                                }
                                _ => None,
                            };
                            buf.set_cursor(value_start);
                            state = State::GetValue {
                                attr,
                                quote,
                                start: value_start,
                            };
                        }
                        None => buf.set_cursor(pos + 1),
                    }
                }
                State::GetValue { attr, quote, start } => {
                    let ends = match quote {
                        Some(q) => byte == q,
                        None => byte.is_ascii_whitespace() || byte == b'>',
                    };
                    if !ends {
                        if pos - start > self.limits.max_value_bytes {
                            log::debug!(
                                "Attribute {} at byte {} exceeds max_value_bytes ({}); skipped",
                                self.attributes[attr],
                                start,
                                self.limits.max_value_bytes
                            );
                            pending = None;
                            state = State::FindTag;
                        }
                        buf.set_cursor(pos + 1);
                        continue;
                    }
                    if let Some(hit) = pending.as_mut() {
                        let slot = &mut hit.values[attr];
                        if slot.is_empty() {
                            *slot = buf.as_str()[start..pos].to_string();
                        }
                    }
                    // An unquoted value stops on `>`, which FindAttr must see.
                    if byte != b'>' {
                        buf.set_cursor(pos + 1);
                    }
                    state = State::FindAttr;
                }
            }
        }

        buf.into_string()
    }

    /// Placement of attribute text `attrs` inside `hit`, as an edit in the
    /// coordinates of `text` (the buffer `hit` was reported against).
    pub fn insertion(&self, text: &str, hit: &ScanHit, attrs: String) -> Edit {
        match self.anchor {
            InsertAnchor::AfterMarker => Edit::Insert {
                at: hit.attrs_start,
                text: attrs,
            },
            InsertAnchor::BeforeClose => {
                let bytes = text.as_bytes();
                let at = if hit.close > hit.attrs_start && bytes.get(hit.close - 1) == Some(&b'/') {
                    hit.close - 1
                } else {
                    hit.close
                };
                let spaced = at
                    .checked_sub(1)
                    .and_then(|prev| bytes.get(prev))
                    .is_some_and(u8::is_ascii_whitespace);
                let text = if spaced { attrs } else { format!(" {}", attrs) };
                Edit::Insert { at, text }
            }
        }
    }

    /// Index of the tracked attribute whose `name=` starts at `pos`.
    fn attribute_at(&self, text: &str, pos: usize) -> Option<usize> {
        let bytes = text.as_bytes();
        let boundary = pos
            .checked_sub(1)
            .and_then(|prev| bytes.get(prev))
            .is_some_and(|b| b.is_ascii_whitespace() || matches!(*b, b'"' | b'\'' | b'/'));
        if !boundary {
            return None;
        }
        let rest = &bytes[pos..];
        self.attributes.iter().position(|name| {
            rest.len() > name.len()
                && rest.starts_with(name.as_bytes())
                && rest[name.len()] == b'='
        })
    }

    fn finish_hit<F>(&self, buf: &mut LiveBuffer, pending: PendingHit, close: usize, decide: &mut F)
    where
        F: FnMut(&ScanHit) -> Splice,
    {
        let hit = ScanHit {
            tag_start: pending.tag_start,
            attrs_start: pending.attrs_start,
            close,
            values: self
                .attributes
                .iter()
                .cloned()
                .zip(pending.values)
                .collect(),
        };
        let result = match decide(&hit) {
            Splice::Keep => Ok(()),
            Splice::Insert(text) => {
                let edit = self.insertion(buf.as_str(), &hit, text);
                buf.insert(edit.span().start, edit.text())
            }
            Splice::Wrap { before, after } => buf
                .insert(close + 1, &after)
                .and_then(|()| buf.insert(hit.tag_start, &before))
                .map(|()| buf.set_cursor(buf.cursor() + after.len())),
        };
        if let Err(err) = result {
            log::warn!("Failed to splice <{}> at byte {}: {}", self.tag(), close, err);
        }
        // Cursor sits on the (shifted) `>`; resume right after it.
        buf.set_cursor(buf.cursor() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_tracked_attributes_in_all_quoting_styles() {
        let html = r#"<img src="a.png" width='120' height=80 alt="x"> <img
src=b.png>"#;
        let hits = FlatScanner::img().scan(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].value("src"), Some("a.png"));
        assert_eq!(hits[0].value("width"), Some("120"));
        assert_eq!(hits[0].value("height"), Some("80"));
        assert_eq!(&html[hits[0].span()], r#"<img src="a.png" width='120' height=80 alt="x">"#);
        assert_eq!(hits[1].value("src"), Some("b.png"));
        assert_eq!(hits[1].value("width"), None);
        assert_eq!(hits[1].values().get("width").map(String::as_str), Some(""));
    }

    #[test]
    fn rejects_lookalike_markers() {
        let html = r#"<imgx src="a.png"><img/><img><image src="c.png">"#;
        assert!(FlatScanner::img().scan(html).is_empty());
    }

    #[test]
    fn attribute_names_need_a_boundary() {
        let html = r#"<img data-src="lazy.png" src="real.png">"#;
        let hits = FlatScanner::img().scan(html);
        assert_eq!(hits[0].value("src"), Some("real.png"));
    }

    #[test]
    fn quoted_values_may_contain_spaces_and_gt() {
        let html = r#"<img src="my file.png" alt="a > b" width="5">"#;
        let hits = FlatScanner::new("img", ["src", "alt", "width"]).scan(html);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value("src"), Some("my file.png"));
        assert_eq!(hits[0].value("alt"), Some("a > b"));
        assert_eq!(hits[0].value("width"), Some("5"));
    }

    #[test]
    fn untracked_quoted_values_are_opaque() {
        let html = r#"<img alt="a > b, see src=x.png" src="real.png" title='<b>'>"#;
        let hits = FlatScanner::img().scan(html);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value("src"), Some("real.png"));
        assert_eq!(hits[0].span(), 0..html.len());
    }

    #[test]
    fn first_occurrence_of_an_attribute_wins() {
        let hits = FlatScanner::img().scan(r#"<img src="one.png" src="two.png">"#);
        assert_eq!(hits[0].value("src"), Some("one.png"));
    }

    #[test]
    fn ignores_nesting_and_hits_script_text() {
        let html = r#"<script>var s = "<img src='x.png'>";</script>"#;
        let hits = FlatScanner::img().scan(html);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value("src"), Some("x.png"));
    }

    #[test]
    fn stray_lt_abandons_the_current_tag() {
        let html = r#"<img src="a.png" <img src="b.png">"#;
        let hits = FlatScanner::img().scan(html);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value("src"), Some("b.png"));
    }

    #[test]
    fn immediate_inserts_keep_later_hits_aligned() {
        let html = r#"<img src="a.png"><p>x</p><img src="b.png"><img src="c.png">"#;
        let mut seen = Vec::new();
        let out = FlatScanner::img().rewrite(html, |hit| {
            seen.push(hit.tag_start);
            Splice::insert(format!("data-n=\"{}\" ", seen.len()))
        });
        assert_eq!(
            out,
            r#"<img data-n="1" src="a.png"><p>x</p><img data-n="2" src="b.png"><img data-n="3" src="c.png">"#
        );
        assert_eq!(seen, vec![0, 36, 64]);
        assert_eq!(&out[seen[1]..seen[1] + 4], "<img");
        assert_eq!(&out[seen[2]..seen[2] + 4], "<img");
    }

    #[test]
    fn before_close_anchor_respects_self_closing_tags() {
        let scanner = FlatScanner::img().with_anchor(InsertAnchor::BeforeClose);
        let out = scanner.rewrite(r#"<img src="a.png"/><img src="b.png" >"#, |_| {
            Splice::insert(r#"width="1""#)
        });
        assert_eq!(out, r#"<img src="a.png" width="1"/><img src="b.png" width="1">"#);
    }

    #[test]
    fn wrap_surrounds_the_whole_tag() {
        let out = FlatScanner::img().rewrite(r#"a<img src="x.png">b<img src="y.png">c"#, |hit| {
            match hit.value("src") {
                Some("x.png") => Splice::Wrap {
                    before: "[".to_string(),
                    after: "]".to_string(),
                },
                _ => Splice::Keep,
            }
        });
        assert_eq!(out, r#"a[<img src="x.png">]b<img src="y.png">c"#);
    }

    #[test]
    fn unterminated_tag_produces_no_hit() {
        let html = r#"<p><img src="a.png" width="3""#;
        let mut calls = 0;
        let out = FlatScanner::img().rewrite(html, |_| {
            calls += 1;
            Splice::insert("x")
        });
        assert_eq!(calls, 0);
        assert_eq!(out, html);
    }

    #[test]
    fn value_limit_abandons_oversized_attribute() {
        let long = "a".repeat(64);
        let html = format!(r#"<img src="{}"><img src="ok.png">"#, long);
        let scanner = FlatScanner::img().with_limits(ScanLimits {
            max_tag_bytes: 1024,
            max_value_bytes: 16,
        });
        let hits = scanner.scan(&html);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value("src"), Some("ok.png"));
    }
}
