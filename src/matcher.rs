//! Streaming ancestor-chain matcher.
//!
//! Drives a [`MarkupTokenizer`] over the input and tracks how far down the
//! [`Selector`] chain the currently open elements reach. No tree is built: the
//! cursor keeps one entry per open element plus one binding per satisfied
//! selector level, which is enough to tell when an element closes the level it
//! bound.
//!
//! ```rust
//! use markup_splice::matcher::TagMatcher;
//! use markup_splice::selector::Selector;
//!
//! let html = r#"<img src="a.png"><div class="post"><img src="b.png"></div>"#;
//! let matches = TagMatcher::new(Selector::parse(".post img")).find_matches(html);
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].attr("src"), Some("b.png"));
//! ```

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::ops::Range;
use smallvec::SmallVec;

use crate::selector::Selector;
use crate::tokenizer::{attribute, Attribute, MarkupTokenizer, Source, TagEvent, XmlTokenizer};

/// Elements whose start tag also closes them.
pub const VOID_TAGS: &[&str] = &["img"];

/// True for tags in [`VOID_TAGS`] (already lowercased).
pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Element that satisfied the full selector chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    /// Lowercased tag name.
    pub tag: String,
    /// Attributes in source order; lookups take the first occurrence.
    pub attributes: Vec<Attribute>,
    /// Byte span of the start tag.
    pub start_tag: Range<usize>,
    /// Byte span of the end tag, absent for void, self-closing and
    /// unterminated elements.
    pub end_tag: Option<Range<usize>>,
}

impl MatchRecord {
    /// First value of attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        attribute(&self.attributes, name)
    }

    /// Whole element span, or just the start tag when no end tag was seen.
    pub fn span(&self) -> Range<usize> {
        let end = self
            .end_tag
            .as_ref()
            .map_or(self.start_tag.end, |end_tag| end_tag.end);
        self.start_tag.start..end
    }
}

/// Selector level bound by an open element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelBinding {
    /// Concrete tag name that satisfied the level.
    pub tag: String,
    /// The level's selector had no tag and was bound to `tag` only while the
    /// element stays open.
    pub temporary: bool,
}

/// Effect an open element had on the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpenEffect {
    /// Bound the next selector level.
    Level,
    /// Opened inside an element that already satisfied the whole chain.
    Depth,
    /// Did not match; tracked only so its end tag is recognised.
    Inert,
}

#[derive(Clone, Debug)]
struct OpenElement {
    name: String,
    effect: OpenEffect,
}

/// Outcome of feeding a start tag to the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opened {
    /// The element bound a selector level short of the full chain.
    Advanced,
    /// The element bound the last level: it is a match.
    Matched,
    /// The element is nested inside a full match and was not evaluated.
    Nested,
    /// The element did not satisfy the current level.
    Unmatched,
}

/// Outcome of feeding an end tag to the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Closed {
    /// No open element carries this name; the end tag was ignored.
    Stray,
    /// An open element (and anything unclosed inside it) was closed.
    Element,
    /// The element that completed the current match was closed.
    Match,
}

/// Position of the open elements relative to the selector chain.
///
/// `position` counts bound levels plus open elements nested inside a full
/// match, so `position > selector.len()` means "inside a matched subtree".
#[derive(Clone, Debug)]
pub struct MatcherCursor<'s> {
    selector: &'s Selector,
    levels: SmallVec<[LevelBinding; 8]>,
    open: Vec<OpenElement>,
    position: usize,
}

impl<'s> MatcherCursor<'s> {
    /// Fresh cursor at the start of the chain.
    pub fn new(selector: &'s Selector) -> Self {
        Self {
            selector,
            levels: SmallVec::new(),
            open: Vec::with_capacity(16),
            position: 0,
        }
    }

    /// Current index into the selector chain (see type docs).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Currently bound selector levels, outermost first.
    pub fn levels(&self) -> &[LevelBinding] {
        &self.levels
    }

    /// Number of open elements being tracked.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Feed a start tag.
    pub fn open(&mut self, tag: &str, id: Option<&str>, classes: &[&str]) -> Opened {
        let chain = self.selector.parts();
        if self.position >= chain.len() {
            self.push(tag, OpenEffect::Depth);
            self.position += 1;
            return Opened::Nested;
        }
        let part = &chain[self.position];
        if !part.matches(tag, id, classes.iter().copied()) {
            self.push(tag, OpenEffect::Inert);
            return Opened::Unmatched;
        }
        self.levels.push(LevelBinding {
            tag: tag.to_string(),
            temporary: part.tag.is_none(),
        });
        self.push(tag, OpenEffect::Level);
        self.position += 1;
        if self.position == chain.len() {
            Opened::Matched
        } else {
            Opened::Advanced
        }
    }

    /// Feed an end tag.
    ///
    /// Unclosed elements above the innermost open element named `tag` are
    /// closed implicitly.
    pub fn close(&mut self, tag: &str) -> Closed {
        let Some(index) = self.open.iter().rposition(|el| el.name == tag) else {
            return Closed::Stray;
        };
        while self.open.len() > index + 1 {
            self.pop();
        }
        if self.pop() {
            Closed::Match
        } else {
            Closed::Element
        }
    }

    /// Close the innermost open element (void and self-closing tags).
    pub fn close_innermost(&mut self) -> Closed {
        if self.open.is_empty() {
            return Closed::Stray;
        }
        if self.pop() {
            Closed::Match
        } else {
            Closed::Element
        }
    }

    fn push(&mut self, tag: &str, effect: OpenEffect) {
        self.open.push(OpenElement {
            name: tag.to_string(),
            effect,
        });
    }

    /// Pop one element; true when it was the element completing the chain.
    fn pop(&mut self) -> bool {
        let Some(el) = self.open.pop() else {
            return false;
        };
        match el.effect {
            OpenEffect::Inert => false,
            OpenEffect::Depth => {
                self.position = self.position.saturating_sub(1);
                false
            }
            OpenEffect::Level => {
                let completed = self.position == self.selector.len();
                if let Some(binding) = self.levels.pop() {
                    if binding.temporary {
                        log::trace!("Unbinding temporary tag <{}>", binding.tag);
                    }
                }
                self.position = self.position.saturating_sub(1);
                completed
            }
        }
    }
}

/// Finds elements matching a selector chain, in document order.
#[derive(Clone, Debug)]
pub struct TagMatcher {
    selector: Selector,
}

impl TagMatcher {
    /// Matcher for `selector`.
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    /// Selector being matched.
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Match with the default quick-xml tokenizer.
    pub fn find_matches(&self, text: &str) -> Vec<MatchRecord> {
        self.find_matches_with(&XmlTokenizer, text)
    }

    /// Match using an explicit tokenizer.
    pub fn find_matches_with<T: MarkupTokenizer>(
        &self,
        tokenizer: &T,
        text: &str,
    ) -> Vec<MatchRecord> {
        let source = Source::new(text);
        let mut cursor = MatcherCursor::new(&self.selector);
        let mut matches: Vec<MatchRecord> = Vec::new();

        tokenizer.tokenize(&source, |event| match event {
            TagEvent::Start(tag) => {
                let Some(start) = source.lines().offset(tag.position) else {
                    log::debug!("Start tag <{}> position out of range", tag.name);
                    return;
                };
                let classes: SmallVec<[&str; 8]> = attribute(&tag.attributes, "class")
                    .map(|value| value.split_whitespace().collect())
                    .unwrap_or_default();
                let id = attribute(&tag.attributes, "id");
                if cursor.open(&tag.name, id, &classes) == Opened::Matched {
                    matches.push(MatchRecord {
                        start_tag: start..start + tag.raw.len(),
                        end_tag: None,
                        tag: tag.name.clone(),
                        attributes: tag.attributes.clone(),
                    });
                }
                if tag.self_closing || is_void(&tag.name) {
                    cursor.close_innermost();
                }
            }
            TagEvent::End(tag) => {
                if is_void(&tag.name) {
                    return;
                }
                let Some(start) = source.lines().offset(tag.position) else {
                    log::debug!("End tag </{}> position out of range", tag.name);
                    return;
                };
                if cursor.close(&tag.name) == Closed::Match {
                    if let Some(current) = matches.last_mut() {
                        current.end_tag = Some(start..start + tag.raw.len());
                    }
                }
            }
        });

        log::debug!(
            "Selector '{}' matched {} element(s)",
            self.selector,
            matches.len()
        );
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(matches: &[MatchRecord]) -> Vec<&str> {
        matches.iter().filter_map(|m| m.attr("id")).collect()
    }

    const NESTED_POSTS: &str = r#"<div class="post" id="p1">
  <div class="post" id="p1a">
    <div class="post" id="p1a1"></div>
    <div class="post" id="p1a2"></div>
  </div>
  <div class="post" id="p1b">
    <div class="post" id="p1b1"></div>
  </div>
</div>
<div class="post" id="p2">
  <div class="post" id="p2a"></div>
</div>"#;

    fn sources(matches: &[MatchRecord]) -> Vec<&str> {
        matches.iter().filter_map(|m| m.attr("src")).collect()
    }

    #[test]
    fn bare_ampersands_before_the_post_do_not_stop_matching() {
        let matcher = TagMatcher::new(Selector::parse(".post img"));
        let post = r#"<div class="post"><img src="a.png"></div>"#;
        for lead in ["<p>Tom & Jerry</p>", "<p>R&D; a&b</p>", "<script>if (a && b) {}</script>"] {
            let html = format!("{}\n{}", lead, post);
            assert_eq!(sources(&matcher.find_matches(&html)), ["a.png"], "after {}", lead);
        }
    }

    #[test]
    fn script_and_style_content_is_not_markup() {
        let matcher = TagMatcher::new(Selector::parse(".post img"));
        let html = r#"<div class="post"><script>var s = "<img src='x.png'>"; if (a < b) {}</SCRIPT><style>p::before { content: "<img src='y.png'>" }</style><img src="real.png"></div>"#;
        let matches = matcher.find_matches(html);
        assert_eq!(sources(&matches), ["real.png"]);
        let span = matches[0].span();
        assert_eq!(&html[span], r#"<img src="real.png">"#);
    }

    #[test]
    fn unterminated_script_swallows_the_rest() {
        let matcher = TagMatcher::new(Selector::parse("img"));
        let html = r#"<img src="a.png"><script>document.write("<img src='b.png'>")"#;
        assert_eq!(sources(&matcher.find_matches(html)), ["a.png"]);
    }

    #[test]
    fn only_nested_image_matches_ancestor_chain() {
        let html = r#"<body>
<img id="outside" src="a.png">
<div class="post wide"><p><img id="inside" src="b.png"></p></div>
<img id="after" src="c.png">
</body>"#;
        let matches = TagMatcher::new(Selector::parse(".post img")).find_matches(html);
        assert_eq!(ids(&matches), vec!["inside"]);
        let m = &matches[0];
        assert_eq!(m.tag, "img");
        assert_eq!(&html[m.start_tag.clone()], r#"<img id="inside" src="b.png">"#);
        assert_eq!(m.end_tag, None);
        assert_eq!(m.span(), m.start_tag);
    }

    #[test]
    fn nested_same_tag_matches_only_outermost_per_level() {
        let top = TagMatcher::new(Selector::parse(".post")).find_matches(NESTED_POSTS);
        assert_eq!(ids(&top), vec!["p1", "p2"]);

        let second = TagMatcher::new(Selector::parse(".post .post")).find_matches(NESTED_POSTS);
        assert_eq!(ids(&second), vec!["p1a", "p1b", "p2a"]);

        let third =
            TagMatcher::new(Selector::parse("div.post .post .post")).find_matches(NESTED_POSTS);
        assert_eq!(ids(&third), vec!["p1a1", "p1a2", "p1b1"]);
    }

    #[test]
    fn end_tag_spans_close_the_matched_element() {
        let matches = TagMatcher::new(Selector::parse(".post .post")).find_matches(NESTED_POSTS);
        for m in &matches {
            let end = m.end_tag.clone().expect("matched div should be closed");
            assert_eq!(&NESTED_POSTS[end], "</div>");
            let whole = &NESTED_POSTS[m.span()];
            assert!(whole.starts_with("<div class=\"post\""));
            assert!(whole.ends_with("</div>"));
        }
        let p1b = &NESTED_POSTS[matches[1].span()];
        assert!(p1b.contains("p1b1"));
        assert!(!p1b.contains("p1a"));
    }

    #[test]
    fn temporary_tag_binding_is_released_for_siblings() {
        let html = r#"<section class="a"><p class="b" id="one">1</p></section>
<div class="a"><span class="b" id="two">2</span></div>"#;
        let matches = TagMatcher::new(Selector::parse(".a .b")).find_matches(html);
        assert_eq!(ids(&matches), vec!["one", "two"]);
        assert_eq!(&html[matches[1].end_tag.clone().unwrap_or_default()], "</span>");
    }

    #[test]
    fn leaving_an_ancestor_resets_the_chain() {
        let html = r#"<div class="post"><img id="in" src="a.png"></div><img id="out" src="b.png">"#;
        let matches = TagMatcher::new(Selector::parse(".post img")).find_matches(html);
        assert_eq!(ids(&matches), vec!["in"]);
    }

    #[test]
    fn sibling_images_inside_one_post_all_match() {
        let html = r#"<div class="post"><img id="a"><img id="b"/><p><img id="c"></p></div>"#;
        let matches = TagMatcher::new(Selector::parse(".post img")).find_matches(html);
        assert_eq!(ids(&matches), vec!["a", "b", "c"]);
    }

    #[test]
    fn unclosed_elements_are_closed_by_ancestor_end_tag() {
        let html = r#"<div class="post"><p>open paragraph</div><div class="post" id="next"><p>x</p></div>"#;
        let matches = TagMatcher::new(Selector::parse("div.post")).find_matches(html);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].attr("id"), Some("next"));
        assert!(matches.iter().all(|m| m.end_tag.is_some()));
    }

    #[test]
    fn unterminated_match_covers_only_start_tag() {
        let html = r#"<p>intro</p><div class="post" id="tail">never closed"#;
        let matches = TagMatcher::new(Selector::parse(".post")).find_matches(html);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].end_tag, None);
        assert_eq!(&html[matches[0].span()], r#"<div class="post" id="tail">"#);
    }

    #[test]
    fn offsets_survive_multiline_input() {
        let html = "<div class=\"post\">\n\n   text\n  <img id=\"deep\" src=\"x.png\">\n</div>\n";
        let matches = TagMatcher::new(Selector::parse(".post img")).find_matches(html);
        assert_eq!(matches.len(), 1);
        assert_eq!(
            &html[matches[0].start_tag.clone()],
            "<img id=\"deep\" src=\"x.png\">"
        );
    }

    #[test]
    fn id_selector_and_first_attribute_occurrence_wins() {
        let html = r#"<main id="content"><img alt="first" alt="second"></main><img alt="other">"#;
        let matches = TagMatcher::new(Selector::parse("#content img")).find_matches(html);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].attr("alt"), Some("first"));
        assert_eq!(matches[0].attributes.len(), 2);
    }

    #[test]
    fn empty_selector_and_plain_text_yield_no_matches() {
        let html = "<div class=\"post\"><img></div>";
        assert!(TagMatcher::new(Selector::parse("")).find_matches(html).is_empty());
        assert!(TagMatcher::new(Selector::parse(".post img"))
            .find_matches("no markup here")
            .is_empty());
    }

    #[test]
    fn cursor_tracks_levels_and_depth() {
        let selector = Selector::parse(".post img");
        let mut cursor = MatcherCursor::new(&selector);
        assert_eq!(cursor.open("article", None, &["post"]), Opened::Advanced);
        assert_eq!(cursor.levels().len(), 1);
        assert!(cursor.levels()[0].temporary);
        assert_eq!(cursor.levels()[0].tag, "article");
        assert_eq!(cursor.open("span", None, &[]), Opened::Unmatched);
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.open("img", None, &[]), Opened::Matched);
        assert!(!cursor.levels()[1].temporary);
        assert_eq!(cursor.open("b", None, &[]), Opened::Nested);
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.close("img"), Closed::Match);
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.close("nope"), Closed::Stray);
        assert_eq!(cursor.close("article"), Closed::Element);
        assert_eq!(cursor.position(), 0);
        assert!(cursor.levels().is_empty());
        assert_eq!(cursor.depth(), 0);
    }
}
