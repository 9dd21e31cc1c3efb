//! Restricted CSS-like selector language.
//!
//! A selector is a whitespace separated list of simple selectors, each of the
//! form `tag(.class)*`, `#id(.class)*` or `.class(.class)*`. A `*` tag
//! matches any element. The chain is
//! matched as an ancestor chain: every simple selector must match some
//! element nested inside the element matched by the one before it.
//!
//! Parsing never fails. Malformed tokens degrade into wider matches so that a
//! bad selector string cannot block page generation.
//!
//! ```rust
//! use markup_splice::selector::Selector;
//!
//! let sel = Selector::parse(".post img");
//! assert_eq!(sel.len(), 2);
//! assert!(sel.parts()[0].tag.is_none());
//! assert_eq!(sel.parts()[1].tag.as_deref(), Some("img"));
//! ```

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;

/// One `tag#id.class` predicate matched against a single element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimpleSelector {
    /// Required tag name, `None` matches any tag.
    pub tag: Option<String>,
    /// Required id, `None` matches any id (including none).
    pub id: Option<String>,
    /// Classes the element must carry (subset test).
    pub classes: BTreeSet<String>,
}

impl SimpleSelector {
    /// Parse a single token such as `div.post` or `#main.wide`.
    pub fn parse(token: &str) -> Self {
        let mut fragments = token.split('.');
        let first = fragments.next().unwrap_or_default();
        let classes = fragments
            .filter(|class| !class.is_empty())
            .map(str::to_string)
            .collect();
        let mut out = Self {
            tag: None,
            id: None,
            classes,
        };
        if let Some(id) = first.strip_prefix('#') {
            if !id.is_empty() {
                out.id = Some(id.to_string());
            }
        } else if !first.is_empty() && first != "*" {
            out.tag = Some(first.to_ascii_lowercase());
        }
        out
    }

    /// Test this predicate against one element.
    ///
    /// `id` is the element's `id` attribute (`None` when absent) and
    /// `classes` its whitespace-split `class` attribute.
    pub fn matches<'a, I>(&self, tag: &str, id: Option<&str>, classes: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        if let Some(want) = self.tag.as_deref() {
            if !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(want) = self.id.as_deref() {
            if id != Some(want) {
                return false;
            }
        }
        if self.classes.is_empty() {
            return true;
        }
        let have: BTreeSet<&str> = classes.into_iter().collect();
        self.classes.iter().all(|class| have.contains(class.as_str()))
    }

    /// True when no tag, id or class constraint is present.
    pub fn is_universal(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty()
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_universal() {
            return f.write_str("*");
        }
        if let Some(tag) = &self.tag {
            f.write_str(tag)?;
        } else if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        Ok(())
    }
}

/// Ancestor chain of simple selectors, outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<SimpleSelector>,
}

impl Selector {
    /// Parse a whitespace separated selector string.
    pub fn parse(selector: &str) -> Self {
        Self {
            parts: selector.split_whitespace().map(SimpleSelector::parse).collect(),
        }
    }

    /// Build a selector from already parsed parts.
    pub fn from_parts(parts: Vec<SimpleSelector>) -> Self {
        Self { parts }
    }

    /// Simple selectors in ancestor order.
    pub fn parts(&self) -> &[SimpleSelector] {
        &self.parts
    }

    /// Number of simple selectors in the chain.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True for a selector with no parts, which matches nothing.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Tag name when the selector is a single bare tag like `img`.
    ///
    /// Such selectors need no ancestor context and can be served by the flat
    /// scanner.
    pub fn bare_tag(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [only] if only.id.is_none() && only.classes.is_empty() => only.tag.as_deref(),
            _ => None,
        }
    }
}

impl FromStr for Selector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, part) in self.parts.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}
