//! Wrap post images in `<figure>` with a caption taken from `title` or `alt`.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};

use crate::rewrite::Splice;
use crate::selector::Selector;
use crate::site::{Page, PageRewriter};
use crate::strategy::{ElementSplicer, Strategy};

/// Markup placed before each wrapped element.
pub const FIGURE_OPEN: &str = "\n<figure>\n";

/// Markup placed after a wrapped element with caption `caption`.
pub fn figure_close(caption: &str) -> String {
    format!("\n  <figcaption>{}</figcaption>\n</figure>\n", caption)
}

/// Caption for an element: `title`, else `alt`, else `None`.
pub fn caption<'a>(title: Option<&'a str>, alt: Option<&'a str>) -> Option<&'a str> {
    title.or(alt)
}

/// Figure pass configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FigureOptions {
    /// Elements to wrap.
    pub selector: Selector,
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            selector: Selector::parse(".post img"),
        }
    }
}

impl FigureOptions {
    /// Override the selector.
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }
}

/// Page rewriter wrapping matched images in captioned figures.
///
/// Not idempotent: already wrapped images still match and are wrapped again.
#[derive(Clone, Debug)]
pub struct ImageFigure {
    strategy: Strategy,
}

impl Default for ImageFigure {
    fn default() -> Self {
        Self::new(FigureOptions::default())
    }
}

impl ImageFigure {
    /// Figure pass with `options`.
    pub fn new(options: FigureOptions) -> Self {
        Self {
            strategy: Strategy::for_selector(options.selector, &["alt", "title"]),
        }
    }
}

impl PageRewriter for ImageFigure {
    fn name(&self) -> &'static str {
        "image-figure"
    }

    fn rewrite(&mut self, page: &Page, text: &str) -> String {
        if !page.is_html() {
            return text.to_string();
        }
        self.strategy.splice(text, |hit| {
            let caption = caption(hit.attr("title"), hit.attr("alt")).unwrap_or_else(|| {
                log::warn!("[{}] has an image without alt text", page);
                ""
            });
            Splice::Wrap {
                before: FIGURE_OPEN.to_string(),
                after: figure_close(caption),
            }
        })
    }
}
