//! Fill in missing `width`/`height` attributes on images.
//!
//! The attribute text is decided per element from the given dimensions and
//! the image's probed size:
//!
//! | given           | inserted                                   |
//! |-----------------|--------------------------------------------|
//! | width and height| nothing                                    |
//! | width only      | `height="⌊width·H/W⌋" `                    |
//! | height only     | `width="⌊height·W/H⌋" `                    |
//! | neither         | `height="H" width="W" `                    |
//!
//! ```rust
//! use markup_splice::dimensions::CachedSize;
//! use markup_splice::sizer::size_insertion;
//!
//! let probed = CachedSize::Known { width: 200, height: 50 };
//! assert_eq!(size_insertion(Some("100"), None, probed), "height=\"25\" ");
//! ```

extern crate alloc;

use alloc::format;
use alloc::string::String;

use crate::dimensions::{CachedSize, DimensionCache, DimensionStore};
use crate::probe::{DimensionProber, HeaderProber};
use crate::resolve::{AssetResolver, Resolved, SiteResolver};
use crate::rewrite::Splice;
use crate::scanner::InsertAnchor;
use crate::selector::Selector;
use crate::site::{Mode, Page, PageRewriter};
use crate::strategy::{ElementSplicer, Strategy};

/// Attributes the sizer reads from each image.
const SIZER_ATTRIBUTES: &[&str] = &["src", "width", "height"];

/// Parse a given `width`/`height` value: a non-negative integer with an
/// optional `px` suffix.
pub fn parse_dimension(value: &str) -> Option<u64> {
    let value = value.trim();
    let digits = value.strip_suffix("px").unwrap_or(value).trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Attribute text to insert for an image with the given `width`/`height`
/// values and probed size. Empty when nothing should be inserted.
///
/// A probed size with a zero side, a given dimension of `0` and an unparsable
/// given dimension all insert nothing.
pub fn size_insertion(width: Option<&str>, height: Option<&str>, probed: CachedSize) -> String {
    let Some((probed_w, probed_h)) = probed.usable() else {
        if let CachedSize::Known { width, height } = probed {
            log::debug!("Skipping degenerate image size {}x{}", width, height);
        }
        return String::new();
    };
    let (probed_w, probed_h) = (u64::from(probed_w), u64::from(probed_h));
    match (width, height) {
        (Some(_), Some(_)) => String::new(),
        (Some(given), None) => match given_dimension("width", given) {
            Some(w) => format!("height=\"{}\" ", w * probed_h / probed_w),
            None => String::new(),
        },
        (None, Some(given)) => match given_dimension("height", given) {
            Some(h) => format!("width=\"{}\" ", h * probed_w / probed_h),
            None => String::new(),
        },
        (None, None) => format!("height=\"{}\" width=\"{}\" ", probed_h, probed_w),
    }
}

fn given_dimension(name: &str, value: &str) -> Option<u64> {
    match parse_dimension(value) {
        Some(0) => None,
        // Keeps the scaled product inside u64.
        Some(n) if n > u64::from(u32::MAX) => {
            log::warn!("Ignoring oversized {}=\"{}\"", name, value);
            None
        }
        Some(n) => Some(n),
        None => {
            log::warn!("Ignoring unparsable {}=\"{}\"", name, value);
            None
        }
    }
}

/// Sizer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizerOptions {
    /// Elements to size. A bare `img` uses the flat scanner.
    pub selector: Selector,
    /// Site mode; development modes skip sizing.
    pub mode: Mode,
    /// Insertion point for the flat scanner.
    pub anchor: InsertAnchor,
}

impl Default for SizerOptions {
    fn default() -> Self {
        Self {
            selector: Selector::parse("img"),
            mode: Mode::default(),
            anchor: InsertAnchor::default(),
        }
    }
}

impl SizerOptions {
    /// Override the selector.
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Override the site mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the flat scanner's insertion point.
    pub fn with_anchor(mut self, anchor: InsertAnchor) -> Self {
        self.anchor = anchor;
        self
    }
}

/// Page rewriter adding `width`/`height` to images that lack them.
#[derive(Debug)]
pub struct ImageSizer<R = SiteResolver, P = HeaderProber, S = DimensionCache> {
    resolver: R,
    prober: P,
    store: S,
    mode: Mode,
    strategy: Strategy,
}

impl<R, P, S> ImageSizer<R, P, S>
where
    R: AssetResolver,
    P: DimensionProber,
    S: DimensionStore,
{
    /// Sizer with default options.
    pub fn new(resolver: R, prober: P, store: S) -> Self {
        Self::with_options(resolver, prober, store, SizerOptions::default())
    }

    /// Sizer with explicit options.
    pub fn with_options(resolver: R, prober: P, store: S, options: SizerOptions) -> Self {
        let strategy = match Strategy::for_selector(options.selector, SIZER_ATTRIBUTES) {
            Strategy::Flat(flat) => Strategy::Flat(flat.with_anchor(options.anchor)),
            structural => structural,
        };
        Self {
            resolver,
            prober,
            store,
            mode: options.mode,
            strategy,
        }
    }

    /// Dimension store backing this sizer.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Attribute text for one image on `page`.
    pub fn insertion(
        &mut self,
        page: &Page,
        src: Option<&str>,
        width: Option<&str>,
        height: Option<&str>,
    ) -> String {
        image_insertion(
            &self.resolver,
            &self.prober,
            &mut self.store,
            page,
            src,
            width,
            height,
        )
    }
}

fn image_insertion<R, P, S>(
    resolver: &R,
    prober: &P,
    store: &mut S,
    page: &Page,
    src: Option<&str>,
    width: Option<&str>,
    height: Option<&str>,
) -> String
where
    R: AssetResolver,
    P: DimensionProber,
    S: DimensionStore,
{
    if width.is_some() && height.is_some() {
        return String::new();
    }
    let Some(src) = src else {
        log::warn!("[{}] has an img tag without src attribute", page);
        return String::new();
    };
    let resource = match resolver.resolve(src, page) {
        Resolved::Local(resource) => resource,
        Resolved::Remote => return String::new(),
        Resolved::Unknown => {
            log::warn!("[{}] has an unknown image {}", page, src);
            return String::new();
        }
    };
    if !resource.is_raster() {
        log::warn!("[{}] has an img tag not linking to an image: {}", page, src);
        return String::new();
    }
    let probed = store.get_or_probe(src, || prober.probe(&resource.path));
    size_insertion(width, height, probed)
}

impl<R, P, S> PageRewriter for ImageSizer<R, P, S>
where
    R: AssetResolver,
    P: DimensionProber,
    S: DimensionStore,
{
    fn name(&self) -> &'static str {
        "image-sizer"
    }

    fn begin_pass(&mut self) {
        self.store.reset();
    }

    fn rewrite(&mut self, page: &Page, text: &str) -> String {
        if !page.is_html() {
            return text.into();
        }
        if self.mode.is_development() {
            log::debug!("Skipping sizer in development mode.");
            return text.into();
        }
        let Self {
            resolver,
            prober,
            store,
            strategy,
            ..
        } = self;
        strategy.splice(text, |hit| {
            Splice::insert(image_insertion(
                resolver,
                prober,
                store,
                page,
                hit.attr("src"),
                hit.attr("width"),
                hit.attr("height"),
            ))
        })
    }
}
