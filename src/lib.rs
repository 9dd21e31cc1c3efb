//! Selector-constrained streaming markup matcher and text splicer.
//!
//! `markup-splice` finds `<img>`-like elements in generated HTML and splices
//! text into or around them without building a DOM:
//!
//! - [`sizer::ImageSizer`] fills in missing `width`/`height` attributes from
//!   the image file's header;
//! - [`figure::ImageFigure`] wraps post images in `<figure>` with a caption.
//!
//! Two element-finding strategies sit behind [`strategy::ElementSplicer`]: a
//! streaming ancestor matcher over quick-xml tag events ([`matcher`]) and a
//! byte-level scanner that knows a single tag ([`scanner`]).
//!
//! ```rust
//! use markup_splice::rewrite::Splice;
//! use markup_splice::selector::Selector;
//! use markup_splice::strategy::{ElementSplicer, Strategy};
//!
//! let html = r#"<div class="post"><img src="a.png" alt="A"></div>"#;
//! let strategy = Strategy::for_selector(Selector::parse(".post img"), &[]);
//! let out = strategy.splice(html, |hit| Splice::Wrap {
//!     before: "<figure>".into(),
//!     after: format!("<figcaption>{}</figcaption></figure>", hit.attr("alt").unwrap_or("")),
//! });
//! assert_eq!(
//!     out,
//!     r#"<div class="post"><figure><img src="a.png" alt="A"><figcaption>A</figcaption></figure></div>"#
//! );
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod dimensions;
pub mod error;
pub mod figure;
pub mod line_index;
pub mod matcher;
pub mod probe;
pub mod resolve;
pub mod rewrite;
pub mod scanner;
pub mod selector;
pub mod site;
pub mod sizer;
pub mod strategy;
pub mod tokenizer;

pub use dimensions::{CachedSize, DimensionCache, DimensionStore, SharedDimensionCache};
pub use error::{ErrorPhase, ProbeError, SiteError, SpliceError};
pub use figure::{FigureOptions, ImageFigure};
pub use matcher::{MatchRecord, TagMatcher};
pub use probe::{DimensionProber, HeaderProber};
pub use resolve::{AssetResolver, Resolved, Resource, SiteResolver};
pub use rewrite::{EditList, LiveBuffer, Splice};
pub use scanner::{FlatScanner, InsertAnchor, ScanLimits};
pub use selector::{Selector, SimpleSelector};
#[cfg(feature = "async")]
pub use site::rewrite_file_async;
pub use site::{Mode, Page, PageRewriter, PassReport, Pipeline, SiteConfig};
pub use sizer::{ImageSizer, SizerOptions};
pub use strategy::{ElementHit, ElementSplicer, FlatSplicer, Strategy, StructuralSplicer};
