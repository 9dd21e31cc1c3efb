//! Site-level plumbing: configuration, pages and the rewrite pipeline.
//!
//! A [`Pipeline`] threads each generated page through an ordered list of
//! [`PageRewriter`]s. One call to [`Pipeline::rewrite_tree`] is one
//! generation pass: pass-scoped caches are reset before the first page.

extern crate alloc;

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dimensions::DimensionCache;
use crate::error::SiteError;
use crate::figure::{FigureOptions, ImageFigure};
use crate::probe::HeaderProber;
use crate::resolve::SiteResolver;
use crate::selector::Selector;
use crate::sizer::{ImageSizer, SizerOptions};

/// Site generation mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Deployable output.
    #[default]
    Production,
    /// Any mode whose name starts with `dev`.
    Development,
    /// Any other named mode.
    Other(String),
}

impl Mode {
    /// Parse a mode name. Never fails.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with("dev") {
            Self::Development
        } else if name.is_empty() || name == "production" || name == "prod" {
            Self::Production
        } else {
            Self::Other(name.to_string())
        }
    }

    /// Development modes skip expensive passes.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Mode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// One generated document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// Path of the generated file.
    pub path: PathBuf,
    /// Lowercase file kind (extension), `html` for markup pages.
    pub kind: String,
}

impl Page {
    /// Page at `path`, kind from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self { path, kind }
    }

    /// Override the kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Markup pages are the only ones rewritten.
    pub fn is_html(&self) -> bool {
        self.kind == "html"
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A text pass over generated pages.
///
/// Rewriters never fail: anything they cannot handle is logged and left as
/// is, and a page with nothing to change comes back byte-identical.
pub trait PageRewriter {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// A new generation pass starts; drop pass-scoped state.
    fn begin_pass(&mut self) {}

    /// Rewritten text of `page`.
    fn rewrite(&mut self, page: &Page, text: &str) -> String;
}

/// Site-wide configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    /// Root of the generated site.
    pub root: PathBuf,
    /// URL prefix under which media is served.
    pub media_url: String,
    /// Directory `media_url` maps to; `root/media` when unset.
    pub media_root: Option<PathBuf>,
    /// Generation mode.
    pub mode: Mode,
    /// Run the image sizer.
    pub sizer: bool,
    /// Run the figure wrapper.
    pub figure: bool,
    /// Selector for the figure wrapper.
    pub figure_selector: Selector,
    /// Report changes without writing files.
    pub dry_run: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("deploy"),
            media_url: "/media/".to_string(),
            media_root: None,
            mode: Mode::default(),
            sizer: true,
            figure: true,
            figure_selector: FigureOptions::default().selector,
            dry_run: false,
        }
    }
}

impl SiteConfig {
    /// Defaults rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Override media URL prefix and directory.
    pub fn with_media(mut self, media_url: impl Into<String>, media_root: Option<PathBuf>) -> Self {
        self.media_url = media_url.into();
        self.media_root = media_root;
        self
    }

    /// Override the mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable the sizer.
    pub fn with_sizer(mut self, enabled: bool) -> Self {
        self.sizer = enabled;
        self
    }

    /// Enable or disable the figure wrapper.
    pub fn with_figure(mut self, enabled: bool) -> Self {
        self.figure = enabled;
        self
    }

    /// Override the figure selector.
    pub fn with_figure_selector(mut self, selector: Selector) -> Self {
        self.figure_selector = selector;
        self
    }

    /// Toggle dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Effective media directory.
    pub fn media_root_path(&self) -> PathBuf {
        self.media_root
            .clone()
            .unwrap_or_else(|| self.root.join("media"))
    }
}

/// Counters for one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Markup pages visited.
    pub pages: usize,
    /// Pages whose text changed.
    pub changed: usize,
    /// Pages skipped because they were not UTF-8.
    pub skipped: usize,
}

/// Ordered list of page rewriters.
pub struct Pipeline {
    rewriters: Vec<Box<dyn PageRewriter>>,
    dry_run: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.rewriters.iter().map(|r| r.name()).collect();
        f.debug_struct("Pipeline")
            .field("rewriters", &names)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Pipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self {
            rewriters: Vec::new(),
            dry_run: false,
        }
    }

    /// Sizer then figure wrapper, as enabled in `config`.
    pub fn from_config(config: &SiteConfig) -> Self {
        let mut pipeline = Self::new().with_dry_run(config.dry_run);
        if config.sizer {
            let resolver = SiteResolver::new(config.root.clone())
                .with_media(config.media_url.clone(), config.media_root_path());
            pipeline.push(ImageSizer::with_options(
                resolver,
                HeaderProber::new(),
                DimensionCache::new(),
                SizerOptions::default().with_mode(config.mode.clone()),
            ));
        }
        if config.figure {
            pipeline.push(ImageFigure::new(
                FigureOptions::default().with_selector(config.figure_selector.clone()),
            ));
        }
        pipeline
    }

    /// Append a rewriter.
    pub fn push<R: PageRewriter + 'static>(&mut self, rewriter: R) {
        self.rewriters.push(Box::new(rewriter));
    }

    /// Builder form of [`Pipeline::push`].
    pub fn with<R: PageRewriter + 'static>(mut self, rewriter: R) -> Self {
        self.push(rewriter);
        self
    }

    /// Report changes without writing files.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Number of rewriters.
    pub fn len(&self) -> usize {
        self.rewriters.len()
    }

    /// True when no rewriter is installed.
    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }

    /// Start a pass: every rewriter drops pass-scoped state.
    pub fn begin_pass(&mut self) {
        for rewriter in &mut self.rewriters {
            rewriter.begin_pass();
        }
    }

    /// Run every rewriter over `text`, in order.
    pub fn rewrite_page(&mut self, page: &Page, text: &str) -> String {
        let mut current = text.to_string();
        for rewriter in &mut self.rewriters {
            current = rewriter.rewrite(page, &current);
        }
        current
    }

    /// Rewrite one file in place. Returns whether its text changed.
    pub fn rewrite_file(&mut self, path: &Path) -> Result<bool, SiteError> {
        let bytes = fs::read(path).map_err(|err| SiteError::io(path, err))?;
        let text = String::from_utf8(bytes).map_err(|_| SiteError::NotUtf8 {
            path: path.display().to_string().into_boxed_str(),
        })?;
        let page = Page::new(path);
        let out = self.rewrite_page(&page, &text);
        if out == text {
            return Ok(false);
        }
        if self.dry_run {
            log::info!("Would rewrite {}", page);
        } else {
            fs::write(path, out.as_bytes()).map_err(|err| SiteError::io(path, err))?;
            log::debug!("Rewrote {}", page);
        }
        Ok(true)
    }

    /// One generation pass over every `.html` file below `dir`.
    pub fn rewrite_tree(&mut self, dir: &Path) -> Result<PassReport, SiteError> {
        self.begin_pass();
        self.rewrite_dir(dir)
    }

    /// Rewrite every `.html` file below `dir` within the current pass.
    ///
    /// Pass-scoped caches are kept, so several directories handled after one
    /// [`Pipeline::begin_pass`] share them.
    pub fn rewrite_dir(&mut self, dir: &Path) -> Result<PassReport, SiteError> {
        let mut files = Vec::new();
        collect_pages(dir, &mut files)?;
        let mut report = PassReport::default();
        for path in files {
            report.pages += 1;
            match self.rewrite_file(&path) {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(err @ SiteError::NotUtf8 { .. }) => {
                    log::warn!("Skipping page: {}", err);
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        log::info!(
            "Pass over {}: {} page(s), {} changed, {} skipped",
            dir.display(),
            report.pages,
            report.changed,
            report.skipped
        );
        Ok(report)
    }
}

/// Markup pages below `dir`, in sorted order.
fn collect_pages(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SiteError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| SiteError::io(dir, err))? {
        let entry = entry.map_err(|err| SiteError::io(dir, err))?;
        entries.push(entry.path());
    }
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_pages(&path, out)?;
        } else if Page::new(&path).is_html() {
            out.push(path);
        }
    }
    Ok(())
}

/// Async form of [`Pipeline::rewrite_file`] using tokio's filesystem API.
#[cfg(feature = "async")]
pub async fn rewrite_file_async(pipeline: &mut Pipeline, path: &Path) -> Result<bool, SiteError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| SiteError::io(path, err))?;
    let text = String::from_utf8(bytes).map_err(|_| SiteError::NotUtf8 {
        path: path.display().to_string().into_boxed_str(),
    })?;
    let page = Page::new(path);
    let out = pipeline.rewrite_page(&page, &text);
    if out == text {
        return Ok(false);
    }
    if !pipeline.dry_run {
        tokio::fs::write(path, out.as_bytes())
            .await
            .map_err(|err| SiteError::io(path, err))?;
    }
    Ok(true)
}
