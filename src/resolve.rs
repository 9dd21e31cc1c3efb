//! Map an `<img src>` to a file in the generated site.

extern crate alloc;

use alloc::string::{String, ToString};
use std::path::{Path, PathBuf};

use crate::site::Page;

/// File kinds whose pixel size can be probed.
pub const RASTER_KINDS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// A local file an `src` points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    /// Lowercase file extension, empty when there is none.
    pub kind: String,
    /// Filesystem path.
    pub path: PathBuf,
}

impl Resource {
    /// Resource at `path`, kind taken from its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self { kind, path }
    }

    /// True for [`RASTER_KINDS`].
    pub fn is_raster(&self) -> bool {
        RASTER_KINDS.contains(&self.kind.as_str())
    }
}

/// Outcome of resolving an `src`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// Points at a local file.
    Local(Resource),
    /// Points off-site (`scheme://` or `//`).
    Remote,
    /// Nothing on disk matches.
    Unknown,
}

/// Asset lookup used by the image sizer.
pub trait AssetResolver {
    /// Resolve `src` as written in `page`.
    fn resolve(&self, src: &str, page: &Page) -> Resolved;
}

/// True for `scheme://…` and protocol-relative `//…` locators.
pub fn is_remote(src: &str) -> bool {
    if src.starts_with("//") {
        return true;
    }
    match src.find("://") {
        Some(idx) => idx > 0 && src[..idx].bytes().all(|b| b.is_ascii_lowercase()),
        None => false,
    }
}

/// `src` without its `?query` and `#fragment`.
pub fn strip_suffixes(src: &str) -> &str {
    let end = src.find(['?', '#']).unwrap_or(src.len());
    &src[..end]
}

/// Resolver over a generated site on disk.
///
/// * `src` starting with `media_url` maps into `media_root`;
/// * remote locators are reported as [`Resolved::Remote`];
/// * `/`-absolute paths resolve against the site root;
/// * anything else resolves against the page's folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteResolver {
    root: PathBuf,
    media_url: String,
    media_root: PathBuf,
}

impl SiteResolver {
    /// Resolver rooted at `root`, with media served from `/media/` out of
    /// `root/media`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            media_root: root.join("media"),
            media_url: "/media/".to_string(),
            root,
        }
    }

    /// Override the media URL prefix and the directory it maps to.
    pub fn with_media(mut self, media_url: impl Into<String>, media_root: impl Into<PathBuf>) -> Self {
        self.media_url = media_url.into();
        self.media_root = media_root.into();
        self
    }

    /// Site root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path `src` points at, before checking that it exists.
    pub fn locate(&self, src: &str, page: &Page) -> Option<PathBuf> {
        let src = strip_suffixes(src);
        if src.is_empty() {
            return None;
        }
        if !self.media_url.is_empty() {
            if let Some(rest) = src.strip_prefix(self.media_url.as_str()) {
                return Some(self.media_root.join(rest.trim_start_matches('/')));
            }
        }
        if is_remote(src) {
            return None;
        }
        if let Some(rest) = src.strip_prefix('/') {
            return Some(self.root.join(rest.trim_start_matches('/')));
        }
        let folder = page.path.parent().unwrap_or(&self.root);
        Some(folder.join(src))
    }
}

impl AssetResolver for SiteResolver {
    fn resolve(&self, src: &str, page: &Page) -> Resolved {
        let Some(path) = self.locate(src, page) else {
            return if is_remote(src) {
                Resolved::Remote
            } else {
                Resolved::Unknown
            };
        };
        if path.is_file() {
            Resolved::Local(Resource::from_path(path))
        } else {
            log::debug!("[{}] src {} maps to missing {}", page, src, path.display());
            Resolved::Unknown
        }
    }
}
