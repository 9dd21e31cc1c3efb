use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_SITE: AtomicUsize = AtomicUsize::new(0);

/// Scratch site directory removed on drop.
pub struct TempSite {
    root: PathBuf,
}

impl TempSite {
    pub fn new(label: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "markup-splice-{}-{}-{}",
            label,
            std::process::id(),
            NEXT_SITE.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap_or_else(|e| panic!("create {}: {}", root.display(), e));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, bytes: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir {}: {}", parent.display(), e));
        }
        fs::write(&path, bytes).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
        path
    }

    pub fn read(&self, rel: &str) -> String {
        let path = self.path(rel);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e))
    }
}

impl Drop for TempSite {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Minimal PNG header (signature + IHDR) for a `width` x `height` image.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::from(&b"\x89PNG\r\n\x1a\n"[..]);
    out.extend_from_slice(&[0, 0, 0, 13]);
    out.extend_from_slice(b"IHDR");
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[8, 2, 0, 0, 0]);
    out
}

/// Minimal GIF header for a `width` x `height` image.
pub fn gif(width: u16, height: u16) -> Vec<u8> {
    let mut out = Vec::from(&b"GIF89a"[..]);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0]);
    out
}

/// A blog-like page: `posts` posts, each with `images_per_post` images, plus
/// one logo image outside every post.
pub fn blog_page(posts: usize, images_per_post: usize) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<body>\n<img src=\"/media/logo.png\" alt=\"logo\">\n");
    for post in 0..posts {
        html.push_str(&format!("<div class=\"post\" id=\"post-{}\">\n  <h2>Post {}</h2>\n", post, post));
        for image in 0..images_per_post {
            html.push_str(&format!(
                "  <p><img src=\"/media/photo.png\" alt=\"Photo {}.{}\"></p>\n",
                post, image
            ));
        }
        html.push_str("</div>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}
