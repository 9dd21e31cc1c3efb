//! Pass-scoped memo of probed image dimensions.
//!
//! Each `src` is probed at most once per generation pass: the first lookup
//! records either the dimensions or a failure sentinel, and every later
//! lookup reuses that entry. Call [`DimensionStore::reset`] when a new pass
//! starts.

extern crate alloc;

use alloc::string::{String, ToString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ProbeError;

/// Cached probe result for one `src`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CachedSize {
    /// Intrinsic pixel size.
    Known {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// The probe failed; do not retry within this pass.
    Failed,
}

impl CachedSize {
    /// Width and height when both are known and non-zero.
    pub fn usable(self) -> Option<(u32, u32)> {
        match self {
            Self::Known { width, height } if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        }
    }
}

/// Lookup-or-populate storage for probed dimensions.
pub trait DimensionStore {
    /// Cached entry for `src`, running `probe` only when none exists yet.
    fn get_or_probe<F>(&mut self, src: &str, probe: F) -> CachedSize
    where
        F: FnOnce() -> Result<(u32, u32), ProbeError>;

    /// Drop every entry at the start of a pass.
    fn reset(&mut self);

    /// Number of cached entries.
    fn len(&self) -> usize;

    /// True when nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn probe_entry<F>(src: &str, probe: F) -> CachedSize
where
    F: FnOnce() -> Result<(u32, u32), ProbeError>,
{
    match probe() {
        Ok((width, height)) => {
            log::debug!("Image [{}] is {}x{}", src, width, height);
            CachedSize::Known { width, height }
        }
        Err(err) => {
            log::warn!("Unable to process image [{}]: {}", src, err);
            CachedSize::Failed
        }
    }
}

/// Single-threaded cache owned by one rewriter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimensionCache {
    entries: HashMap<String, CachedSize>,
}

impl DimensionCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `src` without probing.
    pub fn get(&self, src: &str) -> Option<CachedSize> {
        self.entries.get(src).copied()
    }
}

impl DimensionStore for DimensionCache {
    fn get_or_probe<F>(&mut self, src: &str, probe: F) -> CachedSize
    where
        F: FnOnce() -> Result<(u32, u32), ProbeError>,
    {
        if let Some(hit) = self.entries.get(src) {
            return *hit;
        }
        let entry = probe_entry(src, probe);
        self.entries.insert(src.to_string(), entry);
        entry
    }

    fn reset(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache shared between workers rewriting pages in parallel.
///
/// Clones share one map. The lock is held across lookup and probe, so two
/// workers racing on the same `src` still probe it once.
#[derive(Clone, Debug, Default)]
pub struct SharedDimensionCache {
    inner: Arc<Mutex<DimensionCache>>,
}

impl SharedDimensionCache {
    /// Empty shared cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `src` without probing.
    pub fn get(&self, src: &str) -> Option<CachedSize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(src)
    }
}

impl DimensionStore for SharedDimensionCache {
    fn get_or_probe<F>(&mut self, src: &str, probe: F) -> CachedSize
    where
        F: FnOnce() -> Result<(u32, u32), ProbeError>,
    {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_probe(src, probe)
    }

    fn reset(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn probes_each_src_once_per_pass() {
        let mut cache = DimensionCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let size = cache.get_or_probe("a.png", || {
                calls += 1;
                Ok((200, 50))
            });
            assert_eq!(size, CachedSize::Known { width: 200, height: 50 });
        }
        assert_eq!(calls, 1);
        cache.reset();
        assert!(cache.is_empty());
        cache.get_or_probe("a.png", || {
            calls += 1;
            Ok((200, 50))
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn failures_are_cached_as_sentinel() {
        let mut cache = DimensionCache::new();
        let first = cache.get_or_probe("broken.png", || {
            Err(ProbeError::new("PROBE_UNKNOWN_FORMAT", "not an image"))
        });
        assert_eq!(first, CachedSize::Failed);
        let second = cache.get_or_probe("broken.png", || {
            panic!("failed entries must not be re-probed")
        });
        assert_eq!(second, CachedSize::Failed);
        assert_eq!(cache.get("broken.png"), Some(CachedSize::Failed));
    }

    #[test]
    fn degenerate_sizes_are_not_usable() {
        assert_eq!(CachedSize::Known { width: 0, height: 10 }.usable(), None);
        assert_eq!(CachedSize::Known { width: 10, height: 0 }.usable(), None);
        assert_eq!(CachedSize::Failed.usable(), None);
        assert_eq!(
            CachedSize::Known { width: 3, height: 4 }.usable(),
            Some((3, 4))
        );
    }

    #[test]
    fn shared_cache_probes_once_across_threads() {
        let cache = SharedDimensionCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let mut cache = cache.clone();
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache.get_or_probe("shared.png", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok((64, 32))
                    })
                })
            })
            .collect();
        for worker in workers {
            let size = worker.join().expect("worker should not panic");
            assert_eq!(size, CachedSize::Known { width: 64, height: 32 });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
