use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counting allocator for peak-memory guardrails.
pub struct BudgetAlloc {
    current: AtomicUsize,
    peak: AtomicUsize,
    count: AtomicUsize,
}

/// Allocation figures for one measured closure.
#[derive(Clone, Copy, Debug)]
pub struct Measured {
    /// Highest live byte count above the starting point.
    pub peak_bytes: usize,
    /// Allocations (including reallocations) performed.
    pub allocations: usize,
}

impl BudgetAlloc {
    pub const fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        }
    }

    /// Run `f`, reporting peak bytes relative to what was live before it.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> (T, Measured) {
        let baseline = self.current.load(Ordering::SeqCst);
        self.peak.store(baseline, Ordering::SeqCst);
        let count_before = self.count.load(Ordering::SeqCst);
        let out = f();
        let measured = Measured {
            peak_bytes: self.peak.load(Ordering::SeqCst).saturating_sub(baseline),
            allocations: self.count.load(Ordering::SeqCst) - count_before,
        };
        (out, measured)
    }

    fn add_current(&self, bytes: usize) {
        let new = self.current.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.peak.fetch_max(new, Ordering::SeqCst);
    }

    fn sub_current(&self, bytes: usize) {
        let _ = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(bytes))
            });
    }
}

unsafe impl GlobalAlloc for BudgetAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            self.add_current(layout.size());
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        self.sub_current(layout.size());
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            self.add_current(layout.size());
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                self.add_current(new_size - layout.size());
            } else {
                self.sub_current(layout.size() - new_size);
            }
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        new_ptr
    }
}
