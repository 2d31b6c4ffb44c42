//! Depth tracking for save/restore passes.
//!
//! While any pass is running, registry mutation entry points become no-ops
//! so the pass does not react to state changes it causes itself (an iterator
//! restored mid-pass re-creating its children, for example). Nested passes
//! just deepen the count; only the outermost guard returns it to zero.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared pass depth. Clones observe the same count.
#[derive(Debug, Clone, Default)]
pub struct PassDepth {
    depth: Arc<AtomicUsize>,
}

impl PassDepth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a pass; it ends when the returned guard drops.
    pub fn enter(&self) -> PassGuard {
        self.depth.fetch_add(1, Ordering::AcqRel);
        PassGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    /// True while any pass is in progress.
    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

#[must_use = "the pass ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PassGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}
