use crate::protocol::Headers;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A response kept for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Arc<[u8]>,
    pub headers: Headers,
}

/// Per-route response cache.
///
/// With `rate = N > 0` the response that populates the cache counts as the
/// first of `N` servings; the next `N - 1` requests replay it and the one
/// after regenerates it. `0` and negative rates never cache.
///
/// Reads and writes are lock-free. Concurrent refreshes race benignly: the
/// last writer wins.
#[derive(Debug)]
pub struct RouteCache {
    rate: i64,
    snapshot: ArcSwapOption<CachedResponse>,
    served: AtomicI64,
}

impl RouteCache {
    #[must_use]
    pub fn new(rate: i64) -> Self {
        Self {
            rate,
            snapshot: ArcSwapOption::empty(),
            served: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub fn rate(&self) -> i64 {
        self.rate
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.rate > 0
    }

    /// The cached response, if it may still be served. Counts the serving.
    #[must_use]
    pub fn lookup(&self) -> Option<Arc<CachedResponse>> {
        if !self.is_enabled() {
            return None;
        }
        let snapshot = self.snapshot.load_full()?;
        if self.served.fetch_add(1, Ordering::AcqRel) < self.rate {
            Some(snapshot)
        } else {
            None
        }
    }

    /// Replace the snapshot with a freshly generated response.
    pub fn store(&self, response: CachedResponse) {
        if !self.is_enabled() {
            return;
        }
        self.snapshot.store(Some(Arc::new(response)));
        self.served.store(1, Ordering::Release);
    }
}
