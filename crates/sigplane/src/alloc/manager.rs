// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::cache::{BufferCache, CacheLimits, CachedBlock};
use crate::config::{
    BufferCacheConfig, RuntimeConfig, BLOCK_HEADER_BYTES, LARGE_BLOCK_ROUNDING, SMALL_BLOCK_LIMIT,
    SMALL_BLOCK_ROUNDING,
};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// This thread's cache for each live manager, keyed by manager id.
    static THREAD_CACHES: RefCell<Vec<(u64, Arc<BufferCache>)>> = const { RefCell::new(Vec::new()) };
}

/// Aggregate allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStatistics {
    /// Live per-thread caches.
    pub caches: usize,
    pub hits: usize,
    pub misses: usize,
    /// Blocks currently held by caches.
    pub blocks: usize,
    /// Bytes currently held by caches.
    pub bytes: usize,
    pub high_water_bytes: usize,
}

/// State shared between the manager handle and every cache it created.
pub(crate) struct ManagerShared {
    id: u64,
    pub(crate) enabled: AtomicBool,
    retired: AtomicBool,
    max_thread_bytes: AtomicUsize,
    max_thread_blocks: AtomicUsize,
    max_thread_age: AtomicUsize,
    caches: Mutex<Vec<Weak<BufferCache>>>,
    /// Counters folded in from destroyed caches and uncached allocations.
    hits: AtomicUsize,
    misses: AtomicUsize,
    current_bytes: AtomicUsize,
    high_water_bytes: AtomicUsize,
}

impl ManagerShared {
    fn limits(&self) -> CacheLimits {
        CacheLimits {
            max_bytes: self.max_thread_bytes.load(Ordering::Relaxed),
            max_blocks: self.max_thread_blocks.load(Ordering::Relaxed),
            max_age: self.max_thread_age.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn increase_size(&self, bytes: usize) {
        let current = self.current_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.high_water_bytes.fetch_max(current, Ordering::AcqRel);
    }

    pub(crate) fn decrease_size(&self, bytes: usize) {
        if bytes > 0 {
            self.current_bytes.fetch_sub(bytes, Ordering::AcqRel);
        }
    }

    /// Fold a dying cache's counters and drop it from the registry.
    pub(crate) fn retire_cache(&self, hits: usize, misses: usize) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
        self.caches.lock().retain(|cache| cache.strong_count() > 0);
    }

    /// Upgrade every live cache. The registry lock is released before the
    /// caller touches the caches, since dropping the last handle of a cache
    /// re-enters the registry.
    fn live_caches(&self) -> Vec<Arc<BufferCache>> {
        self.caches.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

/// Process-wide recycler of sample blocks.
///
/// Requests are rounded up to a size class (1 KiB steps up to 128 KiB, 4 KiB
/// steps above) and served from the calling thread's cache when a block of
/// that class is available. Blocks return to the cache of the thread that
/// allocated them, whichever thread drops them.
///
/// ```ignore
/// let manager = BufferManager::new();
/// let block = manager.allocate(4096);
/// drop(block);                       // back into this thread's cache
/// let again = manager.allocate(4096); // hit
/// assert_eq!(manager.statistics().hits, 1);
/// ```
pub struct BufferManager {
    shared: Arc<ManagerShared>,
}

impl BufferManager {
    /// Enabled manager with unbounded per-thread caches.
    pub fn new() -> Self {
        Self::with_config(&BufferCacheConfig::default())
    }

    pub fn with_config(config: &BufferCacheConfig) -> Self {
        let unbounded = |limit: Option<usize>| limit.unwrap_or(usize::MAX);
        Self {
            shared: Arc::new(ManagerShared {
                id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
                enabled: AtomicBool::new(config.enabled),
                retired: AtomicBool::new(false),
                max_thread_bytes: AtomicUsize::new(unbounded(config.max_thread_bytes)),
                max_thread_blocks: AtomicUsize::new(unbounded(config.max_thread_blocks)),
                max_thread_age: AtomicUsize::new(unbounded(config.max_thread_age)),
                caches: Mutex::new(Vec::new()),
                hits: AtomicUsize::new(0),
                misses: AtomicUsize::new(0),
                current_bytes: AtomicUsize::new(0),
                high_water_bytes: AtomicUsize::new(0),
            }),
        }
    }

    /// Process-wide manager, configured from [`RuntimeConfig::global`].
    ///
    /// Components take an `Arc<BufferManager>` so tests can substitute their
    /// own instance.
    pub fn global() -> Arc<BufferManager> {
        static GLOBAL: OnceLock<Arc<BufferManager>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            let config = RuntimeConfig::global().get();
            Arc::new(BufferManager::with_config(&config.buffer_cache))
        }))
    }

    /// Size class serving a request of `bytes`.
    pub fn nearest_size(bytes: usize) -> usize {
        let required = bytes + BLOCK_HEADER_BYTES;
        let rounded = if required <= SMALL_BLOCK_LIMIT {
            required.next_multiple_of(SMALL_BLOCK_ROUNDING)
        } else {
            required.next_multiple_of(LARGE_BLOCK_ROUNDING)
        };
        rounded - BLOCK_HEADER_BYTES
    }

    /// Block of at least `bytes` usable bytes; `len()` is exactly `bytes`.
    ///
    /// Contents are unspecified (a recycled block keeps its old bytes).
    pub fn allocate(&self, bytes: usize) -> CachedBlock {
        let size = Self::nearest_size(bytes);
        if !self.is_enabled() {
            self.shared.misses.fetch_add(1, Ordering::Relaxed);
            return CachedBlock::new(vec![0u8; size].into_boxed_slice(), bytes, None);
        }

        let Some(cache) = self.thread_cache() else {
            // Thread-local storage already torn down (thread exiting).
            self.shared.misses.fetch_add(1, Ordering::Relaxed);
            return CachedBlock::new(vec![0u8; size].into_boxed_slice(), bytes, None);
        };
        let storage = cache
            .fetch(size)
            .unwrap_or_else(|| vec![0u8; size].into_boxed_slice());
        CachedBlock::new(storage, bytes, Some(cache))
    }

    /// Return a block early; equivalent to dropping it.
    pub fn deallocate(&self, block: CachedBlock) {
        drop(block);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable caching; disabling empties every cache.
    pub fn enable(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Release);
        for cache in self.shared.live_caches() {
            cache.enable(enabled);
        }
        log::debug!("[BufferManager] caching {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn max_thread_bytes(&self) -> Option<usize> {
        bounded(self.shared.max_thread_bytes.load(Ordering::Relaxed))
    }

    pub fn max_thread_blocks(&self) -> Option<usize> {
        bounded(self.shared.max_thread_blocks.load(Ordering::Relaxed))
    }

    /// Maximum block age, in stores to the same cache.
    pub fn max_thread_age(&self) -> Option<usize> {
        bounded(self.shared.max_thread_age.load(Ordering::Relaxed))
    }

    pub fn set_max_thread_bytes(&self, bytes: Option<usize>) {
        self.shared
            .max_thread_bytes
            .store(bytes.unwrap_or(usize::MAX), Ordering::Relaxed);
        self.broadcast_limits();
    }

    pub fn set_max_thread_blocks(&self, blocks: Option<usize>) {
        self.shared
            .max_thread_blocks
            .store(blocks.unwrap_or(usize::MAX), Ordering::Relaxed);
        self.broadcast_limits();
    }

    pub fn set_max_thread_age(&self, age: Option<usize>) {
        self.shared
            .max_thread_age
            .store(age.unwrap_or(usize::MAX), Ordering::Relaxed);
        self.broadcast_limits();
    }

    pub fn statistics(&self) -> AllocatorStatistics {
        let caches = self.shared.live_caches();
        let mut stats = AllocatorStatistics {
            caches: caches.len(),
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            blocks: 0,
            bytes: self.shared.current_bytes.load(Ordering::Acquire),
            high_water_bytes: self.shared.high_water_bytes.load(Ordering::Acquire),
        };
        for cache in &caches {
            let (hits, misses, blocks) = cache.counters();
            stats.hits += hits;
            stats.misses += misses;
            stats.blocks += blocks;
        }
        stats
    }

    fn broadcast_limits(&self) {
        let limits = self.shared.limits();
        for cache in self.shared.live_caches() {
            cache.set_limits(limits);
        }
    }

    /// The calling thread's cache, created on first use.
    fn thread_cache(&self) -> Option<Arc<BufferCache>> {
        THREAD_CACHES
            .try_with(|slot| {
                let mut caches = slot.borrow_mut();
                caches.retain(|(_, cache)| !cache.manager().retired.load(Ordering::Acquire));
                if let Some((_, cache)) = caches.iter().find(|(id, _)| *id == self.shared.id) {
                    return Arc::clone(cache);
                }
                let cache = Arc::new(BufferCache::new(
                    Arc::clone(&self.shared),
                    self.shared.limits(),
                ));
                self.shared.caches.lock().push(Arc::downgrade(&cache));
                caches.push((self.shared.id, Arc::clone(&cache)));
                log::trace!("[BufferManager] new thread cache ({:?})", std::thread::current().id());
                cache
            })
            .ok()
    }
}

fn bounded(limit: usize) -> Option<usize> {
    (limit != usize::MAX).then_some(limit)
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Dropping the manager empties every live cache and releases the calling
/// thread's cache. Other threads release theirs on their next allocation from
/// any manager, or when they exit.
impl Drop for BufferManager {
    fn drop(&mut self) {
        self.shared.retired.store(true, Ordering::Release);
        self.shared.enabled.store(false, Ordering::Release);
        for cache in self.shared.live_caches() {
            cache.enable(false);
        }
        let id = self.shared.id;
        let _ = THREAD_CACHES.try_with(|slot| {
            if let Ok(mut caches) = slot.try_borrow_mut() {
                caches.retain(|(owner, _)| *owner != id);
            }
        });
    }
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("id", &self.shared.id)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(manager: &BufferManager) -> Weak<BufferCache> {
        manager.shared.caches.lock()[0].clone()
    }

    #[test]
    fn test_drop_releases_own_thread_cache() {
        let manager = BufferManager::new();
        drop(manager.allocate(100));
        let cache = registered(&manager);
        assert!(cache.upgrade().is_some());

        drop(manager);
        assert!(cache.upgrade().is_none());
        THREAD_CACHES.with(|slot| assert!(slot.borrow().is_empty()));
    }

    #[test]
    fn test_idle_thread_releases_on_next_allocation() {
        let manager = Arc::new(BufferManager::new());
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

        let worker = {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                drop(manager.allocate(100));
                drop(manager);
                ready_tx.send(()).expect("ready");
                go_rx.recv().expect("go");
                // Any allocation prunes caches of dropped managers.
                let other = BufferManager::new();
                drop(other.allocate(100));
                THREAD_CACHES.with(|slot| slot.borrow().len())
            })
        };

        ready_rx.recv().expect("worker ready");
        let cache = registered(&manager);
        drop(manager);
        // Still held by the idle worker, but emptied.
        let held = cache.upgrade().expect("idle worker keeps its cache");
        assert_eq!(held.counters().2, 0);
        drop(held);

        go_tx.send(()).expect("go");
        assert_eq!(worker.join().expect("worker thread"), 1);
        assert!(cache.upgrade().is_none());
    }
}
