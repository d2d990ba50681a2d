// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-thread block cache and the block handle it hands out.
//!
//! A [`BufferCache`] is owned jointly by its thread (through thread-local
//! storage) and by every [`CachedBlock`] it allocated; the `Arc` strong count
//! is the reference count. Blocks may be dropped on any thread, so the cache
//! state sits behind a mutex that is uncontended in the common case.

use super::manager::ManagerShared;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Stored block, most recently used at the front of the list.
struct CacheNode {
    storage: Box<[u8]>,
    last_used: usize,
}

struct CacheState {
    nodes: VecDeque<CacheNode>,
    enabled: bool,
    /// Incremented on every store; ages are measured in these ticks.
    time: usize,
    max_bytes: usize,
    max_blocks: usize,
    max_age: usize,
    current_bytes: usize,
    hits: usize,
    misses: usize,
}

impl CacheState {
    fn over_threshold(&self) -> bool {
        let Some(oldest) = self.nodes.back() else {
            return false;
        };
        if !self.enabled {
            return true;
        }
        let age = self.time - oldest.last_used;
        age > self.max_age || self.current_bytes > self.max_bytes || self.nodes.len() > self.max_blocks
    }

    /// Evict least recently used blocks until every limit holds.
    ///
    /// Returns the number of bytes released.
    fn compact(&mut self) -> usize {
        let previous = self.current_bytes;
        while self.over_threshold() {
            if let Some(node) = self.nodes.pop_back() {
                self.current_bytes -= node.storage.len();
            }
        }
        previous - self.current_bytes
    }
}

/// Limits applied to one thread's cache.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheLimits {
    pub max_bytes: usize,
    pub max_blocks: usize,
    pub max_age: usize,
}

pub(crate) struct BufferCache {
    manager: Arc<ManagerShared>,
    state: Mutex<CacheState>,
}

impl BufferCache {
    pub(crate) fn new(manager: Arc<ManagerShared>, limits: CacheLimits) -> Self {
        Self {
            manager,
            state: Mutex::new(CacheState {
                nodes: VecDeque::new(),
                enabled: true,
                time: 0,
                max_bytes: limits.max_bytes,
                max_blocks: limits.max_blocks,
                max_age: limits.max_age,
                current_bytes: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub(crate) fn manager(&self) -> &Arc<ManagerShared> {
        &self.manager
    }

    /// Most recently used block of exactly `bytes` capacity.
    pub(crate) fn fetch(&self, bytes: usize) -> Option<Box<[u8]>> {
        let mut state = self.state.lock();
        let position = state.nodes.iter().position(|node| node.storage.len() == bytes);
        let Some(node) = position.and_then(|index| state.nodes.remove(index)) else {
            state.misses += 1;
            return None;
        };
        state.hits += 1;
        state.current_bytes -= bytes;
        drop(state);
        self.manager.decrease_size(bytes);
        Some(node.storage)
    }

    pub(crate) fn store(&self, storage: Box<[u8]>) {
        let bytes = storage.len();
        let mut state = self.state.lock();
        state.time += 1;
        let last_used = state.time;
        state.nodes.push_front(CacheNode { storage, last_used });
        state.current_bytes += bytes;
        self.manager.increase_size(bytes);
        let released = state.compact();
        drop(state);
        self.manager.decrease_size(released);
    }

    pub(crate) fn enable(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.enabled = enabled;
        let released = if enabled { 0 } else { state.compact() };
        drop(state);
        self.manager.decrease_size(released);
    }

    pub(crate) fn set_limits(&self, limits: CacheLimits) {
        let mut state = self.state.lock();
        state.max_bytes = limits.max_bytes;
        state.max_blocks = limits.max_blocks;
        state.max_age = limits.max_age;
        let released = state.compact();
        drop(state);
        self.manager.decrease_size(released);
    }

    /// `(hits, misses, blocks)` snapshot.
    pub(crate) fn counters(&self) -> (usize, usize, usize) {
        let state = self.state.lock();
        (state.hits, state.misses, state.nodes.len())
    }
}

impl Drop for BufferCache {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.enabled = false;
        let released = state.compact();
        let (hits, misses) = (state.hits, state.misses);
        self.manager.decrease_size(released);
        self.manager.retire_cache(hits, misses);
    }
}

/// Memory block handed out by [`BufferManager::allocate`](super::BufferManager::allocate).
///
/// Dereferences to the requested length; the underlying capacity is the
/// size class the request was rounded to. Dropping the block returns it to
/// the cache of the thread that allocated it.
pub struct CachedBlock {
    storage: Box<[u8]>,
    len: usize,
    cache: Option<Arc<BufferCache>>,
}

impl CachedBlock {
    pub(crate) fn new(storage: Box<[u8]>, len: usize, cache: Option<Arc<BufferCache>>) -> Self {
        Self {
            storage,
            len,
            cache,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size-class capacity of the block.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Shrink the visible length (never grows past the requested size class).
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// True when the block will be offered back to a thread cache on drop.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }
}

impl Deref for CachedBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage[..self.len]
    }
}

impl DerefMut for CachedBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage[..self.len]
    }
}

impl Drop for CachedBlock {
    fn drop(&mut self) {
        let Some(cache) = self.cache.take() else {
            return;
        };
        // Sole owner: the cache's thread is gone and this was its last block.
        // Dropping the Arc destroys the cache and the storage is freed.
        let cache = match Arc::try_unwrap(cache) {
            Ok(orphan) => {
                drop(orphan);
                return;
            }
            Err(shared) => shared,
        };
        if cache.manager().enabled.load(Ordering::Acquire) {
            cache.store(std::mem::take(&mut self.storage));
        }
    }
}

impl fmt::Debug for CachedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedBlock")
            .field("len", &self.len)
            .field("capacity", &self.storage.len())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
