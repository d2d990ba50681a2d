// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer cache: per-thread recycling of sample blocks.
//!
//! # Architecture
//!
//! ```text
//! BufferManager ──registry (Weak)──► BufferCache (thread A) ◄──Arc── CachedBlock
//!       │                            BufferCache (thread B) ◄──Arc── CachedBlock
//!       └── limits, enabled flag, folded counters
//! ```
//!
//! - Each thread lazily gets one [`BufferCache`](cache) per manager, held in
//!   thread-local storage.
//! - Every block keeps a strong reference to the cache that allocated it, so
//!   a cache outlives its thread until the last block is released.
//! - Blocks are kept most-recently-used first; compaction evicts from the
//!   least recently used end when a byte, block-count or age limit is
//!   exceeded, and evicts everything while caching is disabled.
//! - The manager keeps only weak references; a destroyed cache folds its
//!   hit/miss counters into the manager.
//! - Dropping the manager empties every cache at once. The dropping thread
//!   releases its own cache immediately; an idle thread releases its entry on
//!   its next allocation or at exit.

mod cache;
mod manager;

pub use cache::CachedBlock;
pub use manager::{AllocatorStatistics, BufferManager};
