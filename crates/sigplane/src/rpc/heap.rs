// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared-memory heap interface used by the negotiated `shmipc` transport.
//!
//! Segment creation and mapping belong to the platform layer; the data plane
//! only needs to allocate a block, fill it, name it to the peer and release
//! it.

use std::fmt;

/// Location of a block inside a shared heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef {
    pub heap_id: u64,
    pub offset: usize,
    pub len: usize,
}

/// Shared heap errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Not enough free space for the request.
    Exhausted { requested: usize },
    /// Reference does not name a live block of this heap.
    InvalidRef(HeapRef),
    /// Source does not fit the block.
    SizeMismatch { block: usize, data: usize },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::Exhausted { requested } => {
                write!(f, "shared heap exhausted ({} bytes requested)", requested)
            }
            HeapError::InvalidRef(block) => write!(
                f,
                "invalid heap block {}:{}+{}",
                block.heap_id, block.offset, block.len
            ),
            HeapError::SizeMismatch { block, data } => {
                write!(f, "{} bytes do not fit a {}-byte block", data, block)
            }
        }
    }
}

impl std::error::Error for HeapError {}

/// Memory shared between processes on one host.
pub trait SharedHeap: Send + Sync {
    fn heap_id(&self) -> u64;
    fn allocate(&self, bytes: usize) -> Result<HeapRef, HeapError>;
    fn copy_into(&self, block: &HeapRef, bytes: &[u8]) -> Result<(), HeapError>;
    fn read(&self, block: &HeapRef) -> Result<Vec<u8>, HeapError>;
    fn deallocate(&self, block: HeapRef);
}

/// Identifier of this host, used to decide whether two endpoints can share memory.
///
/// On Linux, hashes `/etc/machine-id`; falls back to the `HOSTNAME`
/// environment variable, then to a fixed value.
#[must_use]
pub fn host_id() -> u32 {
    if let Ok(content) = std::fs::read_to_string("/etc/machine-id") {
        return fnv1a(content.trim());
    }
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        return fnv1a(&hostname);
    }
    0x5167_0001
}

fn fnv1a(s: &str) -> u32 {
    s.bytes().fold(2_166_136_261u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(16_777_619)
    })
}
