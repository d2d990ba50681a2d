// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::alloc::{BufferManager, CachedBlock};
use crate::element::{ElementFormat, ElementKind};
use std::fmt;

/// Encoded sample payload as carried by [`Invocation::PushPacket`](super::Invocation::PushPacket).
///
/// The bytes live in a block from the [`BufferManager`], so steady-state
/// pushes of the same size reuse the same storage.
pub struct WirePacket {
    pub format: ElementFormat,
    /// Number of elements encoded.
    pub count: usize,
    bytes: CachedBlock,
}

impl WirePacket {
    pub fn encode<K: ElementKind>(buffer: &K::Buffer, allocator: &BufferManager) -> Self {
        let mut bytes = allocator.allocate(K::wire_len(buffer));
        K::encode(buffer, &mut bytes);
        Self {
            format: K::FORMAT,
            count: K::element_count(buffer),
            bytes,
        }
    }

    /// Decode as kind `K`; `None` on format or length mismatch.
    pub fn decode<K: ElementKind>(&self) -> Option<K::Buffer> {
        if self.format != K::FORMAT {
            return None;
        }
        K::decode(&self.bytes, self.count)
    }

    /// Encoded payload size in bytes.
    #[inline]
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for WirePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WirePacket")
            .field("format", &self.format)
            .field("count", &self.count)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
