// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;
use std::sync::Arc;

/// Packed bit sequence, most significant bit first.
///
/// Like [`SharedBuffer`](super::SharedBuffer), slices share storage; a slice
/// may start at any bit offset.
#[derive(Clone)]
pub struct BitBuffer {
    data: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl BitBuffer {
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new(), 0)
    }

    /// Wrap packed bytes holding `bits` bits (clamped to the byte length).
    pub fn from_bytes(bytes: Vec<u8>, bits: usize) -> Self {
        let len = bits.min(bytes.len() * 8);
        Self {
            data: Arc::from(bytes),
            offset: 0,
            len,
        }
    }

    pub fn from_bools(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (index, _) in bits.iter().enumerate().filter(|(_, bit)| **bit) {
            bytes[index / 8] |= 0x80 >> (index % 8);
        }
        Self::from_bytes(bytes, bits.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit at `index`; `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        let absolute = self.offset + index;
        Some(self.data[absolute / 8] & (0x80 >> (absolute % 8)) != 0)
    }

    /// Bit range `[start, end)`, clamped to the buffer.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len);
        let start = start.min(end);
        Self {
            data: Arc::clone(&self.data),
            offset: self.offset + start,
            len: end - start,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Bytes needed to hold the bits once realigned to offset 0.
    #[inline]
    pub fn packed_len(&self) -> usize {
        self.len.div_ceil(8)
    }

    /// Realign to bit offset 0 into `out` (at least `packed_len()` bytes).
    pub fn pack_into(&self, out: &mut [u8]) {
        let packed = self.packed_len().min(out.len());
        out[..packed].fill(0);
        for (index, bit) in self.iter().enumerate() {
            if bit && index / 8 < packed {
                out[index / 8] |= 0x80 >> (index % 8);
            }
        }
    }
}

impl PartialEq for BitBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuffer(")?;
        for bit in self.iter() {
            write!(f, "{}", u8::from(bit))?;
        }
        write!(f, ")")
    }
}
