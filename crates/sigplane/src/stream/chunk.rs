// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Splitting of payloads into transport-sized sub-packets.

use crate::config::PUSH_SIZE_MARGIN;

/// Largest element count per push that fits `limit_bytes`.
///
/// Only [`PUSH_SIZE_MARGIN`] of the limit is used for samples. The result is
/// a multiple of `frame_size` so that frames (and complex pairs) are never
/// split; if not even one frame fits, it is a multiple of `item_size`, and
/// never less than one item.
pub fn max_samples_per_push(
    limit_bytes: usize,
    wire_bits: u32,
    item_size: usize,
    frame_size: usize,
) -> usize {
    let usable_bytes = (limit_bytes as f64 * PUSH_SIZE_MARGIN).floor() as usize;
    let samples = usable_bytes * 8 / (wire_bits.max(1) as usize);
    let item_size = item_size.max(1);
    let frame_size = frame_size.max(item_size);

    let framed = (samples / frame_size) * frame_size;
    if framed > 0 {
        return framed;
    }
    ((samples / item_size) * item_size).max(item_size)
}

/// Element range of one sub-packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubPacket {
    pub start: usize,
    pub end: usize,
    /// This is the final sub-packet of the push.
    pub last: bool,
}

impl SubPacket {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Iterator over the sub-packets of a push of `total` elements.
///
/// Always yields at least one sub-packet, so an empty end-of-stream push
/// still reaches the transport.
#[derive(Debug, Clone)]
pub struct Chunker {
    total: usize,
    max: usize,
    next: usize,
    done: bool,
}

impl Chunker {
    pub fn new(total: usize, max_per_push: usize) -> Self {
        Self {
            total,
            max: max_per_push.max(1),
            next: 0,
            done: false,
        }
    }

    /// Whole payload in a single sub-packet.
    pub fn single(total: usize) -> Self {
        Self::new(total, total)
    }
}

impl Iterator for Chunker {
    type Item = SubPacket;

    fn next(&mut self) -> Option<SubPacket> {
        if self.done {
            return None;
        }
        let start = self.next;
        let end = start + (self.total - start).min(self.max);
        self.next = end;
        self.done = end >= self.total;
        Some(SubPacket {
            start,
            end,
            last: self.done,
        })
    }
}
