// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::element::ElementKind;
use crate::sri::SignalDescriptor;
use crate::time::TimeValue;
use std::fmt;
use std::sync::Arc;

/// One unit of stream data.
pub struct Packet<K: ElementKind> {
    pub payload: K::Buffer,
    /// Time of the first sample.
    pub time: TimeValue,
    /// Last packet of the stream.
    pub eos: bool,
    pub stream_id: String,
    /// Descriptor in force for this packet.
    pub sri: Arc<SignalDescriptor>,
    /// First packet since `sri` changed.
    pub sri_changed: bool,
}

impl<K: ElementKind> Packet<K> {
    pub fn element_count(&self) -> usize {
        K::element_count(&self.payload)
    }

    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }
}

impl<K: ElementKind> Clone for Packet<K> {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            time: self.time,
            eos: self.eos,
            stream_id: self.stream_id.clone(),
            sri: Arc::clone(&self.sri),
            sri_changed: self.sri_changed,
        }
    }
}

impl<K: ElementKind> fmt::Debug for Packet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("kind", &K::NAME)
            .field("elements", &self.element_count())
            .field("time", &self.time)
            .field("eos", &self.eos)
            .field("stream_id", &self.stream_id)
            .field("sri_changed", &self.sri_changed)
            .finish()
    }
}
