// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::OutPort;
use crate::element::ElementKind;
use crate::error::Result;
use crate::props::Value;
use crate::sri::SignalDescriptor;
use crate::time::TimeValue;

/// Write handle for one stream of an [`OutPort`].
///
/// Descriptor setters only mark the stream modified; the port adopts the
/// descriptor on the next [`write`](OutputStream::write) and each connection
/// forwards it ahead of its packet. A connection that fails to take the
/// descriptor does not hold back the others.
pub struct OutputStream<'a, K: ElementKind> {
    port: &'a OutPort<K>,
    sri: SignalDescriptor,
    modified: bool,
}

impl<'a, K: ElementKind> OutputStream<'a, K> {
    pub(crate) fn new(port: &'a OutPort<K>, sri: SignalDescriptor) -> Self {
        Self {
            port,
            sri,
            modified: true,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.sri.stream_id
    }

    pub fn sri(&self) -> &SignalDescriptor {
        &self.sri
    }

    pub fn set_xdelta(&mut self, xdelta: f64) {
        self.sri.xdelta = xdelta;
        self.modified = true;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sri.set_sample_rate(sample_rate);
        self.modified = true;
    }

    pub fn set_complex(&mut self, complex: bool) {
        self.sri.complex = complex;
        self.modified = true;
    }

    pub fn set_subsize(&mut self, subsize: u32) {
        self.sri.subsize = subsize;
        self.modified = true;
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.sri.blocking = blocking;
        self.modified = true;
    }

    pub fn set_keyword(&mut self, id: impl Into<String>, value: impl Into<Value>) {
        self.sri.set_keyword(id, value);
        self.modified = true;
    }

    pub fn erase_keyword(&mut self, id: &str) {
        if self.sri.erase_keyword(id).is_some() {
            self.modified = true;
        }
    }

    pub fn write(&mut self, payload: K::Buffer, time: TimeValue) -> Result<()> {
        if self.modified {
            self.modified = false;
            return self.port.push(payload, time, false, &self.sri);
        }
        self.port.push_packet(payload, time, false, &self.sri.stream_id)
    }

    /// End the stream.
    pub fn close(self) -> Result<()> {
        if self.modified {
            return self
                .port
                .push(K::empty(), TimeValue::not_set(), true, &self.sri);
        }
        self.port.send_eos(&self.sri.stream_id)
    }
}
