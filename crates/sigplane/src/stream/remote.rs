// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{OutputTransport, Packet, TransportError};
use crate::alloc::BufferManager;
use crate::config::DISCONNECT_TIMEOUT;
use crate::element::ElementKind;
use crate::props::Properties;
use crate::rpc::{Invocation, ObjectRef, WirePacket};
use crate::sri::SignalDescriptor;
use std::marker::PhantomData;
use std::sync::Arc;

/// Default transport: one substrate call per packet, bounded by the
/// configured transfer limit.
pub struct RemoteTransport<K: ElementKind> {
    objref: ObjectRef,
    allocator: Arc<BufferManager>,
    max_transfer_bytes: usize,
    _kind: PhantomData<K>,
}

impl<K: ElementKind> RemoteTransport<K> {
    pub fn new(objref: ObjectRef, allocator: Arc<BufferManager>, max_transfer_bytes: usize) -> Self {
        Self {
            objref,
            allocator,
            max_transfer_bytes,
            _kind: PhantomData,
        }
    }
}

impl<K: ElementKind> OutputTransport<K> for RemoteTransport<K> {
    fn transport_type(&self) -> &str {
        "remote"
    }

    fn transport_info(&self) -> Properties {
        let mut info = Properties::new();
        info.set("max_transfer_bytes", self.max_transfer_bytes as u64);
        info.set("peer", self.objref.describe());
        info
    }

    fn max_payload_bytes(&self) -> Option<usize> {
        K::is_chunkable().then_some(self.max_transfer_bytes)
    }

    fn push_sri(&mut self, sri: &SignalDescriptor) -> Result<(), TransportError> {
        self.objref.invoke(Invocation::PushSri(sri.clone()))?;
        Ok(())
    }

    fn push_packet(&mut self, packet: Packet<K>) -> Result<(), TransportError> {
        let wire = WirePacket::encode::<K>(&packet.payload, &self.allocator);
        self.objref.invoke(Invocation::PushPacket {
            packet: wire,
            time: packet.time,
            eos: packet.eos,
            stream_id: packet.stream_id,
        })?;
        Ok(())
    }

    fn begin_disconnect(&mut self) {
        self.objref.set_call_timeout(Some(DISCONNECT_TIMEOUT));
    }
}
