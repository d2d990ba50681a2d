// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Negotiated transports.
//!
//! A [`TransportManager`] turns one transport offered by a negotiable peer
//! into an [`OutputTransport`]. Output ports match offers to registered
//! managers by name, highest [`priority`](TransportManager::priority) first.
//!
//! The built-in [`SharedHeapManager`] serves the `shmipc` transport: payload
//! bytes are written into a block of a [`SharedHeap`] visible to both
//! processes and only the block location crosses the substrate.

use super::{OutputTransport, Packet, TransportError};
use crate::alloc::BufferManager;
use crate::element::ElementKind;
use crate::error::{Error, Result};
use crate::props::{Properties, Value};
use crate::rpc::{
    host_id, Invocation, ObjectRef, RemoteFailure, Reply, SharedHeap, TransportDescription,
};
use crate::sri::SignalDescriptor;
use std::marker::PhantomData;
use std::sync::Arc;

/// Transport name of the shared-heap transport.
pub const SHARED_HEAP_TRANSPORT: &str = "shmipc";

/// Property carrying the advertising host's id.
pub const HOST_ID_PROPERTY: &str = "host_id";
/// Property carrying the shared heap id.
pub const HEAP_ID_PROPERTY: &str = "heap_id";

/// Builds transports for one negotiated transport type.
pub trait TransportManager<K: ElementKind>: Send + Sync {
    fn transport_type(&self) -> &str;

    /// Higher priority managers are tried first.
    fn priority(&self) -> i32 {
        0
    }

    /// `Ok(None)` declines the offer; the port then tries the next manager.
    fn negotiate(
        &self,
        objref: &ObjectRef,
        connection_id: &str,
        offer: &TransportDescription,
    ) -> Result<Option<Box<dyn OutputTransport<K>>>>;
}

/// Manager for the `shmipc` transport.
pub struct SharedHeapManager<K: ElementKind> {
    heap: Arc<dyn SharedHeap>,
    allocator: Arc<BufferManager>,
    host_id: u32,
    _kind: PhantomData<K>,
}

impl<K: ElementKind> SharedHeapManager<K> {
    pub fn new(heap: Arc<dyn SharedHeap>, allocator: Arc<BufferManager>) -> Self {
        Self::with_host_id(heap, allocator, host_id())
    }

    pub fn with_host_id(heap: Arc<dyn SharedHeap>, allocator: Arc<BufferManager>, host_id: u32) -> Self {
        Self {
            heap,
            allocator,
            host_id,
            _kind: PhantomData,
        }
    }
}

impl<K: ElementKind> TransportManager<K> for SharedHeapManager<K> {
    fn transport_type(&self) -> &str {
        SHARED_HEAP_TRANSPORT
    }

    fn priority(&self) -> i32 {
        10
    }

    fn negotiate(
        &self,
        objref: &ObjectRef,
        connection_id: &str,
        offer: &TransportDescription,
    ) -> Result<Option<Box<dyn OutputTransport<K>>>> {
        let remote_host = offer.properties.get(HOST_ID_PROPERTY).and_then(Value::as_u64);
        if remote_host != Some(u64::from(self.host_id)) {
            log::debug!(
                "[SharedHeapManager] '{}': peer host {:?} differs from {:#x}",
                connection_id,
                remote_host,
                self.host_id
            );
            return Ok(None);
        }

        let mut properties = Properties::new();
        properties.set(HOST_ID_PROPERTY, u64::from(self.host_id));
        properties.set(HEAP_ID_PROPERTY, self.heap.heap_id());

        let reply = objref
            .invoke(Invocation::NegotiateTransport {
                transport_type: SHARED_HEAP_TRANSPORT.to_string(),
                transport_id: connection_id.to_string(),
                properties,
            })
            .map_err(|failure| Error::TransportNegotiation(failure.to_string()))?;

        match reply {
            Reply::Negotiated { transport_id, .. } => Ok(Some(Box::new(HeapTransport::<K> {
                objref: objref.duplicate(),
                heap: Arc::clone(&self.heap),
                allocator: Arc::clone(&self.allocator),
                transport_id,
                _kind: PhantomData,
            }))),
            other => Err(Error::TransportNegotiation(format!(
                "unexpected reply to negotiateTransport: {:?}",
                other
            ))),
        }
    }
}

/// Whether the consumer had taken a `PushShared` block when `failure` was
/// reported.
///
/// The consumer releases every block it accepted, including ones it then
/// fails to decode. Refusals before dispatch (and an unknown heap) leave the
/// block with the producer. A timeout may arrive after the consumer read the
/// block, so it counts as taken.
fn consumer_owns_block(failure: &RemoteFailure) -> bool {
    match failure {
        RemoteFailure::Communication(_)
        | RemoteFailure::MessageSizeExceeded { .. }
        | RemoteFailure::ObjectNotExist
        | RemoteFailure::Rejected(_) => false,
        RemoteFailure::Timeout | RemoteFailure::BadOperation(_) => true,
    }
}

/// Output side of a negotiated `shmipc` connection.
pub struct HeapTransport<K: ElementKind> {
    objref: ObjectRef,
    heap: Arc<dyn SharedHeap>,
    allocator: Arc<BufferManager>,
    transport_id: String,
    _kind: PhantomData<K>,
}

impl<K: ElementKind> OutputTransport<K> for HeapTransport<K> {
    fn transport_type(&self) -> &str {
        SHARED_HEAP_TRANSPORT
    }

    fn transport_info(&self) -> Properties {
        let mut info = Properties::new();
        info.set("transport_id", self.transport_id.as_str());
        info.set(HEAP_ID_PROPERTY, self.heap.heap_id());
        info
    }

    fn push_sri(&mut self, sri: &SignalDescriptor) -> std::result::Result<(), TransportError> {
        self.objref.invoke(Invocation::PushSri(sri.clone()))?;
        Ok(())
    }

    fn push_packet(&mut self, packet: Packet<K>) -> std::result::Result<(), TransportError> {
        let count = packet.element_count();
        let mut bytes = self.allocator.allocate(K::wire_len(&packet.payload));
        K::encode(&packet.payload, &mut bytes);

        let block = self
            .heap
            .allocate(bytes.len())
            .map_err(|e| TransportError::Recoverable(e.to_string()))?;
        if let Err(e) = self.heap.copy_into(&block, &bytes) {
            self.heap.deallocate(block);
            return Err(TransportError::Recoverable(e.to_string()));
        }

        let result = self.objref.invoke(Invocation::PushShared {
            block,
            format: K::FORMAT,
            count,
            time: packet.time,
            eos: packet.eos,
            stream_id: packet.stream_id,
        });
        if let Err(failure) = result {
            if !consumer_owns_block(&failure) {
                self.heap.deallocate(block);
            }
            return Err(failure.into());
        }
        Ok(())
    }

    fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
        self.objref.invoke(Invocation::DisconnectTransport {
            transport_id: self.transport_id.clone(),
        })?;
        Ok(())
    }
}
