// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer-side stream port.
//!
//! Packets arrive either directly from an in-process producer
//! ([`InPort::queue_packet`]) or through the substrate as [`Invocation`]s
//! dispatched by the [`Servant`] impl. Either way they land in one FIFO that
//! the consumer drains with [`InPort::get_packet`].

use super::negotiated::{HEAP_ID_PROPERTY, HOST_ID_PROPERTY, SHARED_HEAP_TRANSPORT};
use super::Packet;
use crate::element::ElementKind;
use crate::error::Result;
use crate::port::statistics::{LinkStatistics, PortStatistics};
use crate::props::{Properties, Value};
use crate::rpc::{
    host_id, HeapRef, Invocation, RemoteFailure, Reply, Servant, SharedHeap, TransportDescription,
    NEGOTIABLE_PROVIDES_REPO_ID,
};
use crate::sri::SignalDescriptor;
use crate::time::TimeValue;
use crossbeam::channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct SriState {
    sri: Arc<SignalDescriptor>,
    /// The next packet of the stream has not been delivered yet.
    changed: bool,
}

/// Input port for samples of kind `K`.
pub struct InPort<K: ElementKind> {
    name: String,
    sender: Sender<Packet<K>>,
    receiver: Receiver<Packet<K>>,
    sris: DashMap<String, SriState>,
    heaps: DashMap<u64, Arc<dyn SharedHeap>>,
    /// Negotiated transport id -> heap id.
    negotiated: DashMap<String, u64>,
    stats: Mutex<LinkStatistics>,
}

impl<K: ElementKind> InPort<K> {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            name: name.into(),
            sender,
            receiver,
            sris: DashMap::new(),
            heaps: DashMap::new(),
            negotiated: DashMap::new(),
            stats: Mutex::new(LinkStatistics::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a descriptor; the next packet of its stream is flagged changed.
    pub fn push_sri(&self, sri: SignalDescriptor) {
        log::debug!("[InPort::push_sri] {}: stream '{}'", self.name, sri.stream_id);
        self.sris.insert(
            sri.stream_id.clone(),
            SriState {
                sri: Arc::new(sri),
                changed: true,
            },
        );
    }

    /// Enqueue a packet received without its descriptor.
    ///
    /// A stream with no descriptor yet gets a default one.
    pub fn push_packet(&self, payload: K::Buffer, time: TimeValue, eos: bool, stream_id: &str) -> Result<()> {
        let (sri, sri_changed) = match self.sris.get_mut(stream_id) {
            Some(mut state) => {
                let changed = std::mem::replace(&mut state.changed, false);
                (Arc::clone(&state.sri), changed)
            }
            None => {
                let sri = Arc::new(SignalDescriptor::new(stream_id)?);
                self.sris.insert(
                    stream_id.to_string(),
                    SriState {
                        sri: Arc::clone(&sri),
                        changed: false,
                    },
                );
                (sri, true)
            }
        };
        self.queue_packet(Packet {
            payload,
            time,
            eos,
            stream_id: stream_id.to_string(),
            sri,
            sri_changed,
        });
        Ok(())
    }

    /// Enqueue a packet from an in-process producer.
    pub fn queue_packet(&self, packet: Packet<K>) {
        if packet.sri_changed || !self.sris.contains_key(&packet.stream_id) {
            self.sris.insert(
                packet.stream_id.clone(),
                SriState {
                    sri: Arc::clone(&packet.sri),
                    changed: false,
                },
            );
        }
        self.stats.lock().update(
            packet.element_count(),
            K::wire_len(&packet.payload),
            packet.eos,
            &packet.stream_id,
        );
        if self.sender.send(packet).is_err() {
            log::debug!("[InPort::queue_packet] {}: queue closed", self.name);
        }
    }

    /// Next packet in arrival order.
    ///
    /// `timeout` is in seconds: `0` returns immediately, a negative value
    /// blocks until a packet arrives, a positive value waits at most that long.
    pub fn get_packet(&self, timeout: f64) -> Option<Packet<K>> {
        let received = if timeout == 0.0 {
            self.receiver.try_recv().ok()
        } else if timeout < 0.0 {
            self.receiver.recv().ok()
        } else {
            self.receiver
                .recv_timeout(Duration::from_secs_f64(timeout))
                .ok()
        };
        let packet = received?;
        if packet.eos {
            // Keep a descriptor that arrived for a new stream of the same id.
            self.sris
                .remove_if(&packet.stream_id, |_, state| Arc::ptr_eq(&state.sri, &packet.sri));
        }
        Some(packet)
    }

    /// Descriptors of streams that have not ended.
    pub fn active_sris(&self) -> Vec<SignalDescriptor> {
        self.sris
            .iter()
            .map(|entry| entry.value().sri.as_ref().clone())
            .collect()
    }

    /// Packets waiting to be read.
    pub fn queue_depth(&self) -> usize {
        self.receiver.len()
    }

    pub fn statistics(&self) -> PortStatistics {
        self.stats.lock().retrieve()
    }

    /// Make a shared heap readable; enables the `shmipc` transport.
    pub fn attach_heap(&self, heap: Arc<dyn SharedHeap>) {
        self.heaps.insert(heap.heap_id(), heap);
    }

    /// Number of negotiated transports currently established.
    pub fn negotiated_transports(&self) -> usize {
        self.negotiated.len()
    }

    /// Take ownership of a shared block: once its heap is known the block is
    /// released here on every path. An unknown heap leaves it to the sender.
    fn take_shared(&self, block: HeapRef) -> std::result::Result<Vec<u8>, RemoteFailure> {
        let heap = self
            .heaps
            .get(&block.heap_id)
            .map(|heap| Arc::clone(heap.value()))
            .ok_or_else(|| RemoteFailure::Rejected(format!("unknown heap {}", block.heap_id)))?;
        let bytes = heap.read(&block);
        heap.deallocate(block);
        bytes.map_err(|e| RemoteFailure::BadOperation(e.to_string()))
    }

    fn supported_transports(&self) -> Vec<TransportDescription> {
        if self.heaps.is_empty() {
            return Vec::new();
        }
        let mut properties = Properties::new();
        properties.set(HOST_ID_PROPERTY, u64::from(host_id()));
        vec![TransportDescription::new(SHARED_HEAP_TRANSPORT, properties)]
    }

    fn negotiate(
        &self,
        transport_type: &str,
        transport_id: String,
        properties: &Properties,
    ) -> std::result::Result<Reply, RemoteFailure> {
        if transport_type != SHARED_HEAP_TRANSPORT {
            return Err(RemoteFailure::Rejected(format!(
                "unsupported transport {}",
                transport_type
            )));
        }
        let heap_id = properties
            .get(HEAP_ID_PROPERTY)
            .and_then(Value::as_u64)
            .filter(|id| self.heaps.contains_key(id))
            .ok_or_else(|| RemoteFailure::Rejected("heap not attached".into()))?;

        log::debug!(
            "[InPort::negotiate] {}: '{}' uses heap {}",
            self.name,
            transport_id,
            heap_id
        );
        self.negotiated.insert(transport_id.clone(), heap_id);
        let mut reply = Properties::new();
        reply.set(HOST_ID_PROPERTY, u64::from(host_id()));
        Ok(Reply::Negotiated {
            transport_id,
            properties: reply,
        })
    }
}

impl<K: ElementKind> Servant for InPort<K> {
    fn supports(&self, repo_id: &str) -> bool {
        repo_id == K::REPO_ID || repo_id == NEGOTIABLE_PROVIDES_REPO_ID
    }

    fn dispatch(&self, invocation: Invocation) -> std::result::Result<Reply, RemoteFailure> {
        match invocation {
            Invocation::PushSri(sri) => {
                self.push_sri(sri);
                Ok(Reply::Empty)
            }
            Invocation::PushPacket {
                packet,
                time,
                eos,
                stream_id,
            } => {
                let payload = packet.decode::<K>().ok_or_else(|| {
                    RemoteFailure::BadOperation(format!(
                        "{} payload is not {}",
                        packet.format,
                        K::NAME
                    ))
                })?;
                self.push_packet(payload, time, eos, &stream_id)
                    .map_err(|e| RemoteFailure::BadOperation(e.to_string()))?;
                Ok(Reply::Empty)
            }
            Invocation::PushShared {
                block,
                format,
                count,
                time,
                eos,
                stream_id,
            } => {
                let bytes = self.take_shared(block)?;
                if format != K::FORMAT {
                    return Err(RemoteFailure::BadOperation(format!(
                        "{} payload is not {}",
                        format,
                        K::NAME
                    )));
                }
                let payload = K::decode(&bytes, count).ok_or_else(|| {
                    RemoteFailure::BadOperation(format!("corrupt shared block ({} bytes)", bytes.len()))
                })?;
                self.push_packet(payload, time, eos, &stream_id)
                    .map_err(|e| RemoteFailure::BadOperation(e.to_string()))?;
                Ok(Reply::Empty)
            }
            Invocation::SupportedTransports => Ok(Reply::Transports(self.supported_transports())),
            Invocation::NegotiateTransport {
                transport_type,
                transport_id,
                properties,
            } => self.negotiate(&transport_type, transport_id, &properties),
            Invocation::DisconnectTransport { transport_id } => {
                self.negotiated.remove(&transport_id);
                Ok(Reply::Empty)
            }
            other => Err(RemoteFailure::BadOperation(other.operation().to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("InPort<{}>({})", K::NAME, self.name)
    }
}
