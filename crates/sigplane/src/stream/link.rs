// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One producer-to-consumer connection.
//!
//! A [`StreamLink`] owns exactly one transport. It splits payloads into
//! sub-packets the transport can carry, synthesizes timestamps for every
//! sub-packet after the first, forwards descriptor changes ahead of the data
//! they describe, and sends end-of-stream for open streams on disconnect.

use super::chunk::{max_samples_per_push, Chunker};
use super::{OutputTransport, Packet, TransportError};
use crate::element::ElementKind;
use crate::port::negotiator::UsesLink;
use crate::port::statistics::{LinkStatistics, PortStatistics, StreamCounters};
use crate::props::Properties;
use crate::sri::SignalDescriptor;
use crate::time::TimeValue;
use std::collections::HashMap;
use std::sync::Arc;

struct LinkStream {
    /// Descriptor version last sent to the transport.
    version: u64,
    sri: Arc<SignalDescriptor>,
    /// Next packet must carry `sri_changed`.
    pending: bool,
}

/// Connection from an output port to one consumer.
pub struct StreamLink<K: ElementKind> {
    connection_id: String,
    transport: Box<dyn OutputTransport<K>>,
    alive: bool,
    streams: HashMap<String, LinkStream>,
    stats: LinkStatistics,
}

impl<K: ElementKind> StreamLink<K> {
    pub fn new(connection_id: impl Into<String>, transport: Box<dyn OutputTransport<K>>) -> Self {
        Self {
            connection_id: connection_id.into(),
            transport,
            alive: true,
            streams: HashMap::new(),
            stats: LinkStatistics::new(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Forward a descriptor now; the next packet of the stream is flagged changed.
    pub fn push_sri(&mut self, sri: &Arc<SignalDescriptor>, version: u64) -> Result<(), TransportError> {
        self.transport.push_sri(sri)?;
        self.streams.insert(
            sri.stream_id.clone(),
            LinkStream {
                version,
                sri: Arc::clone(sri),
                pending: true,
            },
        );
        Ok(())
    }

    /// Deliver `payload` as one or more sub-packets.
    ///
    /// `sri` at `version` is forwarded first if this link has not sent that
    /// version yet. Only the final sub-packet carries `eos`. A transport
    /// failure aborts the remaining sub-packets; delivered ones stay delivered.
    pub fn push(
        &mut self,
        payload: &K::Buffer,
        time: TimeValue,
        eos: bool,
        sri: &Arc<SignalDescriptor>,
        version: u64,
    ) -> Result<(), TransportError> {
        let mut sri_changed = self.sync_sri(sri, version)?;

        let total = K::element_count(payload);
        let chunker = match self.max_elements_per_push(sri) {
            Some(max) => Chunker::new(total, max),
            None => Chunker::single(total),
        };
        let item_size = sri.item_size();
        let mut time = time;

        for sub in chunker {
            let chunk = if sub.start == 0 && sub.end == total {
                payload.clone()
            } else {
                K::slice(payload, sub.start, sub.end)
            };
            let bytes = K::wire_len(&chunk);
            let sub_eos = eos && sub.last;

            self.transport.push_packet(Packet {
                payload: chunk,
                time,
                eos: sub_eos,
                stream_id: sri.stream_id.clone(),
                sri: Arc::clone(sri),
                sri_changed,
            })?;

            if sri_changed {
                sri_changed = false;
                if let Some(stream) = self.streams.get_mut(&sri.stream_id) {
                    stream.pending = false;
                }
            }
            self.stats.update(sub.len(), bytes, sub_eos, &sri.stream_id);

            if time.is_valid() {
                time = time.add_sample_offset(sub.len() / item_size, sri.xdelta);
            }
        }

        if eos {
            self.streams.remove(&sri.stream_id);
        }
        Ok(())
    }

    /// Empty end-of-stream packet for a stream this link has carried.
    pub fn send_eos(&mut self, stream_id: &str) -> Result<(), TransportError> {
        let Some((sri, version)) = self
            .streams
            .get(stream_id)
            .map(|s| (Arc::clone(&s.sri), s.version))
        else {
            return Ok(());
        };
        self.push(&K::empty(), TimeValue::not_set(), true, &sri, version)
    }

    /// Streams carried by this link that have not ended.
    pub fn stream_ids(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    pub fn record_error(&mut self) {
        self.stats.record_error();
    }

    pub fn statistics(&self) -> PortStatistics {
        self.stats.retrieve()
    }

    pub fn stream_statistics(&self, stream_id: &str) -> Option<StreamCounters> {
        self.stats.stream(stream_id)
    }

    /// Returns `true` when the packet must be flagged `sri_changed`.
    fn sync_sri(&mut self, sri: &Arc<SignalDescriptor>, version: u64) -> Result<bool, TransportError> {
        if let Some(stream) = self.streams.get(&sri.stream_id) {
            if stream.version == version {
                return Ok(stream.pending);
            }
        }
        self.push_sri(sri, version)?;
        Ok(true)
    }

    fn max_elements_per_push(&self, sri: &SignalDescriptor) -> Option<usize> {
        if !K::is_chunkable() {
            return None;
        }
        let limit = self.transport.max_payload_bytes()?;
        let bits = K::FORMAT.wire_bits()?;
        Some(max_samples_per_push(
            limit,
            bits,
            sri.item_size(),
            sri.frame_size(),
        ))
    }
}

impl<K: ElementKind> UsesLink for StreamLink<K> {
    fn transport_type(&self) -> String {
        self.transport.transport_type().to_string()
    }

    fn transport_info(&self) -> Properties {
        self.transport.transport_info()
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    /// Ends every open stream (only while alive), then tears the transport down.
    fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.alive {
            self.transport.begin_disconnect();
            for stream_id in self.stream_ids() {
                if let Err(err) = self.send_eos(&stream_id) {
                    log::debug!(
                        "[StreamLink::disconnect] EOS for '{}' on '{}' failed: {}",
                        stream_id,
                        self.connection_id,
                        err
                    );
                }
            }
        }
        self.streams.clear();
        self.transport.disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SharedBuffer;
    use crate::element::{Float, Xml};
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Sri(String),
        Packet {
            len: usize,
            time: TimeValue,
            eos: bool,
            sri_changed: bool,
        },
        Disconnect,
    }

    struct Recorder<K: ElementKind> {
        events: Arc<Mutex<Vec<Event>>>,
        limit: Option<usize>,
        fail_after: Option<usize>,
        _kind: std::marker::PhantomData<K>,
    }

    impl<K: ElementKind> OutputTransport<K> for Recorder<K> {
        fn transport_type(&self) -> &str {
            "recorder"
        }

        fn max_payload_bytes(&self) -> Option<usize> {
            self.limit
        }

        fn push_sri(&mut self, sri: &SignalDescriptor) -> Result<(), TransportError> {
            self.events.lock().push(Event::Sri(sri.stream_id.clone()));
            Ok(())
        }

        fn push_packet(&mut self, packet: Packet<K>) -> Result<(), TransportError> {
            let mut events = self.events.lock();
            let delivered = events
                .iter()
                .filter(|e| matches!(e, Event::Packet { .. }))
                .count();
            if self.fail_after == Some(delivered) {
                return Err(TransportError::Fatal("connection reset".into()));
            }
            events.push(Event::Packet {
                len: packet.element_count(),
                time: packet.time,
                eos: packet.eos,
                sri_changed: packet.sri_changed,
            });
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), TransportError> {
            self.events.lock().push(Event::Disconnect);
            Ok(())
        }
    }

    fn link<K: ElementKind>(
        limit: Option<usize>,
        fail_after: Option<usize>,
    ) -> (StreamLink<K>, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let transport = Recorder::<K> {
            events: Arc::clone(&events),
            limit,
            fail_after,
            _kind: std::marker::PhantomData,
        };
        (StreamLink::new("conn", Box::new(transport)), events)
    }

    fn packets(events: &[Event]) -> Vec<(usize, bool, bool)> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Packet {
                    len,
                    eos,
                    sri_changed,
                    ..
                } => Some((*len, *eos, *sri_changed)),
                _ => None,
            })
            .collect()
    }

    fn samples(n: usize) -> SharedBuffer<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_chunked_push() {
        let (mut link, events) = link::<Float>(Some(18205), None);
        let mut sri = SignalDescriptor::new("s1").expect("sri");
        sri.xdelta = 0.001;
        let sri = Arc::new(sri);

        let start = TimeValue::new(100.0, 0.0);
        link.push(&samples(10_000), start, true, &sri, 1).expect("push");

        let events = events.lock();
        assert_eq!(events[0], Event::Sri("s1".into()));
        assert_eq!(
            packets(&events),
            vec![(4096, false, true), (4096, false, false), (1808, true, false)]
        );

        let times: Vec<TimeValue> = events
            .iter()
            .filter_map(|e| match e {
                Event::Packet { time, .. } => Some(*time),
                _ => None,
            })
            .collect();
        assert_eq!(times[0], start);
        assert!((times[1].diff(&start) - 4.096).abs() < 1e-9);
        assert!((times[2].diff(&start) - 8.192).abs() < 1e-9);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));

        // EOS closed the stream.
        assert!(link.stream_ids().is_empty());
        let stats = link.statistics();
        assert_eq!(stats.total_elements, 10_000);
        assert_eq!(stats.total_bytes, 40_000);
        assert_eq!(stats.pushes, 3);
    }

    #[test]
    fn test_complex_chunks_stay_even() {
        let (mut link, events) = link::<Float>(Some(18205), None);
        let mut sri = SignalDescriptor::new("iq").expect("sri");
        sri.complex = true;
        sri.xdelta = 1.0;
        let sri = Arc::new(sri);

        let start = TimeValue::new(0.0, 0.0);
        link.push(&samples(9000), start, false, &sri, 1).expect("push");
        let lens: Vec<usize> = packets(&events.lock()).iter().map(|p| p.0).collect();
        assert_eq!(lens, vec![4096, 4096, 808]);
        assert!(lens.iter().all(|len| len % 2 == 0));

        // Time advances per complex sample, not per scalar.
        let second = events.lock().iter().find_map(|e| match e {
            Event::Packet { time, len: 4096, .. } if *time != start => Some(*time),
            _ => None,
        });
        assert_eq!(second.map(|t| t.diff(&start)), Some(2048.0));
    }

    #[test]
    fn test_invalid_time_is_propagated() {
        let (mut link, events) = link::<Float>(Some(18205), None);
        let mut sri = SignalDescriptor::new("s").expect("sri");
        sri.xdelta = 1.0;
        let sri = Arc::new(sri);
        link.push(&samples(9000), TimeValue::not_set(), false, &sri, 1)
            .expect("push");
        assert!(events.lock().iter().all(|e| match e {
            Event::Packet { time, .. } => !time.is_valid(),
            _ => true,
        }));
    }

    #[test]
    fn test_empty_eos_push() {
        let (mut link, events) = link::<Float>(Some(18205), None);
        let sri = Arc::new(SignalDescriptor::new("s").expect("sri"));
        link.push(&SharedBuffer::empty(), TimeValue::not_set(), true, &sri, 1)
            .expect("push");
        assert_eq!(packets(&events.lock()), vec![(0, true, true)]);
    }

    #[test]
    fn test_unlimited_and_unchunkable() {
        let (mut unlimited, events) = link::<Float>(None, None);
        let sri = Arc::new(SignalDescriptor::new("s").expect("sri"));
        unlimited
            .push(&samples(1_000_000), TimeValue::now(), false, &sri, 1)
            .expect("push");
        assert_eq!(packets(&events.lock()).len(), 1);

        let (mut text, events) = link::<Xml>(Some(16), None);
        let doc = "<doc>".repeat(100);
        text.push(&doc, TimeValue::now(), false, &sri, 1).expect("push");
        assert_eq!(packets(&events.lock()), vec![(500, false, true)]);
    }

    #[test]
    fn test_sri_changed_once_per_version() {
        let (mut link, events) = link::<Float>(None, None);
        let first = Arc::new(SignalDescriptor::new("s").expect("sri"));
        let mut changed = SignalDescriptor::new("s").expect("sri");
        changed.xdelta = 0.5;
        let changed = Arc::new(changed);

        link.push(&samples(4), TimeValue::now(), false, &first, 1).expect("push");
        link.push(&samples(4), TimeValue::now(), false, &first, 1).expect("push");
        link.push(&samples(4), TimeValue::now(), false, &changed, 2).expect("push");
        link.push(&samples(4), TimeValue::now(), false, &changed, 2).expect("push");

        let events = events.lock();
        let sris = events.iter().filter(|e| matches!(e, Event::Sri(_))).count();
        assert_eq!(sris, 2);
        let flags: Vec<bool> = packets(&events).iter().map(|p| p.2).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn test_explicit_push_sri_flags_next_packet() {
        let (mut link, events) = link::<Float>(None, None);
        let sri = Arc::new(SignalDescriptor::new("s").expect("sri"));
        link.push_sri(&sri, 7).expect("sri");
        link.push(&samples(2), TimeValue::now(), false, &sri, 7).expect("push");
        link.push(&samples(2), TimeValue::now(), false, &sri, 7).expect("push");

        let events = events.lock();
        assert_eq!(events.iter().filter(|e| matches!(e, Event::Sri(_))).count(), 1);
        assert_eq!(packets(&events), vec![(2, false, true), (2, false, false)]);
    }

    #[test]
    fn test_failure_aborts_remaining() {
        let (mut link, events) = link::<Float>(Some(18205), Some(1));
        let sri = Arc::new(SignalDescriptor::new("s").expect("sri"));
        let err = link
            .push(&samples(10_000), TimeValue::now(), true, &sri, 1)
            .expect_err("second sub-packet fails");
        assert!(err.is_fatal());
        assert_eq!(packets(&events.lock()), vec![(4096, false, true)]);
        // Stream stays open; EOS never went out.
        assert_eq!(link.stream_ids(), vec!["s".to_string()]);
    }

    #[test]
    fn test_disconnect_sends_eos_when_alive() {
        let (mut link, events) = link::<Float>(None, None);
        let sri = Arc::new(SignalDescriptor::new("a").expect("sri"));
        link.push(&samples(3), TimeValue::now(), false, &sri, 1).expect("push");
        link.disconnect().expect("disconnect");
        let events = events.lock();
        assert_eq!(packets(&events).last(), Some(&(0, true, false)));
        assert_eq!(events.last(), Some(&Event::Disconnect));
    }

    #[test]
    fn test_disconnect_dead_link_skips_eos() {
        let (mut link, events) = link::<Float>(None, None);
        let sri = Arc::new(SignalDescriptor::new("a").expect("sri"));
        link.push(&samples(3), TimeValue::now(), false, &sri, 1).expect("push");
        link.set_alive(false);
        link.disconnect().expect("disconnect");
        let events = events.lock();
        assert_eq!(packets(&events).len(), 1);
        assert_eq!(events.last(), Some(&Event::Disconnect));
    }
}
