// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Exact sample values

//! Transport selection: local, shared heap (`shmipc`) and remote fallback.

mod common;

use common::{ramp, MemoryHeap, RemotePeer};
use sigplane::element::{Double, ElementKind, Float};
use sigplane::rpc::{host_id, Invocation, RemoteFailure, Servant, SharedHeap};
use sigplane::stream::{InPort, OutPort, SharedHeapManager, TransportError, SHARED_HEAP_TRANSPORT};
use sigplane::{BufferManager, DataPlaneConfig, Error, ObjectRef, RuntimeConfig, TimeValue};
use std::sync::Arc;

fn port_with(config: DataPlaneConfig) -> (OutPort<Float>, Arc<BufferManager>) {
    let allocator = Arc::new(BufferManager::new());
    let port = OutPort::with_context("out", RuntimeConfig::new(config), Arc::clone(&allocator));
    (port, allocator)
}

/// Consumer and producer sharing one heap.
fn shared_setup(
    config: DataPlaneConfig,
) -> (OutPort<Float>, Arc<InPort<Float>>, Arc<MemoryHeap>) {
    let heap = MemoryHeap::new(1 << 20);
    let sink = Arc::new(InPort::<Float>::new("in"));
    sink.attach_heap(Arc::clone(&heap) as Arc<dyn SharedHeap>);

    let (port, allocator) = port_with(config);
    port.register_transport(Arc::new(SharedHeapManager::<Float>::new(
        Arc::clone(&heap) as Arc<dyn SharedHeap>,
        allocator,
    )));
    (port, sink, heap)
}

// ---------------------------------------------------------------------------
// Test: shared heap transport selected on the same host
// ---------------------------------------------------------------------------

#[test]
fn test_shared_heap_selected() {
    let (port, sink, heap) = shared_setup(DataPlaneConfig::default());
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");

    let details = port.connection_details();
    assert_eq!(details[0].transport_type, SHARED_HEAP_TRANSPORT);
    assert_eq!(peer.count("supportedTransports"), 1);
    assert_eq!(peer.count("negotiateTransport"), 1);
    assert_eq!(sink.negotiated_transports(), 1);

    port.push_packet(ramp(10_000), TimeValue::now(), false, "s").expect("push");
    assert_eq!(peer.count("pushShared"), 1);
    assert_eq!(peer.count("pushPacket"), 0);

    let packet = sink.get_packet(0.0).expect("packet");
    assert_eq!(packet.element_count(), 10_000);
    assert_eq!(packet.payload[9_999], 9_999.0);
    // Consumer releases every block it reads.
    assert_eq!(heap.live_blocks(), 0);
}

// ---------------------------------------------------------------------------
// Test: different host falls back to remote
// ---------------------------------------------------------------------------

#[test]
fn test_host_mismatch_falls_back() {
    let heap = MemoryHeap::new(1 << 20);
    let sink = Arc::new(InPort::<Float>::new("in"));
    sink.attach_heap(Arc::clone(&heap) as Arc<dyn SharedHeap>);

    let (port, allocator) = port_with(DataPlaneConfig::default());
    port.register_transport(Arc::new(SharedHeapManager::<Float>::with_host_id(
        Arc::clone(&heap) as Arc<dyn SharedHeap>,
        allocator,
        host_id().wrapping_add(1),
    )));

    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");
    assert_eq!(port.connection_details()[0].transport_type, "remote");
    assert_eq!(peer.count("negotiateTransport"), 0);

    port.push_packet(ramp(16), TimeValue::now(), false, "s").expect("push");
    assert_eq!(peer.count("pushPacket"), 1);
    assert_eq!(sink.get_packet(0.0).map(|p| p.element_count()), Some(16));
}

// ---------------------------------------------------------------------------
// Test: consumer without a heap rejects negotiation
// ---------------------------------------------------------------------------

#[test]
fn test_no_heap_on_consumer() {
    let heap = MemoryHeap::new(1 << 20);
    let (port, allocator) = port_with(DataPlaneConfig::default());
    port.register_transport(Arc::new(SharedHeapManager::<Float>::new(
        heap as Arc<dyn SharedHeap>,
        allocator,
    )));

    let sink = Arc::new(InPort::<Float>::new("in"));
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");
    // Nothing offered, so nothing negotiated.
    assert_eq!(port.connection_details()[0].transport_type, "remote");
    assert_eq!(peer.count("negotiateTransport"), 0);
}

// ---------------------------------------------------------------------------
// Test: negotiation switched off by configuration
// ---------------------------------------------------------------------------

#[test]
fn test_policy_disables_negotiation() {
    let (port, sink, _heap) = shared_setup(DataPlaneConfig {
        negotiated_transports: false,
        ..DataPlaneConfig::default()
    });
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");

    assert_eq!(port.connection_details()[0].transport_type, "remote");
    assert_eq!(peer.count("supportedTransports"), 0);
}

// ---------------------------------------------------------------------------
// Test: in-process peers prefer the local transport
// ---------------------------------------------------------------------------

#[test]
fn test_local_preferred() {
    let (port, sink, heap) = shared_setup(DataPlaneConfig::default());
    port.connect_port(Some(ObjectRef::local(Arc::clone(&sink))), "c1")
        .expect("connect");
    assert_eq!(port.connection_details()[0].transport_type, "local");

    port.push_packet(ramp(8), TimeValue::now(), false, "s").expect("push");
    assert_eq!(sink.get_packet(0.0).map(|p| p.element_count()), Some(8));
    assert_eq!(heap.live_blocks(), 0);
    assert_eq!(sink.negotiated_transports(), 0);
}

#[test]
fn test_local_disabled_uses_shared_heap() {
    let (port, sink, heap) = shared_setup(DataPlaneConfig {
        local_transport: false,
        ..DataPlaneConfig::default()
    });
    port.connect_port(Some(ObjectRef::local(Arc::clone(&sink))), "c1")
        .expect("connect");
    assert_eq!(port.connection_details()[0].transport_type, SHARED_HEAP_TRANSPORT);

    port.push_packet(ramp(8), TimeValue::now(), true, "s").expect("push");
    let packet = sink.get_packet(0.0).expect("packet");
    assert!(packet.eos);
    assert_eq!(heap.live_blocks(), 0);
}

// ---------------------------------------------------------------------------
// Test: disconnect tears down the negotiated transport on the consumer
// ---------------------------------------------------------------------------

#[test]
fn test_disconnect_releases_consumer_side() {
    let (port, sink, _heap) = shared_setup(DataPlaneConfig::default());
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");
    port.push_packet(ramp(8), TimeValue::now(), false, "s").expect("push");

    port.disconnect_port("c1").expect("disconnect");
    assert_eq!(peer.count("disconnectTransport"), 1);
    assert_eq!(sink.negotiated_transports(), 0);

    // Open stream was closed before teardown.
    let last = std::iter::from_fn(|| sink.get_packet(0.0)).last().expect("packets");
    assert!(last.eos);
}

// ---------------------------------------------------------------------------
// Test: heap exhaustion is reported without killing the connection
// ---------------------------------------------------------------------------

#[test]
fn test_heap_exhaustion_is_recoverable() {
    let heap = MemoryHeap::new(64);
    let sink = Arc::new(InPort::<Float>::new("in"));
    sink.attach_heap(Arc::clone(&heap) as Arc<dyn SharedHeap>);
    let (port, allocator) = port_with(DataPlaneConfig::default());
    port.register_transport(Arc::new(SharedHeapManager::<Float>::new(
        Arc::clone(&heap) as Arc<dyn SharedHeap>,
        allocator,
    )));
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");

    assert!(port
        .push_packet(ramp(1_000), TimeValue::now(), false, "s")
        .is_err());
    assert!(port.connections()[0].alive);
    assert_eq!(heap.live_blocks(), 0);

    port.push_packet(ramp(4), TimeValue::now(), false, "s").expect("small push");
    assert_eq!(peer.count("pushShared"), 1);
}

// ---------------------------------------------------------------------------
// Test: a reply lost after the consumer took the block releases it once
// ---------------------------------------------------------------------------

#[test]
fn test_lost_reply_releases_block_once() {
    let (port, sink, heap) = shared_setup(DataPlaneConfig::default());
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");
    port.push_packet(ramp(8), TimeValue::now(), false, "s").expect("push");

    peer.lose_next_reply(RemoteFailure::Timeout);
    let err = port
        .push_packet(ramp(8), TimeValue::now(), false, "s")
        .expect_err("timeout reported");
    assert!(matches!(
        err,
        Error::Delivery { ref failures, .. } if matches!(failures[0].1, TransportError::Timeout(_))
    ));

    assert_eq!(heap.double_frees(), 0);
    assert_eq!(heap.live_blocks(), 0);
    assert_eq!(sink.queue_depth(), 2);
    assert!(port.connections()[0].alive);
}

// ---------------------------------------------------------------------------
// Test: a call refused before dispatch is released by the producer
// ---------------------------------------------------------------------------

#[test]
fn test_refused_call_released_by_producer() {
    let (port, sink, heap) = shared_setup(DataPlaneConfig::default());
    let peer = RemotePeer::new(Arc::clone(&sink), usize::MAX);
    port.connect_port(Some(peer.objref()), "c1").expect("connect");
    port.push_packet(ramp(8), TimeValue::now(), false, "s").expect("push");

    peer.fail_next(RemoteFailure::Communication("connection reset".into()));
    assert!(port
        .push_packet(ramp(8), TimeValue::now(), false, "s")
        .is_err());
    assert_eq!(heap.live_blocks(), 0);
    assert_eq!(heap.double_frees(), 0);
    assert_eq!(sink.queue_depth(), 1);
}

// ---------------------------------------------------------------------------
// Test: the consumer releases blocks it cannot use
// ---------------------------------------------------------------------------

#[test]
fn test_mismatched_block_released_by_consumer() {
    let heap = MemoryHeap::new(1 << 10);
    let sink = InPort::<Float>::new("in");
    sink.attach_heap(Arc::clone(&heap) as Arc<dyn SharedHeap>);

    let block = heap.allocate(16).expect("block");
    heap.copy_into(&block, &[0u8; 16]).expect("copy");
    let result = sink.dispatch(Invocation::PushShared {
        block,
        format: <Double as ElementKind>::FORMAT,
        count: 2,
        time: TimeValue::now(),
        eos: false,
        stream_id: "s".into(),
    });

    assert!(matches!(result, Err(RemoteFailure::BadOperation(_))));
    assert_eq!(heap.live_blocks(), 0);
    assert_eq!(sink.queue_depth(), 0);
}
