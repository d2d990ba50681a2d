// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sigplane - signal data plane
//!
//! Moves typed sample streams between producer and consumer ports in the
//! same process, in different processes on one host, or across hosts. It
//! enforces wire-size limits, keeps stream ordering and timing, and
//! negotiates the cheapest transport available for each connection.
//!
//! ## Quick Start
//!
//! ```rust
//! use sigplane::element::Float;
//! use sigplane::stream::{InPort, OutPort};
//! use sigplane::{ObjectRef, SignalDescriptor, TimeValue};
//! use std::sync::Arc;
//!
//! fn main() -> sigplane::Result<()> {
//!     let output = OutPort::<Float>::new("dataFloat_out");
//!     let input = Arc::new(InPort::<Float>::new("dataFloat_in"));
//!     output.connect_port(Some(ObjectRef::local(Arc::clone(&input))), "conn_1")?;
//!
//!     let sri = SignalDescriptor::with_sample_rate("tuner_1", 1e6)?;
//!     let samples: Vec<f32> = vec![0.0; 1024];
//!     output.push(samples.into(), TimeValue::now(), false, &sri)?;
//!
//!     let packet = input.get_packet(0.0).expect("queued");
//!     assert_eq!(packet.element_count(), 1024);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |  OutPort<K> / OutputStream        MessageSupplierPort             |
//! +-------------------------------------------------------------------+
//! |  TransportNegotiator: connection set, transport selection         |
//! +-------------------------------------------------------------------+
//! |  StreamLink: chunking, timestamps, descriptor changes, EOS        |
//! +-------------------------------------------------------------------+
//! |  local (in-process) | shmipc (SharedHeap) | remote (ObjectRef)    |
//! +-------------------------------------------------------------------+
//! |  BufferManager: per-thread block cache for encoded payloads       |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`stream::OutPort`] | Producer port, fans packets out to all connections |
//! | [`stream::InPort`] | Consumer port, FIFO with blocking / timed reads |
//! | [`SignalDescriptor`] | Per-stream metadata (SRI) |
//! | [`TimeValue`] | Sample timestamp |
//! | [`BufferManager`] | Block recycler used on the encode path |
//! | [`RuntimeConfig`] | Transfer limit and transport switches |

/// Buffer cache (per-thread block recycling).
pub mod alloc;
/// Zero-copy sample containers.
pub mod buffer;
/// Data plane configuration (constants, runtime config, loaders).
pub mod config;
/// Element kinds carried by streams.
pub mod element;
/// Error types.
pub mod error;
/// Message supplier and consumer ports.
pub mod message;
/// Connection management shared by all ports.
pub mod port;
/// Ordered key/value properties.
pub mod props;
/// RPC substrate interface.
pub mod rpc;
/// Signal descriptors.
pub mod sri;
/// Stream ports, links and transports.
pub mod stream;
/// Timestamps.
pub mod time;

pub use alloc::{AllocatorStatistics, BufferManager, CachedBlock};
pub use config::{DataPlaneConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use props::{Properties, Property, Value};
pub use rpc::ObjectRef;
pub use sri::SignalDescriptor;
pub use time::TimeValue;

/// sigplane version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
