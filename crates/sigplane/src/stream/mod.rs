// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed sample streams: ports, links and transports.
//!
//! | Transport | Selected when | Payload path |
//! |-----------|---------------|--------------|
//! | `local` | peer lives in this process | shared buffer handed over |
//! | `shmipc` | negotiable peer on the same host | [`SharedHeap`](crate::rpc::SharedHeap) block |
//! | `remote` | otherwise | encoded, chunked to the transfer limit |

mod chunk;
mod in_port;
mod link;
mod local;
mod negotiated;
mod out_port;
mod out_stream;
mod packet;
mod remote;
mod transport;

pub use chunk::{max_samples_per_push, Chunker, SubPacket};
pub use in_port::InPort;
pub use link::StreamLink;
pub use local::LocalTransport;
pub use negotiated::{
    HeapTransport, SharedHeapManager, TransportManager, HEAP_ID_PROPERTY, HOST_ID_PROPERTY,
    SHARED_HEAP_TRANSPORT,
};
pub use out_port::{OutPort, StreamLinkFactory};
pub use out_stream::OutputStream;
pub use packet::Packet;
pub use remote::RemoteTransport;
pub use transport::{OutputTransport, TransportError};
