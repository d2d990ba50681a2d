// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interface to the RPC substrate.
//!
//! The data plane does not implement object brokering; it consumes an
//! [`ObjectRef`] that can answer interface queries, report whether the
//! object lives in this process, and carry the small set of data-plane
//! operations in [`Invocation`]. Remote brokers implement [`RemoteObject`];
//! in-process endpoints implement [`Servant`] and are wrapped with
//! [`ObjectRef::local`].

mod heap;
mod wire;

pub use heap::{host_id, HeapError, HeapRef, SharedHeap};
pub use wire::WirePacket;

use crate::element::ElementFormat;
use crate::props::Properties;
use crate::sri::SignalDescriptor;
use crate::time::TimeValue;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Interface of input ports that can negotiate alternate transports.
pub const NEGOTIABLE_PROVIDES_REPO_ID: &str = "IDL:sigplane/NegotiableProvidesPort:1.0";

/// Interface of message consumer endpoints.
pub const MESSAGE_CONSUMER_REPO_ID: &str = "IDL:sigplane/MessageConsumer:1.0";

/// Transport advertised by a negotiable endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportDescription {
    pub transport_type: String,
    pub properties: Properties,
}

impl TransportDescription {
    pub fn new(transport_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            transport_type: transport_type.into(),
            properties,
        }
    }
}

/// Data-plane operations carried by the substrate.
#[derive(Debug)]
pub enum Invocation {
    PushSri(SignalDescriptor),
    PushPacket {
        packet: WirePacket,
        time: TimeValue,
        eos: bool,
        stream_id: String,
    },
    /// Packet whose payload was written to a shared heap block.
    PushShared {
        block: HeapRef,
        format: ElementFormat,
        count: usize,
        time: TimeValue,
        eos: bool,
        stream_id: String,
    },
    PushMessages(Properties),
    SupportedTransports,
    NegotiateTransport {
        transport_type: String,
        transport_id: String,
        properties: Properties,
    },
    DisconnectTransport {
        transport_id: String,
    },
}

impl Invocation {
    /// Operation name, for logs.
    pub fn operation(&self) -> &'static str {
        match self {
            Invocation::PushSri(_) => "pushSRI",
            Invocation::PushPacket { .. } => "pushPacket",
            Invocation::PushShared { .. } => "pushShared",
            Invocation::PushMessages(_) => "pushMessages",
            Invocation::SupportedTransports => "supportedTransports",
            Invocation::NegotiateTransport { .. } => "negotiateTransport",
            Invocation::DisconnectTransport { .. } => "disconnectTransport",
        }
    }

    /// Approximate request size in bytes, as checked against transfer limits.
    pub fn payload_len(&self) -> usize {
        match self {
            Invocation::PushSri(sri) => 64 + sri.stream_id.len() + sri.keywords.encoded_len(),
            Invocation::PushPacket {
                packet, stream_id, ..
            } => packet.wire_size() + stream_id.len() + 32,
            Invocation::PushShared { stream_id, .. } => 64 + stream_id.len(),
            Invocation::PushMessages(messages) => messages.encoded_len(),
            Invocation::NegotiateTransport {
                transport_type,
                transport_id,
                properties,
            } => transport_type.len() + transport_id.len() + properties.encoded_len(),
            Invocation::SupportedTransports | Invocation::DisconnectTransport { .. } => 16,
        }
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Empty,
    Transports(Vec<TransportDescription>),
    Negotiated {
        transport_id: String,
        properties: Properties,
    },
}

/// Failure reported by the substrate.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteFailure {
    /// Connection lost or peer process gone.
    Communication(String),
    /// Request larger than the substrate accepts.
    MessageSizeExceeded { size: usize, limit: usize },
    /// Call did not complete within the call timeout.
    Timeout,
    ObjectNotExist,
    /// Peer does not implement the operation or rejected its arguments.
    BadOperation(String),
    /// Peer understood the request and refused it.
    Rejected(String),
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::Communication(msg) => write!(f, "communication failure: {}", msg),
            RemoteFailure::MessageSizeExceeded { size, limit } => {
                write!(f, "message size {} exceeds limit {}", size, limit)
            }
            RemoteFailure::Timeout => write!(f, "call timed out"),
            RemoteFailure::ObjectNotExist => write!(f, "object does not exist"),
            RemoteFailure::BadOperation(msg) => write!(f, "bad operation: {}", msg),
            RemoteFailure::Rejected(msg) => write!(f, "rejected: {}", msg),
        }
    }
}

impl std::error::Error for RemoteFailure {}

/// Object reachable through the substrate.
pub trait RemoteObject: Send + Sync {
    /// Interface check; `Err` when the object cannot be reached.
    fn is_a(&self, repo_id: &str) -> Result<bool, RemoteFailure>;

    /// The in-process implementation, when the object lives in this process.
    fn local_servant(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    fn invoke(&self, invocation: Invocation) -> Result<Reply, RemoteFailure>;

    /// Bound subsequent calls; `None` restores the substrate default.
    fn set_call_timeout(&self, _timeout: Option<Duration>) {}

    fn describe(&self) -> String;
}

/// In-process endpoint implementation.
pub trait Servant: Send + Sync + 'static {
    fn supports(&self, repo_id: &str) -> bool;

    fn dispatch(&self, invocation: Invocation) -> Result<Reply, RemoteFailure>;

    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// [`RemoteObject`] backed by a servant in this process.
pub struct LocalObject<S: Servant> {
    servant: Arc<S>,
}

impl<S: Servant> LocalObject<S> {
    pub fn new(servant: Arc<S>) -> Self {
        Self { servant }
    }
}

impl<S: Servant> RemoteObject for LocalObject<S> {
    fn is_a(&self, repo_id: &str) -> Result<bool, RemoteFailure> {
        Ok(self.servant.supports(repo_id))
    }

    fn local_servant(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        let servant: Arc<dyn Any + Send + Sync> = self.servant.clone();
        Some(servant)
    }

    fn invoke(&self, invocation: Invocation) -> Result<Reply, RemoteFailure> {
        self.servant.dispatch(invocation)
    }

    fn describe(&self) -> String {
        format!("local:{}", self.servant.describe())
    }
}

/// Shared handle to a substrate object.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn RemoteObject>);

impl ObjectRef {
    pub fn new(object: Arc<dyn RemoteObject>) -> Self {
        Self(object)
    }

    /// Handle to an in-process servant.
    pub fn local<S: Servant>(servant: Arc<S>) -> Self {
        Self(Arc::new(LocalObject::new(servant)))
    }

    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn is_a(&self, repo_id: &str) -> Result<bool, RemoteFailure> {
        self.0.is_a(repo_id)
    }

    /// Type-erased in-process implementation, if any.
    pub fn local_servant_any(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.0.local_servant()
    }

    /// In-process implementation of type `T`, if the object is local and of that type.
    pub fn local_servant<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.local_servant()?.downcast::<T>().ok()
    }

    pub fn is_local(&self) -> bool {
        self.0.local_servant().is_some()
    }

    pub fn invoke(&self, invocation: Invocation) -> Result<Reply, RemoteFailure> {
        self.0.invoke(invocation)
    }

    pub fn set_call_timeout(&self, timeout: Option<Duration>) {
        self.0.set_call_timeout(timeout);
    }

    /// True when both handles refer to the same object.
    pub fn same_object(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    pub fn describe(&self) -> String {
        self.0.describe()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.0.describe())
    }
}
