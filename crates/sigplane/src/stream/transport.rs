// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::Packet;
use crate::element::ElementKind;
use crate::props::Properties;
use crate::rpc::RemoteFailure;
use crate::sri::SignalDescriptor;
use std::fmt;

/// Failure of one transport operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The peer is gone; the connection is marked dead and skipped afterwards.
    Fatal(String),
    /// The call timed out; the connection stays alive.
    Timeout(String),
    /// The packet was not delivered but the connection is usable.
    Recoverable(String),
}

impl TransportError {
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Fatal(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Fatal(msg) => write!(f, "fatal transport error: {}", msg),
            TransportError::Timeout(msg) => write!(f, "transport timeout: {}", msg),
            TransportError::Recoverable(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<RemoteFailure> for TransportError {
    fn from(failure: RemoteFailure) -> Self {
        match failure {
            RemoteFailure::Timeout => TransportError::Timeout(failure.to_string()),
            other => TransportError::Fatal(other.to_string()),
        }
    }
}

/// Sending half of one connection.
///
/// `push_packet` never splits; the owning link sizes packets with
/// [`max_payload_bytes`](OutputTransport::max_payload_bytes) first.
pub trait OutputTransport<K: ElementKind>: Send {
    /// Short name (`"local"`, `"remote"`, `"shmipc"`, ...).
    fn transport_type(&self) -> &str;

    fn transport_info(&self) -> Properties {
        Properties::new()
    }

    /// Per-call payload limit, if the transport has one.
    fn max_payload_bytes(&self) -> Option<usize> {
        None
    }

    fn push_sri(&mut self, sri: &SignalDescriptor) -> Result<(), TransportError>;

    fn push_packet(&mut self, packet: Packet<K>) -> Result<(), TransportError>;

    /// Called before the final end-of-stream pushes of a disconnect.
    fn begin_disconnect(&mut self) {}

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
