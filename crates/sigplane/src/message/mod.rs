// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured messages between components.
//!
//! A [`MessageSupplierPort`] fans messages out to connected
//! [`MessageConsumerPort`]s through the same [`TransportNegotiator`] as the
//! stream ports. In-process consumers receive typed messages directly when
//! the registered callback expects the same type; otherwise, and for remote
//! consumers, messages travel as serialized [`Value`]s.
//!
//! [`TransportNegotiator`]: crate::port::TransportNegotiator

mod consumer;
mod supplier;
mod transport;

pub use consumer::{MessageCallback, MessageConsumerPort};
pub use supplier::{MessageLink, MessageLinkFactory, MessageSupplierPort};
pub use transport::{LocalMessageTransport, MessageTransport, RemoteMessageTransport};

use crate::props::Value;

/// A typed message.
pub trait Message: Send + Sync + Sized + 'static {
    /// Message id used for routing to callbacks.
    const ID: &'static str;

    fn to_value(&self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;

    /// Format tag; equal tags allow direct dispatch without serialization.
    fn format() -> &'static str {
        std::any::type_name::<Self>()
    }
}
