// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{InPort, OutputTransport, Packet, TransportError};
use crate::element::ElementKind;
use crate::props::Properties;
use crate::sri::SignalDescriptor;
use std::sync::Arc;

/// In-process transport: packets are queued on the consumer port directly,
/// sharing payload storage with the producer.
pub struct LocalTransport<K: ElementKind> {
    port: Arc<InPort<K>>,
}

impl<K: ElementKind> LocalTransport<K> {
    pub fn new(port: Arc<InPort<K>>) -> Self {
        Self { port }
    }
}

impl<K: ElementKind> OutputTransport<K> for LocalTransport<K> {
    fn transport_type(&self) -> &str {
        "local"
    }

    fn transport_info(&self) -> Properties {
        let mut info = Properties::new();
        info.set("port", self.port.name());
        info
    }

    // The descriptor travels with the packet flagged `sri_changed`.
    fn push_sri(&mut self, _sri: &SignalDescriptor) -> Result<(), TransportError> {
        Ok(())
    }

    fn push_packet(&mut self, packet: Packet<K>) -> Result<(), TransportError> {
        self.port.queue_packet(packet);
        Ok(())
    }
}
