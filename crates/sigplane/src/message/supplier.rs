// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::consumer::MessageConsumerPort;
use super::transport::{LocalMessageTransport, MessageTransport, RemoteMessageTransport};
use super::Message;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::port::negotiator::{
    ConnectionDetails, ConnectionInfo, LinkFactory, PortUsageState, TransportNegotiator, UsesLink,
};
use crate::props::Properties;
use crate::rpc::{ObjectRef, MESSAGE_CONSUMER_REPO_ID};
use crate::stream::TransportError;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// One message connection.
pub struct MessageLink {
    transport: Box<dyn MessageTransport>,
    alive: bool,
}

impl MessageLink {
    pub fn new(transport: Box<dyn MessageTransport>) -> Self {
        Self {
            transport,
            alive: true,
        }
    }

    pub fn transport_mut(&mut self) -> &mut dyn MessageTransport {
        self.transport.as_mut()
    }
}

impl UsesLink for MessageLink {
    fn transport_type(&self) -> String {
        self.transport.transport_type().to_string()
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
        self.transport.disconnect()
    }
}

/// Builds [`MessageLink`]s: local for in-process consumers, remote otherwise.
#[derive(Debug, Default)]
pub struct MessageLinkFactory;

impl LinkFactory for MessageLinkFactory {
    type Link = MessageLink;

    fn repo_id(&self) -> &str {
        MESSAGE_CONSUMER_REPO_ID
    }

    fn create_local_link(
        &self,
        servant: Arc<dyn Any + Send + Sync>,
        _connection_id: &str,
    ) -> Option<MessageLink> {
        let consumer = servant.downcast::<MessageConsumerPort>().ok()?;
        Some(MessageLink::new(Box::new(LocalMessageTransport::new(consumer))))
    }

    fn create_remote_link(&self, objref: &ObjectRef, _connection_id: &str) -> Result<MessageLink> {
        Ok(MessageLink::new(Box::new(RemoteMessageTransport::new(
            objref.duplicate(),
        ))))
    }
}

/// Message producer endpoint.
///
/// Every send targets one connection id, or all connections when the id is
/// empty. A failure on one connection is logged and does not stop delivery
/// to the others.
pub struct MessageSupplierPort {
    name: String,
    negotiator: TransportNegotiator<MessageLinkFactory>,
}

impl MessageSupplierPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, RuntimeConfig::global().clone())
    }

    pub fn with_config(name: impl Into<String>, config: RuntimeConfig) -> Self {
        let name = name.into();
        Self {
            negotiator: TransportNegotiator::new(name.clone(), MessageLinkFactory, config),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connect_port(&self, objref: Option<ObjectRef>, connection_id: &str) -> Result<()> {
        self.negotiator.connect_port(objref, connection_id)
    }

    pub fn disconnect_port(&self, connection_id: &str) -> Result<()> {
        self.negotiator.disconnect_port(connection_id)
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.negotiator.connections()
    }

    pub fn connection_details(&self) -> Vec<ConnectionDetails> {
        self.negotiator.connection_details()
    }

    pub fn state(&self) -> PortUsageState {
        self.negotiator.state()
    }

    /// Send serialized messages as-is.
    pub fn push(&self, messages: &Properties, connection_id: &str) -> Result<()> {
        self.for_each_target(connection_id, |transport| transport.push(messages))
    }

    pub fn send_message<M: Message>(&self, message: &M, connection_id: &str) -> Result<()> {
        self.send_messages(std::slice::from_ref(message), connection_id)
    }

    /// Send `messages` as one batch per connection.
    pub fn send_messages<M: Message>(&self, messages: &[M], connection_id: &str) -> Result<()> {
        self.for_each_target(connection_id, |transport| {
            transport.begin_queue(messages.len());
            for message in messages {
                transport.queue_message(M::ID, M::format(), message, &|| message.to_value());
            }
            transport.send_messages()
        })
    }

    fn targets(&self, connection_id: &str) -> Result<Vec<(String, Arc<Mutex<MessageLink>>)>> {
        if connection_id.is_empty() {
            return Ok(self.negotiator.snapshot());
        }
        self.negotiator
            .link(connection_id)
            .map(|link| vec![(connection_id.to_string(), link)])
            .ok_or_else(|| Error::InvalidConnection(format!("invalid connection '{}'", connection_id)))
    }

    fn for_each_target<F>(&self, connection_id: &str, mut send: F) -> Result<()>
    where
        F: FnMut(&mut dyn MessageTransport) -> std::result::Result<(), TransportError>,
    {
        for (id, link) in self.targets(connection_id)? {
            let mut link = link.lock();
            if !link.is_alive() {
                continue;
            }
            if let Err(err) = send(link.transport_mut()) {
                if err.is_fatal() {
                    link.set_alive(false);
                }
                log::warn!(
                    "[MessageSupplierPort] {}: could not deliver the message to '{}': {}",
                    self.name,
                    id,
                    err
                );
            }
        }
        Ok(())
    }
}
