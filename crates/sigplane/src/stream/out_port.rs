// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Producer-side stream port.
//!
//! # Architecture
//!
//! ```text
//! OutPort ──► stream table (id -> descriptor, version)
//!    │
//!    └──► TransportNegotiator ──► [StreamLink + transport] per connection
//!                                   local | shmipc | remote
//! ```
//!
//! Every descriptor handed to the port gets a new version number. Links
//! compare versions, so a changed descriptor is forwarded once per link,
//! ahead of the first packet that uses it.
//!
//! Delivery snapshots the connection set, then pushes to every alive,
//! routed link under that link's own lock. A fatal transport failure marks
//! the link dead; later pushes skip it until it is reconnected.

use super::link::StreamLink;
use super::local::LocalTransport;
use super::negotiated::TransportManager;
use super::remote::RemoteTransport;
use super::{InPort, OutputStream, TransportError};
use crate::alloc::BufferManager;
use crate::config::RuntimeConfig;
use crate::element::ElementKind;
use crate::error::{Error, Result};
use crate::port::filter::ConnectionFilter;
use crate::port::negotiator::{
    ConnectionDetails, ConnectionInfo, ConnectionState, LinkFactory, PortUsageState,
    TransportNegotiator, UsesLink,
};
use crate::port::statistics::PortStatistics;
use crate::rpc::{ObjectRef, TransportDescription};
use crate::sri::SignalDescriptor;
use crate::time::TimeValue;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Builds [`StreamLink`]s for an [`OutPort`].
pub struct StreamLinkFactory<K: ElementKind> {
    allocator: Arc<BufferManager>,
    config: RuntimeConfig,
    managers: RwLock<Vec<Arc<dyn TransportManager<K>>>>,
}

impl<K: ElementKind> StreamLinkFactory<K> {
    pub fn new(config: RuntimeConfig, allocator: Arc<BufferManager>) -> Self {
        Self {
            allocator,
            config,
            managers: RwLock::new(Vec::new()),
        }
    }

    /// Add a negotiated transport manager; managers stay sorted by priority.
    pub fn register(&self, manager: Arc<dyn TransportManager<K>>) {
        let mut managers = self.managers.write();
        managers.push(manager);
        managers.sort_by_key(|m| Reverse(m.priority()));
    }

    pub fn transport_types(&self) -> Vec<String> {
        self.managers
            .read()
            .iter()
            .map(|m| m.transport_type().to_string())
            .collect()
    }
}

impl<K: ElementKind> LinkFactory for StreamLinkFactory<K> {
    type Link = StreamLink<K>;

    fn repo_id(&self) -> &str {
        K::REPO_ID
    }

    fn create_local_link(
        &self,
        servant: Arc<dyn Any + Send + Sync>,
        connection_id: &str,
    ) -> Option<StreamLink<K>> {
        let port = servant.downcast::<InPort<K>>().ok()?;
        Some(StreamLink::new(connection_id, Box::new(LocalTransport::new(port))))
    }

    fn create_negotiated_link(
        &self,
        objref: &ObjectRef,
        connection_id: &str,
        offered: &[TransportDescription],
    ) -> Option<StreamLink<K>> {
        let managers = self.managers.read().clone();
        for manager in managers {
            let Some(offer) = offered
                .iter()
                .find(|t| t.transport_type == manager.transport_type())
            else {
                continue;
            };
            match manager.negotiate(objref, connection_id, offer) {
                Ok(Some(transport)) => {
                    log::debug!(
                        "[StreamLinkFactory] '{}': negotiated {}",
                        connection_id,
                        offer.transport_type
                    );
                    return Some(StreamLink::new(connection_id, transport));
                }
                Ok(None) => log::debug!(
                    "[StreamLinkFactory] '{}': {} declined",
                    connection_id,
                    offer.transport_type
                ),
                Err(err) => log::debug!(
                    "[StreamLinkFactory] '{}': {} failed: {}",
                    connection_id,
                    offer.transport_type,
                    err
                ),
            }
        }
        None
    }

    fn create_remote_link(&self, objref: &ObjectRef, connection_id: &str) -> Result<StreamLink<K>> {
        let transport = RemoteTransport::<K>::new(
            objref.duplicate(),
            Arc::clone(&self.allocator),
            self.config.max_transfer_bytes(),
        );
        Ok(StreamLink::new(connection_id, Box::new(transport)))
    }
}

struct StreamEntry {
    sri: Arc<SignalDescriptor>,
    version: u64,
}

/// Output port for samples of kind `K`.
pub struct OutPort<K: ElementKind> {
    name: String,
    negotiator: TransportNegotiator<StreamLinkFactory<K>>,
    streams: Mutex<HashMap<String, StreamEntry>>,
    next_version: AtomicU64,
    filter: RwLock<ConnectionFilter>,
}

impl<K: ElementKind> OutPort<K> {
    /// Port using the process-wide configuration and buffer manager.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_context(name, RuntimeConfig::global().clone(), BufferManager::global())
    }

    pub fn with_context(
        name: impl Into<String>,
        config: RuntimeConfig,
        allocator: Arc<BufferManager>,
    ) -> Self {
        let name = name.into();
        let factory = StreamLinkFactory::new(config.clone(), allocator);
        Self {
            negotiator: TransportNegotiator::new(name.clone(), factory, config),
            name,
            streams: Mutex::new(HashMap::new()),
            next_version: AtomicU64::new(1),
            filter: RwLock::new(ConnectionFilter::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // Connections
    // ========================================================================

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

    pub fn connection_state(&self, connection_id: &str) -> ConnectionState {
        self.negotiator.connection_state(connection_id)
    }

    pub fn state(&self) -> PortUsageState {
        self.negotiator.state()
    }

    /// Make a negotiated transport available to future connections.
    pub fn register_transport(&self, manager: Arc<dyn TransportManager<K>>) {
        log::debug!(
            "[OutPort] {}: registered {} transport",
            self.name,
            manager.transport_type()
        );
        self.negotiator.factory().register(manager);
    }

    pub fn add_connect_listener<L>(&self, listener: L)
    where
        L: Fn(&str) + Send + Sync + 'static,
    {
        self.negotiator.add_connect_listener(listener);
    }

    pub fn add_disconnect_listener<L>(&self, listener: L)
    where
        L: Fn(&str) + Send + Sync + 'static,
    {
        self.negotiator.add_disconnect_listener(listener);
    }

    pub fn set_connection_filter(&self, filter: ConnectionFilter) {
        *self.filter.write() = filter;
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Make `sri` the descriptor of its stream and forward it to every link.
    pub fn push_sri(&self, sri: SignalDescriptor) -> Result<()> {
        let (sri, version) = self.update_sri(sri)?;
        let stream_id = sri.stream_id.clone();
        self.deliver(&stream_id, |link| link.push_sri(&sri, version))
    }

    /// Push samples on `stream_id` using its current descriptor.
    ///
    /// A stream without a descriptor gets a default one. With `eos` set the
    /// stream ends and its descriptor is dropped.
    pub fn push_packet(&self, payload: K::Buffer, time: TimeValue, eos: bool, stream_id: &str) -> Result<()> {
        let (sri, version) = self.current_or_default(stream_id)?;
        let result = self.deliver(stream_id, |link| {
            link.push(&payload, time, eos, &sri, version)
        });
        if eos {
            let mut streams = self.streams.lock();
            if streams.get(stream_id).is_some_and(|e| e.version == version) {
                streams.remove(stream_id);
            }
        }
        result
    }

    /// Push samples described by `sri`, adopting it first if it changed.
    pub fn push(&self, payload: K::Buffer, time: TimeValue, eos: bool, sri: &SignalDescriptor) -> Result<()> {
        let current = self.current_sri(&sri.stream_id);
        if current.as_ref() != Some(sri) {
            self.update_sri(sri.clone())?;
        }
        self.push_packet(payload, time, eos, &sri.stream_id)
    }

    /// End `stream_id` with an empty packet.
    pub fn send_eos(&self, stream_id: &str) -> Result<()> {
        self.push_packet(K::empty(), TimeValue::not_set(), true, stream_id)
    }

    /// Write handle for one stream.
    pub fn create_stream(&self, sri: SignalDescriptor) -> OutputStream<'_, K> {
        OutputStream::new(self, sri)
    }

    pub fn active_sris(&self) -> Vec<SignalDescriptor> {
        self.streams
            .lock()
            .values()
            .map(|entry| entry.sri.as_ref().clone())
            .collect()
    }

    pub fn current_sri(&self, stream_id: &str) -> Option<SignalDescriptor> {
        self.streams
            .lock()
            .get(stream_id)
            .map(|entry| entry.sri.as_ref().clone())
    }

    /// Per-connection statistics.
    pub fn statistics(&self) -> Vec<(String, PortStatistics)> {
        self.negotiator
            .snapshot()
            .into_iter()
            .map(|(id, link)| {
                let stats = link.lock().statistics();
                (id, stats)
            })
            .collect()
    }

    fn update_sri(&self, sri: SignalDescriptor) -> Result<(Arc<SignalDescriptor>, u64)> {
        if sri.stream_id.is_empty() {
            return Err(Error::InvalidDescriptor("stream id must not be empty".into()));
        }
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let sri = Arc::new(sri);
        self.streams.lock().insert(
            sri.stream_id.clone(),
            StreamEntry {
                sri: Arc::clone(&sri),
                version,
            },
        );
        Ok((sri, version))
    }

    fn current_or_default(&self, stream_id: &str) -> Result<(Arc<SignalDescriptor>, u64)> {
        if let Some(entry) = self.streams.lock().get(stream_id) {
            return Ok((Arc::clone(&entry.sri), entry.version));
        }
        log::debug!(
            "[OutPort::push_packet] {}: no descriptor for '{}', using default",
            self.name,
            stream_id
        );
        self.update_sri(SignalDescriptor::new(stream_id)?)
    }

    fn deliver<F>(&self, stream_id: &str, mut push: F) -> Result<()>
    where
        F: FnMut(&mut StreamLink<K>) -> std::result::Result<(), TransportError>,
    {
        let filter = self.filter.read().clone();
        let mut failures = Vec::new();

        for (connection_id, link) in self.negotiator.snapshot() {
            if !filter.is_routed(&self.name, stream_id, &connection_id) {
                continue;
            }
            let mut link = link.lock();
            if !link.is_alive() {
                continue;
            }
            if let Err(err) = push(&mut link) {
                link.record_error();
                if err.is_fatal() {
                    link.set_alive(false);
                }
                log::error!(
                    "[OutPort::push_packet] {}: stream '{}' to '{}' failed: {}",
                    self.name,
                    stream_id,
                    connection_id,
                    err
                );
                failures.push((connection_id, err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Delivery {
                stream_id: stream_id.to_string(),
                failures,
            })
        }
    }
}
