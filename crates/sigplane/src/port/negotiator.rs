// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection management and transport selection for uses-side ports.
//!
//! A [`TransportNegotiator`] owns the fan-out connection set of one port.
//! On connect it picks, in order:
//!
//! 1. the factory's **local** link when the peer lives in this process,
//! 2. a **negotiated** link when the peer advertises transports that a
//!    registered manager can serve,
//! 3. the factory's default **remote** link.
//!
//! Steps 1 and 2 can be switched off through [`NegotiationPolicy`]
//! (see [`RuntimeConfig`]). Negotiation failures are logged and fall through
//! to the next step; they never fail the connect.
//!
//! [`NegotiationPolicy`]: crate::config::NegotiationPolicy

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::props::Properties;
use crate::rpc::{Invocation, ObjectRef, Reply, TransportDescription, NEGOTIABLE_PROVIDES_REPO_ID};
use crate::stream::TransportError;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// One established connection as seen by the negotiator.
pub trait UsesLink: Send + 'static {
    fn transport_type(&self) -> String;

    fn transport_info(&self) -> Properties {
        Properties::new()
    }

    fn is_alive(&self) -> bool;

    fn set_alive(&mut self, alive: bool);

    /// Tear down the transport (best effort).
    fn disconnect(&mut self) -> std::result::Result<(), TransportError>;
}

/// Builds links for one kind of port.
pub trait LinkFactory: Send + Sync + 'static {
    type Link: UsesLink;

    /// Interface every peer must implement.
    fn repo_id(&self) -> &str;

    /// Link to an in-process peer; `None` if the servant is not a compatible endpoint.
    fn create_local_link(
        &self,
        servant: Arc<dyn Any + Send + Sync>,
        connection_id: &str,
    ) -> Option<Self::Link>;

    /// Link over one of the transports `offered` by a negotiable peer.
    fn create_negotiated_link(
        &self,
        _objref: &ObjectRef,
        _connection_id: &str,
        _offered: &[TransportDescription],
    ) -> Option<Self::Link> {
        None
    }

    fn create_remote_link(&self, objref: &ObjectRef, connection_id: &str) -> Result<Self::Link>;
}

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Negotiating,
    Connected,
    Disconnecting,
    Removed,
}

/// Whether a port has any connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortUsageState {
    Idle,
    Active,
}

/// Public view of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub objref: ObjectRef,
    pub alive: bool,
}

/// Connection view including transport details.
#[derive(Debug, Clone)]
pub struct ConnectionDetails {
    pub connection_id: String,
    pub transport_type: String,
    pub transport_info: Properties,
    pub state: ConnectionState,
    pub alive: bool,
}

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

struct Connection<L> {
    id: String,
    objref: ObjectRef,
    link: Option<Arc<Mutex<L>>>,
    state: ConnectionState,
}

struct Inner<L> {
    connections: Vec<Connection<L>>,
    active: bool,
}

impl<L> Inner<L> {
    fn position(&self, connection_id: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.id == connection_id)
    }
}

/// Connection set of one port plus the transport selection policy.
pub struct TransportNegotiator<F: LinkFactory> {
    name: String,
    factory: F,
    config: RuntimeConfig,
    inner: Mutex<Inner<F::Link>>,
    connect_listeners: Mutex<Vec<Listener>>,
    disconnect_listeners: Mutex<Vec<Listener>>,
}

impl<F: LinkFactory> TransportNegotiator<F> {
    pub fn new(name: impl Into<String>, factory: F, config: RuntimeConfig) -> Self {
        Self {
            name: name.into(),
            factory,
            config,
            inner: Mutex::new(Inner {
                connections: Vec::new(),
                active: false,
            }),
            connect_listeners: Mutex::new(Vec::new()),
            disconnect_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Connect `objref` under `connection_id`.
    ///
    /// Fails with [`Error::InvalidConnection`] for a nil handle or a peer that
    /// is unreachable or does not implement the factory's interface.
    /// Connecting an id that already exists is a no-op.
    pub fn connect_port(&self, objref: Option<ObjectRef>, connection_id: &str) -> Result<()> {
        let Some(objref) = objref else {
            return Err(Error::InvalidConnection("Nil object reference".into()));
        };
        self.validate_peer(&objref)?;

        {
            let mut inner = self.inner.lock();
            if inner.position(connection_id).is_some() {
                log::debug!(
                    "[{}] connection '{}' already exists, ignoring connect",
                    self.name,
                    connection_id
                );
                return Ok(());
            }
            inner.connections.push(Connection {
                id: connection_id.to_string(),
                objref: objref.clone(),
                link: None,
                state: ConnectionState::Negotiating,
            });
        }

        let link = match self.create_link(&objref, connection_id) {
            Ok(link) => link,
            Err(err) => {
                let mut inner = self.inner.lock();
                if let Some(index) = inner.position(connection_id) {
                    inner.connections.remove(index);
                }
                return Err(err);
            }
        };
        let transport_type = link.transport_type();

        {
            let mut inner = self.inner.lock();
            if let Some(index) = inner.position(connection_id) {
                let connection = &mut inner.connections[index];
                connection.link = Some(Arc::new(Mutex::new(link)));
                connection.state = ConnectionState::Connected;
            }
            inner.active = true;
        }
        log::info!(
            "[{}] connected '{}' to {} using {} transport",
            self.name,
            connection_id,
            objref.describe(),
            transport_type
        );

        self.fire(&self.connect_listeners, connection_id);
        Ok(())
    }

    /// Disconnect and remove `connection_id`.
    ///
    /// Transport teardown failures are logged (warn if the connection was
    /// alive, debug otherwise) and never prevent removal.
    pub fn disconnect_port(&self, connection_id: &str) -> Result<()> {
        let link = {
            let mut inner = self.inner.lock();
            let Some(index) = inner.position(connection_id) else {
                return Err(Error::InvalidConnection(format!(
                    "No connection {} on port {}",
                    connection_id, self.name
                )));
            };
            let connection = &mut inner.connections[index];
            if connection.state != ConnectionState::Connected {
                return Err(Error::InvalidConnection(format!(
                    "Connection {} on port {} is {:?}",
                    connection_id, self.name, connection.state
                )));
            }
            connection.state = ConnectionState::Disconnecting;
            connection.link.clone()
        };

        if let Some(link) = link {
            let mut link = link.lock();
            let alive = link.is_alive();
            if let Err(err) = link.disconnect() {
                if alive {
                    log::warn!("[{}] error disconnecting '{}': {}", self.name, connection_id, err);
                } else {
                    log::debug!(
                        "[{}] error disconnecting dead connection '{}': {}",
                        self.name,
                        connection_id,
                        err
                    );
                }
            }
        }

        {
            let mut inner = self.inner.lock();
            if let Some(index) = inner.position(connection_id) {
                inner.connections.remove(index);
            }
            if inner.connections.is_empty() {
                inner.active = false;
            }
        }
        log::info!("[{}] disconnected '{}'", self.name, connection_id);

        self.fire(&self.disconnect_listeners, connection_id);
        Ok(())
    }

    /// Disconnect every connection (port shutdown).
    pub fn disconnect_all(&self) {
        let ids: Vec<String> = self
            .inner
            .lock()
            .connections
            .iter()
            .filter(|c| c.state == ConnectionState::Connected)
            .map(|c| c.id.clone())
            .collect();
        for id in ids {
            if let Err(err) = self.disconnect_port(&id) {
                log::debug!("[{}] {}", self.name, err);
            }
        }
    }

    /// Connected links, cloned so the caller can push without holding the set lock.
    pub fn snapshot(&self) -> Vec<(String, Arc<Mutex<F::Link>>)> {
        self.inner
            .lock()
            .connections
            .iter()
            .filter(|c| c.state == ConnectionState::Connected)
            .filter_map(|c| c.link.as_ref().map(|link| (c.id.clone(), Arc::clone(link))))
            .collect()
    }

    /// Link for one connected id.
    pub fn link(&self, connection_id: &str) -> Option<Arc<Mutex<F::Link>>> {
        let inner = self.inner.lock();
        let index = inner.position(connection_id)?;
        let connection = &inner.connections[index];
        if connection.state != ConnectionState::Connected {
            return None;
        }
        connection.link.clone()
    }

    pub fn has_connection(&self, connection_id: &str) -> bool {
        self.inner.lock().position(connection_id).is_some()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let inner = self.inner.lock();
        inner
            .connections
            .iter()
            .map(|c| ConnectionInfo {
                connection_id: c.id.clone(),
                objref: c.objref.clone(),
                alive: c.link.as_ref().is_some_and(|link| link.lock().is_alive()),
            })
            .collect()
    }

    pub fn connection_details(&self) -> Vec<ConnectionDetails> {
        let inner = self.inner.lock();
        inner
            .connections
            .iter()
            .map(|c| match &c.link {
                Some(link) => {
                    let link = link.lock();
                    ConnectionDetails {
                        connection_id: c.id.clone(),
                        transport_type: link.transport_type(),
                        transport_info: link.transport_info(),
                        state: c.state,
                        alive: link.is_alive(),
                    }
                }
                None => ConnectionDetails {
                    connection_id: c.id.clone(),
                    transport_type: String::new(),
                    transport_info: Properties::new(),
                    state: c.state,
                    alive: false,
                },
            })
            .collect()
    }

    pub fn connection_state(&self, connection_id: &str) -> ConnectionState {
        let inner = self.inner.lock();
        inner
            .position(connection_id)
            .map(|index| inner.connections[index].state)
            .unwrap_or(ConnectionState::Unconnected)
    }

    pub fn state(&self) -> PortUsageState {
        if self.inner.lock().active {
            PortUsageState::Active
        } else {
            PortUsageState::Idle
        }
    }

    pub fn add_connect_listener<L>(&self, listener: L)
    where
        L: Fn(&str) + Send + Sync + 'static,
    {
        self.connect_listeners.lock().push(Arc::new(listener));
    }

    pub fn add_disconnect_listener<L>(&self, listener: L)
    where
        L: Fn(&str) + Send + Sync + 'static,
    {
        self.disconnect_listeners.lock().push(Arc::new(listener));
    }

    fn fire(&self, listeners: &Mutex<Vec<Listener>>, connection_id: &str) {
        let listeners: Vec<Listener> = listeners.lock().clone();
        for listener in listeners {
            listener(connection_id);
        }
    }

    fn validate_peer(&self, objref: &ObjectRef) -> Result<()> {
        let repo_id = self.factory.repo_id();
        match objref.is_a(repo_id) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::InvalidConnection(format!(
                "Object does not support {}",
                repo_id
            ))),
            Err(failure) => {
                log::debug!("[{}] interface check failed: {}", self.name, failure);
                Err(Error::InvalidConnection("Object unreachable".into()))
            }
        }
    }

    fn create_link(&self, objref: &ObjectRef, connection_id: &str) -> Result<F::Link> {
        let policy = self.config.negotiation_policy();

        if policy.local_transport {
            if let Some(servant) = objref.local_servant_any() {
                if let Some(link) = self.factory.create_local_link(servant, connection_id) {
                    log::debug!("[{}] '{}': using local transport", self.name, connection_id);
                    return Ok(link);
                }
                log::debug!(
                    "[{}] '{}': local object is not a compatible endpoint",
                    self.name,
                    connection_id
                );
            }
        }

        if policy.negotiated_transports {
            if let Some(link) = self.try_negotiate(objref, connection_id) {
                return Ok(link);
            }
        }

        log::debug!("[{}] '{}': using default remote transport", self.name, connection_id);
        self.factory.create_remote_link(objref, connection_id)
    }

    fn try_negotiate(&self, objref: &ObjectRef, connection_id: &str) -> Option<F::Link> {
        match objref.is_a(NEGOTIABLE_PROVIDES_REPO_ID) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(failure) => {
                log::debug!("[{}] negotiable check failed: {}", self.name, failure);
                return None;
            }
        }

        let offered = match objref.invoke(Invocation::SupportedTransports) {
            Ok(Reply::Transports(offered)) => offered,
            Ok(other) => {
                log::debug!("[{}] unexpected reply to supportedTransports: {:?}", self.name, other);
                return None;
            }
            Err(failure) => {
                log::debug!("[{}] supportedTransports failed: {}", self.name, failure);
                return None;
            }
        };
        if offered.is_empty() {
            return None;
        }
        log::debug!(
            "[{}] '{}': peer offers {:?}",
            self.name,
            connection_id,
            offered.iter().map(|t| t.transport_type.as_str()).collect::<Vec<_>>()
        );
        self.factory
            .create_negotiated_link(objref, connection_id, &offered)
    }
}

impl<F: LinkFactory> Drop for TransportNegotiator<F> {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
