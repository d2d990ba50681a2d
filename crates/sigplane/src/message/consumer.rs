// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::Message;
use crate::props::Value;
use crate::rpc::{Invocation, RemoteFailure, Reply, Servant, MESSAGE_CONSUMER_REPO_ID};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type DirectFn = Box<dyn Fn(&str, &(dyn Any + Send + Sync)) + Send + Sync>;
type SerializedFn = Box<dyn Fn(&str, &Value) + Send + Sync>;
type GenericFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Callback registered for one message id.
pub struct MessageCallback {
    format: &'static str,
    direct: DirectFn,
    serialized: SerializedFn,
}

impl MessageCallback {
    /// True when messages tagged `format` can be handed over without serialization.
    pub fn is_compatible(&self, format: &str) -> bool {
        self.format == format
    }

    /// Deliver an unserialized message; the caller has checked `is_compatible`.
    pub fn dispatch_direct(&self, message_id: &str, message: &(dyn Any + Send + Sync)) {
        (self.direct)(message_id, message);
    }

    pub fn dispatch(&self, message_id: &str, value: &Value) {
        (self.serialized)(message_id, value);
    }
}

/// Message consumer endpoint.
pub struct MessageConsumerPort {
    name: String,
    callbacks: RwLock<HashMap<String, Arc<MessageCallback>>>,
    generic: RwLock<Vec<GenericFn>>,
}

impl MessageConsumerPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callbacks: RwLock::new(HashMap::new()),
            generic: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call `callback` for every message with id `M::ID`.
    pub fn register_message<M, F>(&self, callback: F)
    where
        M: Message,
        F: Fn(&str, &M) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let direct_cb = Arc::clone(&callback);
        let port = self.name.clone();
        let entry = MessageCallback {
            format: M::format(),
            direct: Box::new(move |id, message| match message.downcast_ref::<M>() {
                Some(message) => direct_cb(id, message),
                None => log::warn!("[MessageConsumerPort] {}: '{}' has unexpected type", port, id),
            }),
            serialized: {
                let port = self.name.clone();
                Box::new(move |id, value| match M::from_value(value) {
                    Some(message) => callback(id, &message),
                    None => log::warn!(
                        "[MessageConsumerPort] {}: cannot decode '{}' as {}",
                        port,
                        id,
                        M::format()
                    ),
                })
            },
        };
        self.callbacks
            .write()
            .insert(M::ID.to_string(), Arc::new(entry));
    }

    /// Call `callback` for every message regardless of id.
    pub fn register_generic<F>(&self, callback: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.generic.write().push(Arc::new(callback));
    }

    pub fn message_callback(&self, message_id: &str) -> Option<Arc<MessageCallback>> {
        self.callbacks.read().get(message_id).cloned()
    }

    pub fn has_generic_callbacks(&self) -> bool {
        !self.generic.read().is_empty()
    }

    /// Deliver a serialized message to its id callback and the generic callbacks.
    pub fn fire_callback(&self, message_id: &str, value: &Value) {
        match self.message_callback(message_id) {
            Some(callback) => callback.dispatch(message_id, value),
            None if !self.has_generic_callbacks() => {
                log::debug!(
                    "[MessageConsumerPort] {}: no callback for '{}'",
                    self.name,
                    message_id
                );
            }
            None => {}
        }
        self.dispatch_generic(message_id, value);
    }

    pub fn dispatch_generic(&self, message_id: &str, value: &Value) {
        let generic: Vec<GenericFn> = self.generic.read().clone();
        for callback in generic {
            callback(message_id, value);
        }
    }
}

impl Servant for MessageConsumerPort {
    fn supports(&self, repo_id: &str) -> bool {
        repo_id == MESSAGE_CONSUMER_REPO_ID
    }

    fn dispatch(&self, invocation: Invocation) -> Result<Reply, RemoteFailure> {
        match invocation {
            Invocation::PushMessages(messages) => {
                for message in &messages {
                    self.fire_callback(&message.id, &message.value);
                }
                Ok(Reply::Empty)
            }
            other => Err(RemoteFailure::BadOperation(other.operation().to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("MessageConsumerPort({})", self.name)
    }
}
