// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::consumer::{MessageCallback, MessageConsumerPort};
use crate::props::{Properties, Property, Value};
use crate::rpc::{Invocation, ObjectRef, RemoteFailure};
use crate::stream::TransportError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Sending half of one message connection.
pub trait MessageTransport: Send {
    fn transport_type(&self) -> &str;

    /// Send already serialized messages.
    fn push(&mut self, messages: &Properties) -> Result<(), TransportError>;

    /// Start a batch of `count` messages.
    fn begin_queue(&mut self, _count: usize) {}

    /// Add one message to the batch. `serialize` is only called if the
    /// transport needs the serialized form.
    fn queue_message(
        &mut self,
        message_id: &str,
        format: &str,
        message: &(dyn Any + Send + Sync),
        serialize: &dyn Fn() -> Value,
    );

    /// Flush the batch.
    fn send_messages(&mut self) -> Result<(), TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Delivers to an in-process consumer by calling its callbacks.
pub struct LocalMessageTransport {
    consumer: Arc<MessageConsumerPort>,
    /// Callback and direct-dispatch decision per message id.
    callbacks: HashMap<String, (Arc<MessageCallback>, bool)>,
}

impl LocalMessageTransport {
    pub fn new(consumer: Arc<MessageConsumerPort>) -> Self {
        Self {
            consumer,
            callbacks: HashMap::new(),
        }
    }

    fn callback(&mut self, message_id: &str, format: &str) -> Option<(Arc<MessageCallback>, bool)> {
        if let Some(entry) = self.callbacks.get(message_id) {
            return Some(entry.clone());
        }
        let callback = self.consumer.message_callback(message_id)?;
        let direct = callback.is_compatible(format);
        let entry = (callback, direct);
        self.callbacks.insert(message_id.to_string(), entry.clone());
        Some(entry)
    }
}

impl MessageTransport for LocalMessageTransport {
    fn transport_type(&self) -> &str {
        "local"
    }

    fn push(&mut self, messages: &Properties) -> Result<(), TransportError> {
        for message in messages {
            self.consumer.fire_callback(&message.id, &message.value);
        }
        Ok(())
    }

    fn queue_message(
        &mut self,
        message_id: &str,
        format: &str,
        message: &(dyn Any + Send + Sync),
        serialize: &dyn Fn() -> Value,
    ) {
        let mut serialized: Option<Value> = None;
        if let Some((callback, direct)) = self.callback(message_id, format) {
            if direct {
                callback.dispatch_direct(message_id, message);
            } else {
                callback.dispatch(message_id, serialized.get_or_insert_with(serialize));
            }
        }
        if self.consumer.has_generic_callbacks() {
            let value = serialized.get_or_insert_with(serialize);
            self.consumer.dispatch_generic(message_id, value);
        }
    }

    // Messages were delivered as they were queued.
    fn send_messages(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Delivers through the substrate as one `PushMessages` call per batch.
pub struct RemoteMessageTransport {
    objref: ObjectRef,
    queue: Properties,
}

impl RemoteMessageTransport {
    pub fn new(objref: ObjectRef) -> Self {
        Self {
            objref,
            queue: Properties::new(),
        }
    }
}

impl MessageTransport for RemoteMessageTransport {
    fn transport_type(&self) -> &str {
        "remote"
    }

    fn push(&mut self, messages: &Properties) -> Result<(), TransportError> {
        match self.objref.invoke(Invocation::PushMessages(messages.clone())) {
            Ok(_) => Ok(()),
            Err(RemoteFailure::MessageSizeExceeded { .. }) => Err(TransportError::Recoverable(
                "Maximum message size exceeded".into(),
            )),
            Err(failure) => Err(failure.into()),
        }
    }

    fn begin_queue(&mut self, _count: usize) {
        self.queue.clear();
    }

    fn queue_message(
        &mut self,
        message_id: &str,
        _format: &str,
        _message: &(dyn Any + Send + Sync),
        serialize: &dyn Fn() -> Value,
    ) {
        self.queue.push(Property::new(message_id, serialize()));
    }

    fn send_messages(&mut self) -> Result<(), TransportError> {
        if self.queue.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.queue);
        self.push(&batch)
    }
}
