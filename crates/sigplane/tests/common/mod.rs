// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for integration tests.
//!
//! - [`RemotePeer`]: exposes an in-process servant as if it lived in another
//!   process (no local servant), enforcing a request size limit and
//!   recording every operation.
//! - [`MemoryHeap`]: `SharedHeap` backed by process memory, counting
//!   releases of blocks that were already freed.

#![allow(dead_code)]

use parking_lot::Mutex;
use sigplane::rpc::{
    HeapError, HeapRef, Invocation, RemoteFailure, RemoteObject, Reply, Servant, SharedHeap,
    NEGOTIABLE_PROVIDES_REPO_ID,
};
use sigplane::ObjectRef;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: &'static str,
    pub size: usize,
    /// `(element count, eos)` for packet pushes.
    pub packet: Option<(usize, bool)>,
}

/// Servant seen through a simulated substrate.
pub struct RemotePeer<S: Servant> {
    servant: Arc<S>,
    limit: usize,
    hide_negotiable: bool,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<VecDeque<RemoteFailure>>,
    lost_replies: Mutex<VecDeque<RemoteFailure>>,
    timeout: Mutex<Option<Duration>>,
}

impl<S: Servant> RemotePeer<S> {
    pub fn new(servant: Arc<S>, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            servant,
            limit,
            hide_negotiable: false,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            lost_replies: Mutex::new(VecDeque::new()),
            timeout: Mutex::new(None),
        })
    }

    /// Peer that does not admit to supporting transport negotiation.
    pub fn plain(servant: Arc<S>, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            servant,
            limit,
            hide_negotiable: true,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            lost_replies: Mutex::new(VecDeque::new()),
            timeout: Mutex::new(None),
        })
    }

    pub fn objref(self: &Arc<Self>) -> ObjectRef {
        let object: Arc<dyn RemoteObject> = self.clone();
        ObjectRef::new(object)
    }

    /// Fail the next invocation with `failure`.
    pub fn fail_next(&self, failure: RemoteFailure) {
        self.failures.lock().push_back(failure);
    }

    /// Dispatch the next invocation, then report `failure` instead of the reply.
    pub fn lose_next_reply(&self, failure: RemoteFailure) {
        self.lost_replies.lock().push_back(failure);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn packet_calls(&self) -> Vec<(usize, bool)> {
        self.calls.lock().iter().filter_map(|c| c.packet).collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        *self.timeout.lock()
    }
}

impl<S: Servant> RemoteObject for RemotePeer<S> {
    fn is_a(&self, repo_id: &str) -> Result<bool, RemoteFailure> {
        if self.hide_negotiable && repo_id == NEGOTIABLE_PROVIDES_REPO_ID {
            return Ok(false);
        }
        Ok(self.servant.supports(repo_id))
    }

    fn invoke(&self, invocation: Invocation) -> Result<Reply, RemoteFailure> {
        let size = invocation.payload_len();
        let packet = match &invocation {
            Invocation::PushPacket { packet, eos, .. } => Some((packet.count, *eos)),
            Invocation::PushShared { count, eos, .. } => Some((*count, *eos)),
            _ => None,
        };
        self.calls.lock().push(Call {
            operation: invocation.operation(),
            size,
            packet,
        });

        if let Some(failure) = self.failures.lock().pop_front() {
            return Err(failure);
        }
        if size > self.limit {
            return Err(RemoteFailure::MessageSizeExceeded {
                size,
                limit: self.limit,
            });
        }
        let reply = self.servant.dispatch(invocation);
        if let Some(failure) = self.lost_replies.lock().pop_front() {
            return Err(failure);
        }
        reply
    }

    fn set_call_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock() = timeout;
    }

    fn describe(&self) -> String {
        format!("remote:{}", self.servant.describe())
    }
}

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(0x4845_4150);

/// In-memory shared heap with a byte budget.
pub struct MemoryHeap {
    id: u64,
    capacity: usize,
    next_offset: AtomicUsize,
    blocks: Mutex<HashMap<usize, Vec<u8>>>,
    double_frees: AtomicUsize,
}

impl MemoryHeap {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            next_offset: AtomicUsize::new(0),
            blocks: Mutex::new(HashMap::new()),
            double_frees: AtomicUsize::new(0),
        })
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Deallocations of blocks that were already released.
    pub fn double_frees(&self) -> usize {
        self.double_frees.load(Ordering::Relaxed)
    }

    fn used(&self) -> usize {
        self.blocks.lock().values().map(Vec::len).sum()
    }
}

impl SharedHeap for MemoryHeap {
    fn heap_id(&self) -> u64 {
        self.id
    }

    fn allocate(&self, bytes: usize) -> Result<HeapRef, HeapError> {
        if self.used() + bytes > self.capacity {
            return Err(HeapError::Exhausted { requested: bytes });
        }
        let offset = self.next_offset.fetch_add(bytes.max(1), Ordering::Relaxed);
        self.blocks.lock().insert(offset, vec![0u8; bytes]);
        Ok(HeapRef {
            heap_id: self.id,
            offset,
            len: bytes,
        })
    }

    fn copy_into(&self, block: &HeapRef, bytes: &[u8]) -> Result<(), HeapError> {
        let mut blocks = self.blocks.lock();
        let storage = blocks
            .get_mut(&block.offset)
            .ok_or(HeapError::InvalidRef(*block))?;
        if storage.len() != bytes.len() {
            return Err(HeapError::SizeMismatch {
                block: storage.len(),
                data: bytes.len(),
            });
        }
        storage.copy_from_slice(bytes);
        Ok(())
    }

    fn read(&self, block: &HeapRef) -> Result<Vec<u8>, HeapError> {
        self.blocks
            .lock()
            .get(&block.offset)
            .cloned()
            .ok_or(HeapError::InvalidRef(*block))
    }

    fn deallocate(&self, block: HeapRef) {
        if self.blocks.lock().remove(&block.offset).is_none() {
            self.double_frees.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// `n` ramp samples.
pub fn ramp(n: usize) -> sigplane::buffer::SharedBuffer<f32> {
    (0..n).map(|i| i as f32).collect()
}
