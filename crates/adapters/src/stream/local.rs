// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process stream transport.
//!
//! Every partition gets a `LocalStreamManager` on a shared `LocalNetwork`.
//! A stream is a single channel with an outbound end at the sender and an
//! inbound end at the receiver. Sends and receives are staged under the
//! caller's transaction: a sent message becomes visible only when the
//! sending transaction commits, and a received message is consumed only
//! when the receiving transaction commits (an abort puts it back at the
//! front of the queue).

use super::{
    InboundStreamCallback, MessageStream, StreamDirection, StreamError, StreamManager, StreamState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::debug;
use wv_core::{Link, StreamName};
use wv_storage::{Transaction, TxnId, TxnParticipant};

type Callback = Arc<dyn InboundStreamCallback<LocalStream>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChannelKey {
    from: Link,
    to: Link,
    name: StreamName,
}

/// A message that became visible to its receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: Link,
    pub to: Link,
    pub stream: StreamName,
    pub payload: Vec<u8>,
}

struct ChannelState {
    outbound: StreamState,
    /// `None` until the sender opens the stream.
    inbound: Option<StreamState>,
    /// Transaction that created the stream, until it commits.
    creating_txn: Option<TxnId>,
    queue: VecDeque<Vec<u8>>,
    end_of_stream: bool,
    pending_sends: HashMap<TxnId, Vec<Vec<u8>>>,
    in_flight: HashMap<TxnId, Vec<Vec<u8>>>,
    eos_taken: HashSet<TxnId>,
    pending_deletes: HashMap<TxnId, Vec<(StreamDirection, StreamState)>>,
}

struct Channel {
    key: ChannelKey,
    participant_key: String,
    state: Mutex<ChannelState>,
    changed: Notify,
    network: Weak<NetworkInner>,
}

impl Channel {
    fn is_live(&self) -> bool {
        let state = self.state.lock();
        state.outbound != StreamState::Deleted
            || matches!(state.inbound, Some(s) if s != StreamState::Deleted)
    }
}

impl TxnParticipant for Channel {
    fn commit(&self, txn: TxnId) {
        let mut delivered = Vec::new();
        let mut inbound_deleted = false;
        {
            let mut state = self.state.lock();
            if state.creating_txn == Some(txn) {
                state.creating_txn = None;
            }
            if let Some(sends) = state.pending_sends.remove(&txn) {
                for payload in sends {
                    delivered.push(payload.clone());
                    state.queue.push_back(payload);
                }
            }
            state.in_flight.remove(&txn);
            if state.eos_taken.remove(&txn) && state.inbound == Some(StreamState::Open) {
                state.inbound = Some(StreamState::Closed);
            }
            if let Some(deletes) = state.pending_deletes.remove(&txn) {
                for (direction, _) in deletes {
                    match direction {
                        StreamDirection::Outbound => state.outbound = StreamState::Deleted,
                        StreamDirection::Inbound => {
                            state.inbound = Some(StreamState::Deleted);
                            inbound_deleted = true;
                        }
                    }
                }
            }
        }
        self.changed.notify_waiters();

        if let Some(network) = self.network.upgrade() {
            if !delivered.is_empty() {
                network
                    .deliveries
                    .lock()
                    .extend(delivered.into_iter().map(|payload| Delivery {
                        from: self.key.from.clone(),
                        to: self.key.to.clone(),
                        stream: self.key.name.clone(),
                        payload,
                    }));
            }
            if inbound_deleted {
                network.notify_deleted(&self.key);
            }
        }
    }

    fn abort(&self, txn: TxnId) {
        {
            let mut state = self.state.lock();
            if state.creating_txn == Some(txn) {
                state.creating_txn = None;
                state.outbound = StreamState::Deleted;
            }
            state.pending_sends.remove(&txn);
            if let Some(taken) = state.in_flight.remove(&txn) {
                for payload in taken.into_iter().rev() {
                    state.queue.push_front(payload);
                }
            }
            state.eos_taken.remove(&txn);
            if let Some(deletes) = state.pending_deletes.remove(&txn) {
                for (direction, previous) in deletes {
                    match direction {
                        StreamDirection::Outbound => state.outbound = previous,
                        StreamDirection::Inbound => state.inbound = Some(previous),
                    }
                }
            }
        }
        self.changed.notify_waiters();
    }
}

#[derive(Default)]
struct NetworkInner {
    channels: Mutex<HashMap<ChannelKey, Arc<Channel>>>,
    callbacks: Mutex<HashMap<Link, Vec<(String, Callback)>>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl NetworkInner {
    fn callback_for(&self, to: &Link, name: &StreamName) -> Option<Callback> {
        self.callbacks.lock().get(to).and_then(|registered| {
            registered
                .iter()
                .find(|(prefix, _)| name.as_str().starts_with(prefix.as_str()))
                .map(|(_, cb)| Arc::clone(cb))
        })
    }

    /// Tell the receiver a new inbound stream exists.
    fn announce(&self, channel: Arc<Channel>) {
        let Some(callback) = self.callback_for(&channel.key.to, &channel.key.name) else {
            debug!(stream = %channel.key.name, to = %channel.key.to, "no callback, inbound stream parked");
            return;
        };
        let stream = LocalStream {
            channel,
            direction: StreamDirection::Inbound,
        };
        tokio::spawn(async move {
            if callback
                .inbound_stream_requested(stream.partner(), stream.name())
                .await
            {
                callback.inbound_stream_created(stream).await;
            } else {
                debug!(stream = %stream.name(), "inbound stream rejected");
            }
        });
    }

    fn notify_deleted(&self, key: &ChannelKey) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let Some(callback) = self.callback_for(&key.to, &key.name) else {
            return;
        };
        let Some(channel) = self.channels.lock().get(key).cloned() else {
            return;
        };
        let stream = LocalStream {
            channel,
            direction: StreamDirection::Inbound,
        };
        handle.spawn(async move { callback.inbound_stream_deleted(stream).await });
    }
}

/// Shared in-process transport connecting every partition's stream manager.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    inner: Arc<NetworkInner>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream manager for the partition reachable at `link`.
    pub fn manager(&self, link: Link) -> LocalStreamManager {
        LocalStreamManager {
            link,
            network: self.clone(),
        }
    }

    /// Every message that has become visible to a receiver, in commit order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.inner.deliveries.lock().clone()
    }

    fn streams_where(
        &self,
        direction: StreamDirection,
        filter: impl Fn(&ChannelKey, &ChannelState) -> bool,
    ) -> Vec<LocalStream> {
        self.inner
            .channels
            .lock()
            .values()
            .filter(|channel| {
                let state = channel.state.lock();
                state.creating_txn.is_none() && filter(&channel.key, &state)
            })
            .map(|channel| LocalStream {
                channel: Arc::clone(channel),
                direction,
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct LocalStreamManager {
    link: Link,
    network: LocalNetwork,
}

impl LocalStreamManager {
    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }
}

#[async_trait]
impl StreamManager for LocalStreamManager {
    type Stream = LocalStream;

    async fn create_stream(
        &self,
        txn: &Transaction,
        partner: &Link,
        name: &StreamName,
    ) -> Result<LocalStream, StreamError> {
        txn.ensure_active()?;
        let key = ChannelKey {
            from: self.link.clone(),
            to: partner.clone(),
            name: name.clone(),
        };

        let channel = {
            let mut channels = self.network.inner.channels.lock();
            if channels.get(&key).is_some_and(|existing| existing.is_live()) {
                return Err(StreamError::AlreadyExists(name.clone()));
            }
            let channel = Arc::new(Channel {
                participant_key: format!("stream:{}->{}:{}", key.from, key.to, key.name),
                key: key.clone(),
                state: Mutex::new(ChannelState {
                    outbound: StreamState::Initialized,
                    inbound: None,
                    creating_txn: Some(txn.id()),
                    queue: VecDeque::new(),
                    end_of_stream: false,
                    pending_sends: HashMap::new(),
                    in_flight: HashMap::new(),
                    eos_taken: HashSet::new(),
                    pending_deletes: HashMap::new(),
                }),
                changed: Notify::new(),
                network: Arc::downgrade(&self.network.inner),
            });
            channels.insert(key, Arc::clone(&channel));
            channel
        };

        let participant: Arc<dyn TxnParticipant> = channel.clone();
        txn.enlist(&channel.participant_key, participant)?;
        debug!(stream = %name, partner = %partner, txn = txn.id(), "stream created");
        Ok(LocalStream {
            channel,
            direction: StreamDirection::Outbound,
        })
    }

    /// Registering a prefix again replaces the earlier callback.
    fn register_callback_by_prefix(
        &self,
        prefix: &str,
        callback: Arc<dyn InboundStreamCallback<LocalStream>>,
    ) -> Result<(), StreamError> {
        let mut callbacks = self.network.inner.callbacks.lock();
        let registered = callbacks.entry(self.link.clone()).or_default();
        registered.retain(|(p, _)| p != prefix);
        registered.push((prefix.to_string(), callback));
        Ok(())
    }

    fn inbound_streams(&self) -> Vec<LocalStream> {
        self.network
            .streams_where(StreamDirection::Inbound, |key, state| {
                key.to == self.link && matches!(state.inbound, Some(s) if s != StreamState::Deleted)
            })
    }

    fn outbound_streams(&self) -> Vec<LocalStream> {
        self.network
            .streams_where(StreamDirection::Outbound, |key, state| {
                key.from == self.link && state.outbound != StreamState::Deleted
            })
    }
}

/// One end of an in-process stream.
#[derive(Clone)]
pub struct LocalStream {
    channel: Arc<Channel>,
    direction: StreamDirection,
}

impl std::fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStream")
            .field("name", &self.channel.key.name)
            .field("direction", &self.direction)
            .field("state", &self.state())
            .finish()
    }
}

impl LocalStream {
    fn require(&self, direction: StreamDirection, op: &'static str) -> Result<(), StreamError> {
        if self.direction != direction {
            return Err(StreamError::WrongDirection {
                op,
                direction: self.direction,
                name: self.channel.key.name.clone(),
            });
        }
        Ok(())
    }

    fn enlist(&self, txn: &Transaction) -> Result<(), StreamError> {
        let participant: Arc<dyn TxnParticipant> = self.channel.clone();
        txn.enlist(&self.channel.participant_key, participant)?;
        Ok(())
    }

    fn closed(&self) -> StreamError {
        StreamError::Closed(self.channel.key.name.clone())
    }

    fn invalid(&self, state: StreamState) -> StreamError {
        StreamError::InvalidState {
            name: self.channel.key.name.clone(),
            state,
        }
    }
}

#[async_trait]
impl MessageStream for LocalStream {
    fn name(&self) -> &StreamName {
        &self.channel.key.name
    }

    fn partner(&self) -> &Link {
        match self.direction {
            StreamDirection::Outbound => &self.channel.key.to,
            StreamDirection::Inbound => &self.channel.key.from,
        }
    }

    fn direction(&self) -> StreamDirection {
        self.direction
    }

    fn state(&self) -> StreamState {
        let state = self.channel.state.lock();
        match self.direction {
            StreamDirection::Outbound => state.outbound,
            StreamDirection::Inbound => state.inbound.unwrap_or(StreamState::Initialized),
        }
    }

    async fn open(&self) -> Result<(), StreamError> {
        match self.direction {
            StreamDirection::Outbound => {
                let announce = {
                    let mut state = self.channel.state.lock();
                    if state.creating_txn.is_some() {
                        return Err(self.invalid(StreamState::Initialized));
                    }
                    match state.outbound {
                        StreamState::Open => false,
                        StreamState::Initialized => {
                            state.outbound = StreamState::Open;
                            if state.inbound.is_none() {
                                state.inbound = Some(StreamState::Open);
                                true
                            } else {
                                false
                            }
                        }
                        other => return Err(self.invalid(other)),
                    }
                };
                if announce {
                    if let Some(network) = self.channel.network.upgrade() {
                        network.announce(Arc::clone(&self.channel));
                    }
                }
                Ok(())
            }
            StreamDirection::Inbound => match self.state() {
                StreamState::Open => Ok(()),
                other => Err(self.invalid(other)),
            },
        }
    }

    async fn close(&self) -> Result<(), StreamError> {
        {
            let mut state = self.channel.state.lock();
            match self.direction {
                StreamDirection::Outbound => {
                    if matches!(state.outbound, StreamState::Initialized | StreamState::Open) {
                        state.end_of_stream = true;
                        state.outbound = StreamState::Closed;
                    }
                }
                StreamDirection::Inbound => {
                    if state.inbound == Some(StreamState::Open) {
                        state.inbound = Some(StreamState::Closed);
                    }
                }
            }
        }
        self.channel.changed.notify_waiters();
        debug!(stream = %self.name(), direction = ?self.direction, "stream closed");
        Ok(())
    }

    async fn delete(&self, txn: &Transaction) -> Result<(), StreamError> {
        self.enlist(txn)?;
        let mut state = self.channel.state.lock();
        let previous = match self.direction {
            StreamDirection::Outbound => std::mem::replace(&mut state.outbound, StreamState::Deleting),
            StreamDirection::Inbound => state
                .inbound
                .replace(StreamState::Deleting)
                .unwrap_or(StreamState::Initialized),
        };
        if matches!(previous, StreamState::Deleting | StreamState::Deleted) {
            // Put it back; deleting twice is a no-op.
            match self.direction {
                StreamDirection::Outbound => state.outbound = previous,
                StreamDirection::Inbound => state.inbound = Some(previous),
            }
            return Ok(());
        }
        state
            .pending_deletes
            .entry(txn.id())
            .or_default()
            .push((self.direction, previous));
        Ok(())
    }

    async fn send(&self, txn: &Transaction, payload: Vec<u8>) -> Result<(), StreamError> {
        self.require(StreamDirection::Outbound, "send")?;
        self.enlist(txn)?;
        let mut state = self.channel.state.lock();
        match state.outbound {
            StreamState::Open => {
                state.pending_sends.entry(txn.id()).or_default().push(payload);
                Ok(())
            }
            s if s.is_finished() => Err(self.closed()),
            s => Err(self.invalid(s)),
        }
    }

    async fn receive(&self, txn: &Transaction) -> Result<Option<Vec<u8>>, StreamError> {
        self.require(StreamDirection::Inbound, "receive")?;
        loop {
            self.enlist(txn)?;
            let changed = self.channel.changed.notified();
            {
                let mut state = self.channel.state.lock();
                if state.inbound != Some(StreamState::Open) {
                    if state.end_of_stream && state.queue.is_empty() {
                        return Ok(None);
                    }
                    return Err(self.closed());
                }
                if let Some(payload) = state.queue.pop_front() {
                    state
                        .in_flight
                        .entry(txn.id())
                        .or_default()
                        .push(payload.clone());
                    return Ok(Some(payload));
                }
                if state.end_of_stream {
                    state.eos_taken.insert(txn.id());
                    return Ok(None);
                }
            }
            changed.await;
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
