// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reliable, transactional message streams between partitions

mod local;

pub use local::{Delivery, LocalNetwork, LocalStream, LocalStreamManager};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CallbackCall, RecordingCallback};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use wv_core::{Classify, ErrorClass, Link, StreamName};
use wv_storage::{StoreError, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Initialized,
    Open,
    Closing,
    Closed,
    Deleting,
    Deleted,
}

impl StreamState {
    /// Closed or on its way out.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            StreamState::Closing | StreamState::Closed | StreamState::Deleting | StreamState::Deleted
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Initialized => "initialized",
            StreamState::Open => "open",
            StreamState::Closing => "closing",
            StreamState::Closed => "closed",
            StreamState::Deleting => "deleting",
            StreamState::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream {0} already exists")]
    AlreadyExists(StreamName),
    #[error("stream {name} is {state}")]
    InvalidState { name: StreamName, state: StreamState },
    #[error("stream {0} is closed")]
    Closed(StreamName),
    #[error("{op} is not valid on {direction:?} stream {name}")]
    WrongDirection {
        op: &'static str,
        direction: StreamDirection,
        name: StreamName,
    },
    #[error(transparent)]
    Txn(#[from] StoreError),
}

impl Classify for StreamError {
    fn class(&self) -> ErrorClass {
        match self {
            StreamError::AlreadyExists(_) | StreamError::InvalidState { .. } => {
                ErrorClass::Invariant
            }
            StreamError::Closed(_) => ErrorClass::Closed,
            StreamError::WrongDirection { .. } => ErrorClass::InvalidOperation,
            StreamError::Txn(e) => e.class(),
        }
    }
}

/// One end of a named stream between this partition and a partner.
#[async_trait]
pub trait MessageStream: Clone + Send + Sync + 'static {
    fn name(&self) -> &StreamName;

    /// The partition at the other end.
    fn partner(&self) -> &Link;

    fn direction(&self) -> StreamDirection;

    fn state(&self) -> StreamState;

    async fn open(&self) -> Result<(), StreamError>;

    /// Outbound: end-of-stream after every committed message.
    /// Inbound: stop receiving.
    async fn close(&self) -> Result<(), StreamError>;

    /// Remove the stream once `txn` commits.
    async fn delete(&self, txn: &Transaction) -> Result<(), StreamError>;

    /// Queue a message. The partner sees it only once `txn` commits.
    async fn send(&self, txn: &Transaction, payload: Vec<u8>) -> Result<(), StreamError>;

    /// Take the next message, waiting if none is available. `None` means the
    /// sender closed the stream. A message is consumed only if `txn`
    /// commits.
    async fn receive(&self, txn: &Transaction) -> Result<Option<Vec<u8>>, StreamError>;
}

/// Notified about inbound streams whose name starts with a registered prefix.
#[async_trait]
pub trait InboundStreamCallback<S>: Send + Sync + 'static {
    /// Whether to accept a stream a partner is opening.
    async fn inbound_stream_requested(&self, partner: &Link, name: &StreamName) -> bool;

    async fn inbound_stream_created(&self, stream: S);

    async fn inbound_stream_deleted(&self, stream: S);
}

/// Creates and enumerates this partition's streams.
#[async_trait]
pub trait StreamManager: Clone + Send + Sync + 'static {
    type Stream: MessageStream;

    /// Create an outbound stream. It exists only if `txn` commits.
    async fn create_stream(
        &self,
        txn: &Transaction,
        partner: &Link,
        name: &StreamName,
    ) -> Result<Self::Stream, StreamError>;

    fn register_callback_by_prefix(
        &self,
        prefix: &str,
        callback: Arc<dyn InboundStreamCallback<Self::Stream>>,
    ) -> Result<(), StreamError>;

    fn inbound_streams(&self) -> Vec<Self::Stream>;

    fn outbound_streams(&self) -> Vec<Self::Stream>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
