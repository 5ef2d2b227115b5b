// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced stream wrappers for consistent observability

use crate::stream::{
    InboundStreamCallback, MessageStream, StreamDirection, StreamError, StreamManager, StreamState,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;
use wv_core::{Link, StreamName};
use wv_storage::Transaction;

/// Wrapper that adds tracing to any StreamManager
#[derive(Clone)]
pub struct TracedStreamManager<M> {
    inner: M,
}

impl<M> TracedStreamManager<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

/// Hands traced streams to a callback registered through the wrapper.
struct TracedCallback<S: MessageStream> {
    inner: Arc<dyn InboundStreamCallback<TracedStream<S>>>,
}

#[async_trait]
impl<S: MessageStream> InboundStreamCallback<S> for TracedCallback<S> {
    async fn inbound_stream_requested(&self, partner: &Link, name: &StreamName) -> bool {
        let accepted = self.inner.inbound_stream_requested(partner, name).await;
        tracing::debug!(stream = %name, %partner, accepted, "inbound stream requested");
        accepted
    }

    async fn inbound_stream_created(&self, stream: S) {
        tracing::info!(stream = %stream.name(), partner = %stream.partner(), "inbound stream created");
        self.inner
            .inbound_stream_created(TracedStream::new(stream))
            .await
    }

    async fn inbound_stream_deleted(&self, stream: S) {
        tracing::debug!(stream = %stream.name(), "inbound stream deleted");
        self.inner
            .inbound_stream_deleted(TracedStream::new(stream))
            .await
    }
}

#[async_trait]
impl<M: StreamManager> StreamManager for TracedStreamManager<M> {
    type Stream = TracedStream<M::Stream>;

    async fn create_stream(
        &self,
        txn: &Transaction,
        partner: &Link,
        name: &StreamName,
    ) -> Result<Self::Stream, StreamError> {
        let result = self.inner.create_stream(txn, partner, name).await;
        tracing::info_span!("stream.create", stream = %name, %partner, txn = txn.id()).in_scope(
            || match &result {
                Ok(_) => tracing::debug!("created"),
                Err(e) => tracing::error!(error = %e, "create failed"),
            },
        );
        result.map(TracedStream::new)
    }

    fn register_callback_by_prefix(
        &self,
        prefix: &str,
        callback: Arc<dyn InboundStreamCallback<Self::Stream>>,
    ) -> Result<(), StreamError> {
        tracing::info!(prefix, "registering inbound stream callback");
        self.inner
            .register_callback_by_prefix(prefix, Arc::new(TracedCallback { inner: callback }))
    }

    fn inbound_streams(&self) -> Vec<Self::Stream> {
        let streams = self.inner.inbound_streams();
        tracing::trace!(count = streams.len(), "listed inbound streams");
        streams.into_iter().map(TracedStream::new).collect()
    }

    fn outbound_streams(&self) -> Vec<Self::Stream> {
        let streams = self.inner.outbound_streams();
        tracing::trace!(count = streams.len(), "listed outbound streams");
        streams.into_iter().map(TracedStream::new).collect()
    }
}

/// Wrapper that adds tracing to any MessageStream
#[derive(Clone, Debug)]
pub struct TracedStream<S> {
    inner: S,
}

impl<S> TracedStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MessageStream> MessageStream for TracedStream<S> {
    fn name(&self) -> &StreamName {
        self.inner.name()
    }

    fn partner(&self) -> &Link {
        self.inner.partner()
    }

    fn direction(&self) -> StreamDirection {
        self.inner.direction()
    }

    fn state(&self) -> StreamState {
        self.inner.state()
    }

    async fn open(&self) -> Result<(), StreamError> {
        let span = tracing::info_span!("stream.open", stream = %self.name(), partner = %self.partner());
        async {
            let result = self.inner.open().await;
            match &result {
                Ok(()) => tracing::debug!("opened"),
                Err(e) => tracing::error!(error = %e, "open failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn close(&self) -> Result<(), StreamError> {
        let result = self.inner.close().await;
        tracing::info_span!("stream.close", stream = %self.name()).in_scope(|| match &result {
            Ok(()) => tracing::debug!("closed"),
            Err(e) => tracing::warn!(error = %e, "close failed"),
        });
        result
    }

    async fn delete(&self, txn: &Transaction) -> Result<(), StreamError> {
        let result = self.inner.delete(txn).await;
        tracing::info_span!("stream.delete", stream = %self.name(), txn = txn.id()).in_scope(
            || match &result {
                Ok(()) => tracing::debug!("delete staged"),
                Err(e) => tracing::warn!(error = %e, "delete failed"),
            },
        );
        result
    }

    async fn send(&self, txn: &Transaction, payload: Vec<u8>) -> Result<(), StreamError> {
        tracing::info_span!("stream.send", stream = %self.name(), txn = txn.id())
            .in_scope(|| tracing::debug!(bytes = payload.len(), "sending"));
        let result = self.inner.send(txn, payload).await;
        if let Err(ref e) = result {
            tracing::error!(stream = %self.name(), error = %e, "send failed");
        }
        result
    }

    async fn receive(&self, txn: &Transaction) -> Result<Option<Vec<u8>>, StreamError> {
        let result = self.inner.receive(txn).await;
        match &result {
            Ok(Some(payload)) => {
                tracing::trace!(stream = %self.name(), bytes = payload.len(), "received")
            }
            Ok(None) => tracing::trace!(stream = %self.name(), "end of stream"),
            Err(e) => tracing::warn!(stream = %self.name(), error = %e, "receive failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
