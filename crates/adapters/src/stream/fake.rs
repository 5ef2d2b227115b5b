// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording inbound callback for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{InboundStreamCallback, MessageStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use wv_core::{Link, StreamName};

/// Recorded callback invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCall {
    Requested { partner: Link, name: StreamName },
    Created { name: StreamName },
    Deleted { name: StreamName },
}

struct RecordingState {
    accept: bool,
    calls: Vec<CallbackCall>,
}

/// Callback that records every call and forwards created streams on a
/// channel so tests can drive them.
#[derive(Clone)]
pub struct RecordingCallback<S> {
    inner: Arc<Mutex<RecordingState>>,
    created_tx: mpsc::UnboundedSender<S>,
}

impl<S> RecordingCallback<S> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<S>) {
        let (created_tx, created_rx) = mpsc::unbounded_channel();
        let callback = Self {
            inner: Arc::new(Mutex::new(RecordingState {
                accept: true,
                calls: Vec::new(),
            })),
            created_tx,
        };
        (callback, created_rx)
    }

    pub fn set_accept(&self, accept: bool) {
        self.inner.lock().accept = accept;
    }

    pub fn calls(&self) -> Vec<CallbackCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl<S: MessageStream> InboundStreamCallback<S> for RecordingCallback<S> {
    async fn inbound_stream_requested(&self, partner: &Link, name: &StreamName) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(CallbackCall::Requested {
            partner: partner.clone(),
            name: name.clone(),
        });
        inner.accept
    }

    async fn inbound_stream_created(&self, stream: S) {
        self.inner.lock().calls.push(CallbackCall::Created {
            name: stream.name().clone(),
        });
        let _ = self.created_tx.send(stream);
    }

    async fn inbound_stream_deleted(&self, stream: S) {
        self.inner.lock().calls.push(CallbackCall::Deleted {
            name: stream.name().clone(),
        });
    }
}
