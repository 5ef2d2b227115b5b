// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound stream notifications from the transport

use super::{ControllerInner, WaveController};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::debug;
use wv_adapters::{InboundStreamCallback, MessageStream, StreamManager};
use wv_core::{Link, StreamName, WaveStreamName};

/// Registered with the stream manager. Holds the controller weakly so the
/// manager's callback table does not keep it alive.
pub(crate) struct WaveStreamCallback<M: StreamManager> {
    controller: Weak<ControllerInner<M>>,
}

impl<M: StreamManager> WaveStreamCallback<M> {
    pub(crate) fn new(controller: &WaveController<M>) -> Self {
        Self {
            controller: Arc::downgrade(&controller.inner),
        }
    }

    fn controller(&self) -> Option<WaveController<M>> {
        self.controller
            .upgrade()
            .map(|inner| WaveController { inner })
    }
}

#[async_trait]
impl<M: StreamManager> InboundStreamCallback<M::Stream> for WaveStreamCallback<M> {
    /// Accept wave streams once primary processing is ready. A declined
    /// stream stays parked and is picked up by the next recovery.
    async fn inbound_stream_requested(&self, partner: &Link, name: &StreamName) -> bool {
        if WaveStreamName::parse(name.as_str()).is_none() {
            return false;
        }
        let Some(controller) = self.controller() else {
            return false;
        };
        match controller.wait_until_ready().await {
            Ok(()) => true,
            Err(e) => {
                debug!(stream = %name, %partner, error = %e, "inbound stream declined");
                false
            }
        }
    }

    async fn inbound_stream_created(&self, stream: M::Stream) {
        if let Some(controller) = self.controller() {
            tokio::spawn(async move { controller.process_inbound_stream(stream).await });
        }
    }

    async fn inbound_stream_deleted(&self, stream: M::Stream) {
        debug!(stream = %stream.name(), "inbound stream deleted");
    }
}
