// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sending a created wave downstream once its transaction commits

use super::WaveController;
use crate::error::WaveError;
use crate::retry::retry_transient;
use futures::future::join_all;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};
use wv_adapters::{MessageStream, StreamManager};
use wv_core::{WaveId, WaveMessage, WaveState};
use wv_storage::Transaction;

/// Post-commit work for a wave persisted as `Created`.
pub(crate) struct DeferredPropagation<M: StreamManager> {
    controller: WaveController<M>,
    wave_id: WaveId,
    streams: Vec<M::Stream>,
}

impl<M: StreamManager> DeferredPropagation<M> {
    pub(crate) fn new(controller: WaveController<M>, wave_id: WaveId, streams: Vec<M::Stream>) -> Self {
        Self {
            controller,
            wave_id,
            streams,
        }
    }

    /// Spawn the send when `txn` commits. If it aborts the work is dropped.
    pub(crate) fn register(self, txn: &Transaction) -> Result<(), WaveError> {
        let handle = Handle::try_current().map_err(|_| WaveError::NoRuntime)?;
        let cancel = self.controller.cancel_token();
        txn.on_committed(Box::new(move || {
            handle.spawn(self.run(cancel));
        }))?;
        Ok(())
    }

    async fn run(self, cancel: CancellationToken) {
        let span = tracing::info_span!("wave.send", wave_id = %self.wave_id);
        let result = self
            .controller
            .send_created_wave(&self.wave_id, self.streams, &cancel)
            .instrument(span)
            .await;
        if let Err(e) = result {
            self.controller.report_failure("wave propagation", &e);
        }
    }
}

impl<M: StreamManager> WaveController<M> {
    /// Open `streams`, send the wave on each and mark it `Started` in one
    /// transaction, then close and delete the streams.
    ///
    /// A wave that is gone or already started is left alone, so running
    /// this twice sends at most once.
    pub(crate) async fn send_created_wave(
        &self,
        id: &WaveId,
        streams: Vec<M::Stream>,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        let streams_ref = &streams;
        let sent = retry_transient(self.inner.policy, cancel, "send wave", move || {
            self.try_send_created_wave(id, streams_ref, cancel)
        })
        .await?;
        if sent {
            self.close_and_delete(streams, cancel).await?;
        }
        Ok(())
    }

    async fn try_send_created_wave(
        &self,
        id: &WaveId,
        streams: &[M::Stream],
        cancel: &CancellationToken,
    ) -> Result<bool, WaveError> {
        let store = self.store()?;
        let txn = self.begin(cancel).await?;
        let wave = match store.get(&txn, id).await? {
            Some(wave) if wave.state() == WaveState::Created => wave,
            Some(wave) => {
                debug!(state = %wave.state(), "wave already sent");
                return Ok(false);
            }
            None => {
                debug!("wave no longer stored");
                return Ok(false);
            }
        };
        if streams.len() != wave.outbound_links().len() {
            return Err(WaveError::invariant(format!(
                "wave {id} has {} links but {} outbound streams",
                wave.outbound_links().len(),
                streams.len()
            )));
        }

        for result in join_all(streams.iter().map(|s| s.open())).await {
            result?;
        }
        store.update(&txn, wave.with_state(WaveState::Started)).await?;
        let payload = WaveMessage::Wave(wave.envelope()).encode()?;
        for stream in streams {
            stream.send(&txn, payload.clone()).await?;
        }
        self.commit(&txn, cancel).await?;
        info!(links = streams.len(), "wave sent");
        Ok(true)
    }
}
