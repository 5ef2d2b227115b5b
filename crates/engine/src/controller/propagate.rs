// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starting a wave at this node

use super::deferred::DeferredPropagation;
use super::WaveController;
use crate::error::WaveError;
use crate::retry::retry_transient;
use tracing::{info, Instrument};
use wv_adapters::StreamManager;
use wv_core::{distinct_links, Wave, WaveCommand, WaveId, WaveState};
use wv_storage::Transaction;

impl<M: StreamManager> WaveController<M> {
    /// Create a wave for `command` inside the caller's transaction.
    ///
    /// The wave is persisted as `Created` together with one outbound stream
    /// per next hop. Nothing is sent until `txn` commits; if it aborts, the
    /// wave and its streams never existed.
    pub async fn propagate(&self, txn: &Transaction, command: WaveCommand) -> Result<Wave, WaveError> {
        self.check_write_access()?;
        self.inner.gate.wait().await?;
        let cancel = self.cancel_token();
        let store = self.store()?;

        let self_link = self.self_link();
        let id = WaveId::new(self.inner.id_gen.next());
        let span = tracing::info_span!("wave.propagate", wave_id = %id, txn = txn.id());
        async {
            let wave = Wave::initiator(id.clone(), command, self_link.clone());
            let processor = self.resolve_processor(&wave, &cancel).await?;
            let links = processor.on_wave_started(txn, &wave, &self_link).await;
            let links = match links {
                Ok(links) => distinct_links(links, &self_link),
                Err(e) => {
                    self.forget_processor(&id);
                    return Err(e.into());
                }
            };
            if links.is_empty() {
                self.forget_processor(&id);
                return Err(WaveError::NoOutboundLinks(id));
            }

            let wave = wave
                .with_outbound_links(links)
                .with_state(WaveState::Created);
            let streams = self.create_outbound_streams(txn, &wave).await?;
            store.add(txn, wave.clone()).await?;
            DeferredPropagation::new(self.clone(), id.clone(), streams).register(txn)?;
            info!(links = wave.outbound_links().len(), "wave created");
            Ok(wave)
        }
        .instrument(span)
        .await
    }

    /// Propagate `command` in a transaction of its own, retrying transient
    /// failures. Returns the committed wave.
    pub async fn initiate(&self, command: WaveCommand) -> Result<Wave, WaveError> {
        self.check_write_access()?;
        self.inner.gate.wait().await?;
        let cancel = self.cancel_token();
        let attempt_cancel = cancel.clone();
        retry_transient(self.inner.policy, &cancel, "initiate", move || {
            let command = command.clone();
            let cancel = attempt_cancel.clone();
            async move {
                let txn = self.begin(&cancel).await?;
                let wave = self.propagate(&txn, command).await?;
                self.commit(&txn, &cancel).await?;
                Ok(wave)
            }
        })
        .await
    }
}
