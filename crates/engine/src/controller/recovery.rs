// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primary processing: bring a new primary's streams and stored waves back
//! to a consistent state before accepting work.

use super::callback::WaveStreamCallback;
use super::WaveController;
use crate::error::WaveError;
use crate::retry::{retry_transient, sleep_or_cancel};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};
use wv_adapters::{MessageStream, StreamManager, StreamState};
use wv_core::{
    AccessStatus, Classify, Link, ReplicaRole, StreamKind, StreamName, Wave, WaveId, WaveState,
    WaveStreamName, WAVE_STREAM_PREFIX,
};

impl<M: StreamManager> WaveController<M> {
    /// Recover, then open the primary gate and resume inbound streams.
    /// On failure the gate fails with the error's class.
    pub(crate) async fn run_primary(self, cancel: CancellationToken) {
        let span = tracing::info_span!("wave.recovery", node = %self.self_link());
        match self.recover(&cancel).instrument(span).await {
            Ok(inbound) => {
                self.inner.gate.open();
                info!(node = %self.self_link(), resumed = inbound.len(), "primary processing ready");
                for stream in inbound {
                    let controller = self.clone();
                    tokio::spawn(async move { controller.process_inbound_stream(stream).await });
                }
            }
            Err(e) => {
                self.inner.gate.fail(e.class());
                self.report_failure("primary processing", &e);
            }
        }
    }

    /// Returns the open inbound wave streams to resume.
    async fn recover(&self, cancel: &CancellationToken) -> Result<Vec<M::Stream>, WaveError> {
        self.wait_for_access(cancel).await?;

        let name = self.inner.config.store_name.as_str();
        let store = retry_transient(self.inner.policy, cancel, "open wave store", move || async move {
            self.inner
                .replicator
                .get_or_create_store(name)
                .map_err(WaveError::from)
        })
        .await?;
        *self.inner.store.lock() = Some(store.clone());
        self.inner
            .streams
            .register_callback_by_prefix(WAVE_STREAM_PREFIX, Arc::new(WaveStreamCallback::new(self)))?;

        let inbound: Vec<(M::Stream, WaveStreamName)> = self
            .inner
            .streams
            .inbound_streams()
            .into_iter()
            .filter(|s| s.state() == StreamState::Open)
            .filter_map(|s| WaveStreamName::parse(s.name().as_str()).map(|parsed| (s, parsed)))
            .collect();
        let paired = self.pair_inbound(&inbound, cancel).await;

        let waves = {
            let txn = self.begin(cancel).await?;
            store.enumerate(&txn).await?
        };
        self.resume_waves(&waves, cancel).await;
        let orphans = self.close_orphans(&waves, &paired, cancel).await;

        info!(
            inbound = inbound.len(),
            paired = paired.len(),
            waves = waves.len(),
            orphans,
            "recovery complete"
        );
        Ok(inbound.into_iter().map(|(stream, _)| stream).collect())
    }

    async fn wait_for_access(&self, cancel: &CancellationToken) -> Result<(), WaveError> {
        loop {
            let partition = &self.inner.partition;
            if partition.role() != ReplicaRole::Primary {
                return Err(WaveError::NotPrimary);
            }
            if partition.read_status() == AccessStatus::Granted
                && partition.write_status() == AccessStatus::Granted
            {
                return Ok(());
            }
            sleep_or_cancel(self.inner.config.poll_interval(), cancel).await?;
        }
    }

    /// Create or reopen the feedback pair of every open propagate stream.
    async fn pair_inbound(
        &self,
        inbound: &[(M::Stream, WaveStreamName)],
        cancel: &CancellationToken,
    ) -> HashSet<(Link, StreamName)> {
        let mut tasks = JoinSet::new();
        for (stream, parsed) in inbound {
            if parsed.kind != StreamKind::Propagate {
                continue;
            }
            let (controller, stream, parsed, cancel) =
                (self.clone(), stream.clone(), parsed.clone(), cancel.clone());
            tasks.spawn(async move {
                let pair = controller
                    .pair_feedback_stream(&stream, &parsed, &cancel)
                    .await?;
                Ok((pair.partner().clone(), pair.name().clone()))
            });
        }
        self.gather("pair feedback stream", tasks)
            .await
            .into_iter()
            .collect()
    }

    async fn resume_waves(&self, waves: &[Wave], cancel: &CancellationToken) {
        let mut tasks = JoinSet::new();
        for wave in waves {
            let (controller, wave, cancel) = (self.clone(), wave.clone(), cancel.clone());
            tasks.spawn(async move { controller.resume_wave(wave, &cancel).await });
        }
        self.gather("resume wave", tasks).await;
    }

    async fn resume_wave(&self, wave: Wave, cancel: &CancellationToken) -> Result<(), WaveError> {
        let streams = self.outbound_streams_of(wave.id(), StreamKind::Propagate);
        match wave.state() {
            WaveState::Created => {
                info!(wave_id = %wave.id(), streams = streams.len(), "resending created wave");
                self.send_created_wave(wave.id(), streams, cancel).await
            }
            WaveState::Started => self.close_and_delete(streams, cancel).await,
            WaveState::Invalid => Err(WaveError::invariant(format!(
                "stored wave {} has no state",
                wave.id()
            ))),
        }
    }

    /// Close and delete outbound wave streams that belong to no stored wave
    /// and answer no open inbound stream. Returns how many were found.
    async fn close_orphans(
        &self,
        waves: &[Wave],
        paired: &HashSet<(Link, StreamName)>,
        cancel: &CancellationToken,
    ) -> usize {
        let stored: HashSet<&WaveId> = waves.iter().map(|w| w.id()).collect();
        let orphans: Vec<M::Stream> = self
            .inner
            .streams
            .outbound_streams()
            .into_iter()
            .filter(|s| {
                !matches!(
                    s.state(),
                    StreamState::Closed | StreamState::Deleting | StreamState::Deleted
                )
            })
            .filter(|s| {
                WaveStreamName::parse(s.name().as_str())
                    .is_some_and(|parsed| !stored.contains(&parsed.wave_id))
            })
            .filter(|s| !paired.contains(&(s.partner().clone(), s.name().clone())))
            .collect();

        let count = orphans.len();
        let mut tasks = JoinSet::new();
        for stream in orphans {
            let (controller, cancel) = (self.clone(), cancel.clone());
            tasks.spawn(async move { controller.close_and_delete(vec![stream], &cancel).await });
        }
        self.gather("close orphaned stream", tasks).await;
        count
    }

    /// Await every task; failures go through the fault path.
    async fn gather<T: 'static>(
        &self,
        context: &'static str,
        mut tasks: JoinSet<Result<T, WaveError>>,
    ) -> Vec<T> {
        let mut done = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(value)) => done.push(value),
                Ok(Err(e)) => self.report_failure(context, &e),
                Err(e) => {
                    self.report_failure(context, &WaveError::invariant(format!("task failed: {e}")))
                }
            }
        }
        done
    }
}
