// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wave controller.
//!
//! One controller runs per partition. On the primary it initiates waves,
//! forwards the ones it receives, aggregates echoes from its next hops and
//! sends the aggregate upstream. All durable effects go through replicated
//! transactions; anything that must only happen after a commit (sending a
//! wave downstream, handing a result to the application) is deferred until
//! the commit succeeds.

mod callback;
mod deferred;
mod inbound;
mod lifecycle;
mod propagate;
mod recovery;

pub use lifecycle::StateProvider;

use crate::config::ControllerConfig;
use crate::error::WaveError;
use crate::gate::{GateState, PrimaryGate};
use crate::processor::{ProcessorRegistry, WaveProcessor, WaveResultProcessor};
use crate::retry::{self, RetryPolicy};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use wv_adapters::{MessageStream, StreamManager};
use wv_core::{
    AccessStatus, Classify, ErrorClass, FaultType, IdGen, Link, Partition, ReplicaRole, StreamKind,
    StreamName, Wave, WaveFeedback, WaveId, WaveMessage, WaveStreamName,
};
use wv_storage::{Replicator, Transaction, WaveStore};

/// Collaborators a controller is built from
pub struct ControllerDeps<M> {
    pub partition: Arc<dyn Partition>,
    pub replicator: Replicator,
    pub streams: M,
    pub processors: Arc<dyn ProcessorRegistry>,
    pub results: Arc<dyn WaveResultProcessor>,
    pub id_gen: Arc<dyn IdGen>,
}

/// Work belonging to one primary tenure
struct Tenure {
    cancel: CancellationToken,
    recovery: Option<JoinHandle<()>>,
}

struct ControllerInner<M: StreamManager> {
    partition: Arc<dyn Partition>,
    replicator: Replicator,
    streams: M,
    processors: Arc<dyn ProcessorRegistry>,
    results: Arc<dyn WaveResultProcessor>,
    id_gen: Arc<dyn IdGen>,
    config: ControllerConfig,
    policy: RetryPolicy,
    gate: PrimaryGate,
    store: Mutex<Option<WaveStore>>,
    tenure: Mutex<Tenure>,
    /// Processor resolved for each wave this node is still working on
    active: Mutex<HashMap<WaveId, Arc<dyn WaveProcessor>>>,
    /// Inbound streams currently being processed
    claims: Mutex<HashSet<(Link, StreamName)>>,
}

pub struct WaveController<M: StreamManager> {
    inner: Arc<ControllerInner<M>>,
}

impl<M: StreamManager> Clone for WaveController<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: StreamManager> WaveController<M> {
    pub fn new(deps: ControllerDeps<M>, config: ControllerConfig) -> Self {
        let cancel = CancellationToken::new();
        cancel.cancel();
        Self {
            inner: Arc::new(ControllerInner {
                partition: deps.partition,
                replicator: deps.replicator,
                streams: deps.streams,
                processors: deps.processors,
                results: deps.results,
                id_gen: deps.id_gen,
                policy: RetryPolicy::from_config(&config),
                config,
                gate: PrimaryGate::new(),
                store: Mutex::new(None),
                tenure: Mutex::new(Tenure {
                    cancel,
                    recovery: None,
                }),
                active: Mutex::new(HashMap::new()),
                claims: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn self_link(&self) -> Link {
        self.inner.partition.self_link()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn streams(&self) -> &M {
        &self.inner.streams
    }

    pub fn gate_state(&self) -> GateState {
        self.inner.gate.state()
    }

    /// Wait until primary processing has finished recovery.
    pub async fn wait_until_ready(&self) -> Result<(), WaveError> {
        self.inner.gate.wait().await
    }

    /// The wave store, once a primary tenure has opened it.
    pub fn wave_store(&self) -> Option<WaveStore> {
        self.inner.store.lock().clone()
    }

    /// Waves with a resolved processor that have not completed here.
    pub fn active_waves(&self) -> Vec<WaveId> {
        let mut ids: Vec<_> = self.inner.active.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn store(&self) -> Result<WaveStore, WaveError> {
        self.inner.store.lock().clone().ok_or(WaveError::NotPrimary)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.tenure.lock().cancel.clone()
    }

    pub(crate) async fn begin(&self, cancel: &CancellationToken) -> Result<Transaction, WaveError> {
        retry::begin(&self.inner.replicator, self.inner.policy, cancel).await
    }

    pub(crate) async fn commit(
        &self,
        txn: &Transaction,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        retry::commit(txn, self.inner.policy, cancel).await
    }

    /// Fail fast unless this replica is primary with write access.
    pub(crate) fn check_write_access(&self) -> Result<(), WaveError> {
        let partition = &self.inner.partition;
        if partition.role() != ReplicaRole::Primary
            || partition.write_status() != AccessStatus::Granted
        {
            return Err(WaveError::NotPrimary);
        }
        Ok(())
    }

    /// Resolve (and remember) the processor for `wave`, polling the
    /// registry until the processing timeout.
    pub(crate) async fn resolve_processor(
        &self,
        wave: &Wave,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn WaveProcessor>, WaveError> {
        if let Some(processor) = self.inner.active.lock().get(wave.id()) {
            return Ok(Arc::clone(processor));
        }
        let timeout = self.inner.config.processing_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(processor) = self.inner.processors.resolve(wave) {
                self.inner
                    .active
                    .lock()
                    .insert(wave.id().clone(), Arc::clone(&processor));
                return Ok(processor);
            }
            if self.inner.partition.write_status() == AccessStatus::NotPrimary {
                return Err(WaveError::NotPrimary);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WaveError::ProcessorTimeout {
                    wave_id: wave.id().clone(),
                    timeout,
                });
            }
            debug!(wave_id = %wave.id(), kind = %wave.command().kind, "waiting for processor");
            retry::sleep_or_cancel(self.inner.config.poll_interval(), cancel).await?;
        }
    }

    pub(crate) fn forget_processor(&self, id: &WaveId) {
        self.inner.active.lock().remove(id);
    }

    /// Stage one propagate stream per outbound link of `wave`.
    pub(crate) async fn create_outbound_streams(
        &self,
        txn: &Transaction,
        wave: &Wave,
    ) -> Result<Vec<M::Stream>, WaveError> {
        let mut streams = Vec::with_capacity(wave.outbound_links().len());
        for link in wave.links() {
            let name = WaveStreamName::propagate(wave.id().clone(), self.inner.id_gen.next());
            let stream = self
                .inner
                .streams
                .create_stream(txn, link, &name.to_stream_name())
                .await?;
            streams.push(stream);
        }
        Ok(streams)
    }

    /// Live outbound streams of `kind` belonging to wave `id`.
    pub(crate) fn outbound_streams_of(&self, id: &WaveId, kind: StreamKind) -> Vec<M::Stream> {
        self.inner
            .streams
            .outbound_streams()
            .into_iter()
            .filter(|s| {
                WaveStreamName::parse(s.name().as_str())
                    .is_some_and(|parsed| &parsed.wave_id == id && parsed.kind == kind)
            })
            .collect()
    }

    pub(crate) fn find_outbound(&self, partner: &Link, name: &StreamName) -> Option<M::Stream> {
        self.inner
            .streams
            .outbound_streams()
            .into_iter()
            .find(|s| s.partner() == partner && s.name() == name)
    }

    /// Send `feedback` for wave `id` on `stream`. An empty list is sent as a
    /// single acknowledgement so the receiver always sees one message.
    pub(crate) async fn send_feedback(
        &self,
        txn: &Transaction,
        stream: &M::Stream,
        id: &WaveId,
        feedback: Vec<WaveFeedback>,
    ) -> Result<(), WaveError> {
        let feedback = if feedback.is_empty() {
            vec![WaveFeedback::ack()]
        } else {
            feedback
        };
        for item in feedback {
            let payload = WaveMessage::Feedback(item.with_wave_id(id.clone())).encode()?;
            stream.send(txn, payload).await?;
        }
        Ok(())
    }

    /// Close `streams` concurrently, then delete them in one transaction.
    pub(crate) async fn close_and_delete(
        &self,
        streams: Vec<M::Stream>,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        if streams.is_empty() {
            return Ok(());
        }
        for result in join_all(streams.iter().map(|s| s.close())).await {
            result?;
        }
        let txn = self.begin(cancel).await?;
        for stream in &streams {
            stream.delete(&txn).await?;
        }
        self.commit(&txn, cancel).await
    }

    /// Log a failure; anything that is not benign is reported as a
    /// transient fault on the partition.
    pub(crate) fn report_failure(&self, context: &'static str, err: &WaveError) {
        let class = err.class();
        if class.is_benign() {
            debug!(context, error = %err, %class, "stopped");
            return;
        }
        if class == ErrorClass::Invariant {
            error!(context, error = %err, "invariant violated, reporting fault");
        } else {
            error!(context, error = %err, %class, "failed, reporting fault");
        }
        self.inner.partition.report_fault(FaultType::Transient);
    }
}

#[cfg(test)]
#[path = "../controller_tests/mod.rs"]
mod tests;
