// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing inbound wave streams.
//!
//! A propagate stream carries one wave and is answered on its paired
//! feedback stream. A feedback stream carries one or more feedback items
//! from a next hop; its end marks that hop's echo, provided it carried any. Each stream is drained
//! in a single transaction (a "pass"): a transient failure aborts the pass,
//! which puts every consumed message back, and the pass is run again.

use super::deferred::DeferredPropagation;
use super::WaveController;
use crate::error::WaveError;
use crate::processor::WaveProcessor;
use crate::retry::retry_transient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use wv_adapters::{MessageStream, StreamManager, StreamState};
use wv_core::{
    distinct_links, Link, StreamKind, Wave, WaveEnvelope, WaveFeedback, WaveId, WaveMessage,
    WaveState, WaveStreamName,
};
use wv_storage::{Transaction, WaveStore};

/// Work left for after a pass commits
struct PassOutcome<S> {
    /// Outbound feedback streams to close and delete
    finished: Vec<S>,
    /// Waves this node is done with
    completed: Vec<WaveId>,
    /// Aggregated result, at the initiator only
    result: Option<(Wave, Vec<WaveFeedback>)>,
}

impl<S> PassOutcome<S> {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            completed: Vec::new(),
            result: None,
        }
    }
}

/// The wave a feedback stream is echoing for
struct EchoTarget {
    wave: Wave,
    processor: Arc<dyn WaveProcessor>,
}

impl<M: StreamManager> WaveController<M> {
    /// Process an inbound wave stream to completion.
    ///
    /// Foreign streams are ignored, and so is a stream that is already
    /// being processed or has already been drained.
    pub(crate) async fn process_inbound_stream(&self, stream: M::Stream) {
        let Some(parsed) = WaveStreamName::parse(stream.name().as_str()) else {
            debug!(stream = %stream.name(), "ignoring foreign stream");
            return;
        };
        let claim = (stream.partner().clone(), stream.name().clone());
        if !self.inner.claims.lock().insert(claim.clone()) {
            debug!(stream = %stream.name(), "stream already being processed");
            return;
        }

        let cancel = self.cancel_token();
        let span = tracing::info_span!(
            "wave.inbound",
            stream = %stream.name(),
            partner = %stream.partner(),
            kind = %parsed.kind,
        );
        let result = self
            .drain_inbound(&stream, &parsed, &cancel)
            .instrument(span)
            .await;
        self.inner.claims.lock().remove(&claim);
        if let Err(e) = result {
            self.report_failure("inbound stream", &e);
        }
    }

    async fn drain_inbound(
        &self,
        stream: &M::Stream,
        parsed: &WaveStreamName,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        self.inner.gate.wait().await?;
        // A stream announced both by the transport and by recovery is
        // drained by whichever run claims it first.
        if stream.state().is_finished() {
            debug!(state = %stream.state(), "stream already processed");
            return Ok(());
        }
        let feedback = match parsed.kind {
            StreamKind::Propagate => Some(self.pair_feedback_stream(stream, parsed, cancel).await?),
            StreamKind::Feedback => None,
        };
        let feedback = feedback.as_ref();
        let outcome = retry_transient(self.inner.policy, cancel, "inbound pass", move || {
            self.process_incoming_stream(stream, parsed, feedback, cancel)
        })
        .await?;
        self.finish_pass(stream, outcome, cancel).await
    }

    /// The outbound feedback stream answering a propagate stream: reopened
    /// if it exists, created otherwise.
    pub(crate) async fn pair_feedback_stream(
        &self,
        inbound: &M::Stream,
        parsed: &WaveStreamName,
        cancel: &CancellationToken,
    ) -> Result<M::Stream, WaveError> {
        if inbound.state() != StreamState::Open {
            return Err(WaveError::invariant(format!(
                "propagate stream {} is {}",
                inbound.name(),
                inbound.state()
            )));
        }
        let pair = parsed
            .feedback_pair()
            .ok_or_else(|| WaveError::invariant("feedback streams have no pair"))?;
        let name = pair.to_stream_name();
        let partner = inbound.partner();

        if let Some(existing) = self.find_outbound(partner, &name) {
            return match existing.state() {
                StreamState::Initialized | StreamState::Open => {
                    existing.open().await?;
                    Ok(existing)
                }
                state => Err(WaveError::invariant(format!(
                    "feedback stream {name} is {state}"
                ))),
            };
        }

        let name_ref = &name;
        let stream = retry_transient(self.inner.policy, cancel, "create feedback stream", move || async move {
            let txn = self.begin(cancel).await?;
            let stream = self.inner.streams.create_stream(&txn, partner, name_ref).await?;
            self.commit(&txn, cancel).await?;
            Ok(stream)
        })
        .await?;
        stream.open().await?;
        debug!(feedback = %name, "feedback stream paired");
        Ok(stream)
    }

    /// One pass: drain `stream` to its end in a single transaction.
    async fn process_incoming_stream(
        &self,
        stream: &M::Stream,
        parsed: &WaveStreamName,
        feedback: Option<&M::Stream>,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome<M::Stream>, WaveError> {
        let store = self.store()?;
        let txn = self.begin(cancel).await?;
        let sender = stream.partner();
        let mut outcome = PassOutcome::new();
        let mut target: Option<EchoTarget> = None;

        while let Some(payload) = self.receive(stream, &txn, cancel).await? {
            match WaveMessage::decode(&payload)? {
                WaveMessage::Wave(envelope) => {
                    let feedback = feedback
                        .ok_or_else(|| WaveError::invariant("wave message on a feedback stream"))?;
                    self.on_wave(&txn, &store, envelope, sender, feedback, &mut outcome, cancel)
                        .await?;
                }
                WaveMessage::Feedback(item) => {
                    self.on_feedback(&txn, &store, parsed, sender, item, &mut target, cancel)
                        .await?;
                }
            }
        }
        if parsed.kind == StreamKind::Feedback {
            match target {
                Some(target) => {
                    self.on_echo_complete(&txn, &store, sender, target, &mut outcome)
                        .await?;
                }
                None => {
                    debug!(wave_id = %parsed.wave_id, from = %sender, "feedback stream ended empty");
                }
            }
        }

        self.commit(&txn, cancel).await?;
        Ok(outcome)
    }

    async fn receive(
        &self,
        stream: &M::Stream,
        txn: &Transaction,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, WaveError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(WaveError::Canceled),
            received = stream.receive(txn) => Ok(received?),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_wave(
        &self,
        txn: &Transaction,
        store: &WaveStore,
        envelope: WaveEnvelope,
        sender: &Link,
        feedback: &M::Stream,
        outcome: &mut PassOutcome<M::Stream>,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        let id = envelope.id.clone();
        if let Some(existing) = store.get(txn, &id).await? {
            let processor = self.resolve_processor(&existing, cancel).await?;
            let items = processor.on_wave_existent_echo(txn, &existing, sender).await?;
            self.send_feedback(txn, feedback, &id, items).await?;
            outcome.finished.push(feedback.clone());
            debug!(wave_id = %id, "wave already known, echoed");
            return Ok(());
        }

        let wave = Wave::from(envelope).with_inbound_link(sender.clone())?;
        let processor = self.resolve_processor(&wave, cancel).await?;
        let links = processor.on_wave_started(txn, &wave, sender).await?;
        let links = distinct_links(links, &self.self_link());

        if links.is_empty() {
            let items = processor.on_wave_completed_echo(txn, &wave).await?;
            self.send_feedback(txn, feedback, &id, items).await?;
            outcome.finished.push(feedback.clone());
            outcome.completed.push(id.clone());
            info!(wave_id = %id, "leaf wave echoed");
            return Ok(());
        }

        let wave = wave
            .with_outbound_links(links)
            .with_feedback_stream(feedback.name().clone())
            .with_state(WaveState::Created);
        let streams = self.create_outbound_streams(txn, &wave).await?;
        store.add(txn, wave.clone()).await?;
        DeferredPropagation::new(self.clone(), id.clone(), streams).register(txn)?;
        info!(wave_id = %id, links = wave.outbound_links().len(), "wave forwarded");
        Ok(())
    }

    async fn echo_target(
        &self,
        txn: &Transaction,
        store: &WaveStore,
        id: &WaveId,
        cancel: &CancellationToken,
    ) -> Result<EchoTarget, WaveError> {
        let wave = store
            .get(txn, id)
            .await?
            .ok_or_else(|| WaveError::invariant(format!("feedback for unknown wave {id}")))?;
        let processor = self.resolve_processor(&wave, cancel).await?;
        Ok(EchoTarget { wave, processor })
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_feedback(
        &self,
        txn: &Transaction,
        store: &WaveStore,
        parsed: &WaveStreamName,
        sender: &Link,
        item: WaveFeedback,
        target: &mut Option<EchoTarget>,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        let id = item
            .wave_id
            .clone()
            .ok_or_else(|| WaveError::invariant("feedback without a wave id"))?;
        if id != parsed.wave_id {
            return Err(WaveError::invariant(format!(
                "feedback for wave {id} on a stream of wave {}",
                parsed.wave_id
            )));
        }
        if target.is_none() {
            *target = Some(self.echo_target(txn, store, &id, cancel).await?);
        }
        let target = target
            .as_ref()
            .ok_or_else(|| WaveError::invariant("echo target missing"))?;
        target
            .processor
            .on_echo(txn, &target.wave, sender, &item)
            .await?;
        Ok(())
    }

    /// The feedback stream from `sender` ended after delivering feedback:
    /// record its echo and, if it was the last one, complete the wave here.
    async fn on_echo_complete(
        &self,
        txn: &Transaction,
        store: &WaveStore,
        sender: &Link,
        target: EchoTarget,
        outcome: &mut PassOutcome<M::Stream>,
    ) -> Result<(), WaveError> {
        let wave = target.wave.with_echo_received(sender)?;
        let id = wave.id().clone();

        if !wave.all_echoes_received() {
            let pending = wave.pending_links().count();
            store.update(txn, wave).await?;
            debug!(wave_id = %id, from = %sender, pending, "echo recorded");
            return Ok(());
        }

        let items = target.processor.on_wave_completed_echo(txn, &wave).await?;
        store.try_remove(txn, &id).await?;
        outcome.completed.push(id.clone());

        if wave.is_initiator() {
            info!(wave_id = %id, "wave complete at initiator");
            outcome.result = Some((wave, items));
            return Ok(());
        }

        let upstream = wave
            .inbound_link()
            .ok_or_else(|| WaveError::invariant(format!("wave {id} has no inbound link")))?;
        let name = wave
            .outbound_feedback_stream()
            .ok_or_else(|| WaveError::invariant(format!("wave {id} has no feedback stream")))?;
        let stream = self.find_outbound(upstream, name).ok_or_else(|| {
            WaveError::invariant(format!("feedback stream {name} to {upstream} is gone"))
        })?;
        self.send_feedback(txn, &stream, &id, items).await?;
        outcome.finished.push(stream);
        info!(wave_id = %id, to = %upstream, "aggregated echo sent");
        Ok(())
    }

    async fn finish_pass(
        &self,
        stream: &M::Stream,
        outcome: PassOutcome<M::Stream>,
        cancel: &CancellationToken,
    ) -> Result<(), WaveError> {
        for id in &outcome.completed {
            self.forget_processor(id);
        }
        if let Some((wave, items)) = outcome.result {
            let delivered = self
                .inner
                .results
                .on_wave_result(&wave, items, cancel.clone())
                .await;
            if let Err(e) = delivered {
                warn!(wave_id = %wave.id(), error = %e, "result processor failed");
            }
        }
        let mut done = outcome.finished;
        done.push(stream.clone());
        self.close_and_delete(done, cancel).await
    }
}
