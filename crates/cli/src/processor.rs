// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Survey processor: every node reports itself and the reports of its next
//! hops, so the initiator ends up with the spanning tree the wave took.
//!
//! A command body of `{"fail_at": "<node>"}` makes that node answer with a
//! fault instead of its report; its parent records the fault against the
//! link it came from.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use wv_core::{FeedbackOutcome, Link, Wave, WaveFeedback, WaveId};
use wv_engine::{ProcessorError, WaveProcessor, WaveResultProcessor};
use wv_storage::Transaction;

pub struct SurveyProcessor {
    node: String,
    links: Vec<Link>,
    echoes: Mutex<HashMap<WaveId, Vec<Value>>>,
}

impl SurveyProcessor {
    pub fn new(node: impl Into<String>, links: Vec<Link>) -> Self {
        Self {
            node: node.into(),
            links,
            echoes: Mutex::new(HashMap::new()),
        }
    }
}

impl SurveyProcessor {
    fn fails_here(&self, wave: &Wave) -> bool {
        wave.command().body.get("fail_at").and_then(Value::as_str) == Some(self.node.as_str())
    }
}

fn report(feedback: &WaveFeedback) -> Value {
    match &feedback.outcome {
        FeedbackOutcome::Data(value) => value.clone(),
        FeedbackOutcome::Fault { message } => json!({ "fault": message }),
    }
}

#[async_trait]
impl WaveProcessor for SurveyProcessor {
    async fn on_wave_started(
        &self,
        _txn: &Transaction,
        _wave: &Wave,
        _sender: &Link,
    ) -> Result<Vec<Link>, ProcessorError> {
        Ok(self.links.clone())
    }

    async fn on_wave_existent_echo(
        &self,
        _txn: &Transaction,
        _wave: &Wave,
        _sender: &Link,
    ) -> Result<Vec<WaveFeedback>, ProcessorError> {
        Ok(vec![WaveFeedback::data(
            json!({ "node": self.node, "seen": true }),
        )])
    }

    async fn on_wave_completed_echo(
        &self,
        _txn: &Transaction,
        wave: &Wave,
    ) -> Result<Vec<WaveFeedback>, ProcessorError> {
        if self.fails_here(wave) {
            return Ok(vec![WaveFeedback::fault(format!(
                "survey failed at {}",
                self.node
            ))]);
        }
        let children = self
            .echoes
            .lock()
            .get(wave.id())
            .cloned()
            .unwrap_or_default();
        Ok(vec![WaveFeedback::data(json!({
            "node": self.node,
            "children": children,
        }))])
    }

    async fn on_echo(
        &self,
        _txn: &Transaction,
        wave: &Wave,
        sender: &Link,
        feedback: &WaveFeedback,
    ) -> Result<(), ProcessorError> {
        if feedback.is_ack() {
            return Ok(());
        }
        let value = if feedback.is_fault() {
            warn!(wave_id = %wave.id(), from = %sender, "next hop reported a fault");
            json!({ "from": sender.to_string(), "fault": report(feedback)["fault"] })
        } else {
            report(feedback)
        };
        let mut echoes = self.echoes.lock();
        let seen = echoes.entry(wave.id().clone()).or_default();
        // A pass retried after a transient failure replays its echoes.
        if !seen.contains(&value) {
            seen.push(value);
        }
        Ok(())
    }
}

/// Aggregated result of one wave at its initiator.
#[derive(Debug, Clone)]
pub struct WaveResult {
    pub wave: Wave,
    pub feedback: Vec<WaveFeedback>,
}

impl WaveResult {
    pub fn reports(&self) -> Vec<Value> {
        self.feedback.iter().map(report).collect()
    }
}

/// Forwards wave results to whoever is waiting on the channel.
pub struct ResultChannel {
    tx: mpsc::UnboundedSender<WaveResult>,
}

impl ResultChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WaveResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl WaveResultProcessor for ResultChannel {
    async fn on_wave_result(
        &self,
        wave: &Wave,
        feedback: Vec<WaveFeedback>,
        _cancel: CancellationToken,
    ) -> Result<(), ProcessorError> {
        self.tx
            .send(WaveResult {
                wave: wave.clone(),
                feedback,
            })
            .map_err(|_| ProcessorError::Failed("result receiver dropped".into()))
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
