// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::{
    ControllerConfig, ControllerDeps, KindRegistry, ProcessorError, StateProvider,
    WaveController, WaveProcessor, WaveResultProcessor,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wv_adapters::{LocalNetwork, LocalStreamManager};
use wv_core::test_support::link;
use wv_core::{
    FeedbackOutcome, Link, LocalPartition, ReplicaRole, SequentialIdGen, Wave, WaveFeedback,
    WaveId, WaveMessage,
};
use wv_storage::{Replicator, StoreConfig};

/// Command kind every fake processor is registered under.
pub(crate) const KIND: &str = "survey";

pub(crate) type TestController = WaveController<LocalStreamManager>;

pub(crate) fn test_config() -> ControllerConfig {
    ControllerConfig {
        processing_timeout_ms: 2_000,
        poll_interval_ms: 5,
        retry_backoff_ms: 5,
        ..ControllerConfig::default()
    }
}

/// Recorded processor hook invocation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProcessorCall {
    Started { wave: WaveId, sender: Link },
    Existent { wave: WaveId, sender: Link },
    Completed { wave: WaveId },
    Echo {
        wave: WaveId,
        sender: Link,
        feedback: WaveFeedback,
    },
}

#[derive(Default)]
struct FakeProcessorState {
    calls: Vec<ProcessorCall>,
    echoes: HashMap<WaveId, Vec<WaveFeedback>>,
    transient_started_failures: u32,
}

/// Processor that fans out to fixed links and reports which node it ran on.
/// Completion echoes carry the payloads of every echo it received.
pub(crate) struct FakeProcessor {
    node: String,
    links: Vec<Link>,
    state: Mutex<FakeProcessorState>,
}

impl FakeProcessor {
    pub(crate) fn new(node: &str, links: Vec<Link>) -> Arc<Self> {
        Arc::new(Self {
            node: node.to_string(),
            links,
            state: Mutex::new(FakeProcessorState::default()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<ProcessorCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn count(&self, matches: impl Fn(&ProcessorCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matches(c)).count()
    }

    /// Fail the next `n` `on_wave_started` calls with a transient error.
    pub(crate) fn fail_started(&self, n: u32) {
        self.state.lock().transient_started_failures = n;
    }

    fn record(&self, call: ProcessorCall) {
        self.state.lock().calls.push(call);
    }
}

/// Payload carried by a feedback item, for assertions.
pub(crate) fn payload(feedback: &WaveFeedback) -> Value {
    match &feedback.outcome {
        FeedbackOutcome::Data(value) => value.clone(),
        FeedbackOutcome::Fault { message } => json!({ "fault": message }),
    }
}

#[async_trait]
impl WaveProcessor for FakeProcessor {
    async fn on_wave_started(
        &self,
        _txn: &wv_storage::Transaction,
        wave: &Wave,
        sender: &Link,
    ) -> Result<Vec<Link>, ProcessorError> {
        self.record(ProcessorCall::Started {
            wave: wave.id().clone(),
            sender: sender.clone(),
        });
        let mut state = self.state.lock();
        if state.transient_started_failures > 0 {
            state.transient_started_failures -= 1;
            return Err(ProcessorError::Transient("not yet".into()));
        }
        Ok(self.links.clone())
    }

    async fn on_wave_existent_echo(
        &self,
        _txn: &wv_storage::Transaction,
        wave: &Wave,
        sender: &Link,
    ) -> Result<Vec<WaveFeedback>, ProcessorError> {
        self.record(ProcessorCall::Existent {
            wave: wave.id().clone(),
            sender: sender.clone(),
        });
        Ok(vec![WaveFeedback::data(
            json!({ "node": self.node, "existent": true }),
        )])
    }

    async fn on_wave_completed_echo(
        &self,
        _txn: &wv_storage::Transaction,
        wave: &Wave,
    ) -> Result<Vec<WaveFeedback>, ProcessorError> {
        self.record(ProcessorCall::Completed {
            wave: wave.id().clone(),
        });
        let children: Vec<Value> = self
            .state
            .lock()
            .echoes
            .get(wave.id())
            .map(|echoes| echoes.iter().map(payload).collect())
            .unwrap_or_default();
        Ok(vec![WaveFeedback::data(
            json!({ "node": self.node, "children": children }),
        )])
    }

    async fn on_echo(
        &self,
        _txn: &wv_storage::Transaction,
        wave: &Wave,
        sender: &Link,
        feedback: &WaveFeedback,
    ) -> Result<(), ProcessorError> {
        self.record(ProcessorCall::Echo {
            wave: wave.id().clone(),
            sender: sender.clone(),
            feedback: feedback.clone(),
        });
        let mut state = self.state.lock();
        let echoes = state.echoes.entry(wave.id().clone()).or_default();
        if !echoes.contains(feedback) {
            echoes.push(feedback.clone());
        }
        Ok(())
    }
}

/// Processor that forwards nowhere and has nothing to report.
pub(crate) struct SilentProcessor;

#[async_trait]
impl WaveProcessor for SilentProcessor {
    async fn on_wave_started(
        &self,
        _txn: &wv_storage::Transaction,
        _wave: &Wave,
        _sender: &Link,
    ) -> Result<Vec<Link>, ProcessorError> {
        Ok(Vec::new())
    }

    async fn on_wave_existent_echo(
        &self,
        _txn: &wv_storage::Transaction,
        _wave: &Wave,
        _sender: &Link,
    ) -> Result<Vec<WaveFeedback>, ProcessorError> {
        Ok(Vec::new())
    }

    async fn on_wave_completed_echo(
        &self,
        _txn: &wv_storage::Transaction,
        _wave: &Wave,
    ) -> Result<Vec<WaveFeedback>, ProcessorError> {
        Ok(Vec::new())
    }

    async fn on_echo(
        &self,
        _txn: &wv_storage::Transaction,
        _wave: &Wave,
        _sender: &Link,
        _feedback: &WaveFeedback,
    ) -> Result<(), ProcessorError> {
        Ok(())
    }
}

/// Result processor forwarding every aggregated result on a channel.
pub(crate) struct FakeResults {
    tx: mpsc::UnboundedSender<(Wave, Vec<WaveFeedback>)>,
}

#[async_trait]
impl WaveResultProcessor for FakeResults {
    async fn on_wave_result(
        &self,
        wave: &Wave,
        feedback: Vec<WaveFeedback>,
        _cancel: CancellationToken,
    ) -> Result<(), ProcessorError> {
        let _ = self.tx.send((wave.clone(), feedback));
        Ok(())
    }
}

pub(crate) struct TestNode {
    pub name: String,
    pub link: Link,
    pub partition: LocalPartition,
    pub replicator: Replicator,
    pub registry: KindRegistry,
    pub processor: Arc<FakeProcessor>,
    pub controller: TestController,
    results: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Wave, Vec<WaveFeedback>)>>,
}

impl TestNode {
    pub(crate) fn new(network: &LocalNetwork, name: &str, links: &[&str]) -> Self {
        Self::with_config(network, name, links, test_config(), StoreConfig::default())
    }

    pub(crate) fn with_config(
        network: &LocalNetwork,
        name: &str,
        links: &[&str],
        config: ControllerConfig,
        store: StoreConfig,
    ) -> Self {
        let link = link(name);
        let partition = LocalPartition::new(link.clone());
        let replicator = Replicator::new(Arc::new(partition.clone()), store);
        let processor = FakeProcessor::new(name, links.iter().map(|l| wv_core::test_support::link(l)).collect());
        let registry = KindRegistry::new();
        registry.register(KIND, processor.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = WaveController::new(
            ControllerDeps {
                partition: Arc::new(partition.clone()),
                replicator: replicator.clone(),
                streams: network.manager(link.clone()),
                processors: Arc::new(registry.clone()),
                results: Arc::new(FakeResults { tx }),
                id_gen: Arc::new(SequentialIdGen::new(name)),
            },
            config,
        );
        Self {
            name: name.to_string(),
            link,
            partition,
            replicator,
            registry,
            processor,
            controller,
            results: tokio::sync::Mutex::new(rx),
        }
    }

    /// Promote the partition and wait for primary processing to be ready.
    pub(crate) async fn start(&self) {
        self.partition.promote();
        self.controller
            .change_role(ReplicaRole::Primary)
            .await
            .unwrap();
        self.controller.wait_until_ready().await.unwrap();
    }

    /// Stop primary processing without touching the partition's role.
    pub(crate) async fn pause(&self) {
        self.controller
            .change_role(ReplicaRole::ActiveSecondary)
            .await
            .unwrap();
    }

    pub(crate) async fn next_result(&self) -> (Wave, Vec<WaveFeedback>) {
        let mut results = self.results.lock().await;
        tokio::time::timeout(Duration::from_secs(5), results.recv())
            .await
            .expect("timed out waiting for a wave result")
            .expect("result channel closed")
    }

    pub(crate) fn waves(&self) -> Vec<Wave> {
        self.replicator
            .get_or_create_store(&self.controller.config().store_name)
            .map(|store| store.committed())
            .unwrap_or_default()
    }
}

/// A set of nodes on one in-process network.
pub(crate) struct Cluster {
    pub network: LocalNetwork,
    pub nodes: Vec<TestNode>,
}

impl Cluster {
    /// Build nodes from `(name, links)` pairs without starting them.
    pub(crate) fn build(topology: &[(&str, &[&str])]) -> Self {
        let network = LocalNetwork::new();
        let nodes = topology
            .iter()
            .map(|(name, links)| TestNode::new(&network, name, links))
            .collect();
        Self { network, nodes }
    }

    pub(crate) async fn start(topology: &[(&str, &[&str])]) -> Self {
        Self::start_with(topology, test_config()).await
    }

    pub(crate) async fn start_with(topology: &[(&str, &[&str])], config: ControllerConfig) -> Self {
        let network = LocalNetwork::new();
        let nodes = topology
            .iter()
            .map(|(name, links)| {
                TestNode::with_config(&network, name, links, config.clone(), StoreConfig::default())
            })
            .collect();
        let cluster = Self { network, nodes };
        for node in &cluster.nodes {
            node.start().await;
        }
        cluster
    }

    pub(crate) fn node(&self, name: &str) -> &TestNode {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    /// Wave messages delivered to `to`, by wave id.
    pub(crate) fn waves_delivered_to(&self, to: &str) -> Vec<WaveId> {
        self.network
            .deliveries()
            .into_iter()
            .filter(|d| d.to == link(to))
            .filter_map(|d| match WaveMessage::decode(&d.payload) {
                Ok(WaveMessage::Wave(envelope)) => Some(envelope.id),
                _ => None,
            })
            .collect()
    }

    /// Feedback items delivered to `to`.
    pub(crate) fn feedback_delivered_to(&self, to: &str) -> Vec<WaveFeedback> {
        self.network
            .deliveries()
            .into_iter()
            .filter(|d| d.to == link(to))
            .filter_map(|d| match WaveMessage::decode(&d.payload) {
                Ok(WaveMessage::Feedback(feedback)) => Some(feedback),
                _ => None,
            })
            .collect()
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub(crate) async fn eventually<F, Fut>(what: &str, condition: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
