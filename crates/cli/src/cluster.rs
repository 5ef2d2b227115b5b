// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process cluster built from a topology: one partition, replicator and
//! controller per node, all on a single `LocalNetwork`.

use crate::processor::{ResultChannel, SurveyProcessor, WaveResult};
use crate::topology::Topology;
use anyhow::{anyhow, bail, Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wv_adapters::{LocalNetwork, LocalStreamManager, StreamManager, TracedStreamManager};
use wv_core::{LocalPartition, ReplicaRole, UuidIdGen, WaveCommand};
use wv_engine::{ControllerDeps, KindRegistry, StateProvider, WaveController};
use wv_storage::Replicator;

type Controller = WaveController<TracedStreamManager<LocalStreamManager>>;

struct ClusterNode {
    name: String,
    partition: LocalPartition,
    controller: Controller,
}

pub struct LocalCluster {
    network: LocalNetwork,
    nodes: Vec<ClusterNode>,
    results: mpsc::UnboundedReceiver<WaveResult>,
}

/// What a finished run reports.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: WaveResult,
    pub initiator: String,
    pub messages: usize,
}

impl LocalCluster {
    /// Build every node with a survey processor registered for `kind`.
    pub fn build(topology: &Topology, kind: &str) -> Self {
        let network = LocalNetwork::new();
        let (results, rx) = ResultChannel::new();
        let results = Arc::new(results);
        let nodes = topology
            .nodes
            .iter()
            .map(|spec| {
                let link = spec.link();
                let partition = LocalPartition::new(link.clone());
                let registry = KindRegistry::new();
                registry.register(
                    kind,
                    Arc::new(SurveyProcessor::new(&spec.name, topology.links_of(spec))),
                );
                let controller = WaveController::new(
                    ControllerDeps {
                        partition: Arc::new(partition.clone()),
                        replicator: Replicator::new(
                            Arc::new(partition.clone()),
                            topology.store_for(spec),
                        ),
                        streams: TracedStreamManager::new(network.manager(link)),
                        processors: Arc::new(registry),
                        results: results.clone(),
                        id_gen: Arc::new(UuidIdGen),
                    },
                    topology.controller.clone(),
                );
                ClusterNode {
                    name: spec.name.clone(),
                    partition,
                    controller,
                }
            })
            .collect();
        Self {
            network,
            nodes,
            results: rx,
        }
    }

    /// Promote every node and wait until each is ready to process waves.
    pub async fn start(&self) -> Result<()> {
        let started = join_all(self.nodes.iter().map(|node| async move {
            node.partition.promote();
            node.controller.open().await?;
            node.controller.change_role(ReplicaRole::Primary).await?;
            node.controller.wait_until_ready().await
        }))
        .await;
        for (node, result) in self.nodes.iter().zip(started) {
            result.with_context(|| format!("starting node '{}'", node.name))?;
        }
        info!(nodes = self.nodes.len(), "cluster ready");
        Ok(())
    }

    /// Initiate a wave at `from` and wait for its aggregated result.
    pub async fn run(
        &mut self,
        from: &str,
        command: WaveCommand,
        timeout: Duration,
    ) -> Result<RunReport> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.name == from)
            .ok_or_else(|| anyhow!("no node named '{from}'"))?;
        let wave = node
            .controller
            .initiate(command)
            .await
            .with_context(|| format!("initiating wave at '{from}'"))?;
        info!(wave_id = %wave.id(), node = from, "wave initiated");

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let result = match tokio::time::timeout_at(deadline, self.results.recv()).await {
                Ok(Some(result)) => result,
                Ok(None) => bail!("result channel closed"),
                Err(_) => bail!("wave {} did not complete within {timeout:?}", wave.id()),
            };
            if result.wave.id() == wave.id() {
                return Ok(RunReport {
                    result,
                    initiator: from.to_string(),
                    messages: self.network.deliveries().len(),
                });
            }
        }
    }

    /// Streams still open anywhere on the network.
    pub fn open_streams(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.controller.streams().outbound_streams().len())
            .sum()
    }

    pub async fn shutdown(&self) {
        for node in &self.nodes {
            if let Err(e) = node.controller.close().await {
                warn!(node = %node.name, error = %e, "close failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
