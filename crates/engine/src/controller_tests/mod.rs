// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller tests

mod end_to_end;
mod inbound;
mod lifecycle;
mod propagate;
mod recovery;

use crate::test_helpers::*;
use std::time::Duration;
use wv_adapters::{LocalNetwork, LocalStreamManager, MessageStream, StreamManager};
use wv_core::test_support::{envelope, link};
use wv_core::{
    Link, LocalPartition, StreamName, WaveFeedback, WaveId, WaveMessage, WaveStreamName,
};
use wv_storage::{Replicator, StoreConfig};

/// A partition on the network with no controller, driven by hand.
struct RawNode {
    link: Link,
    manager: LocalStreamManager,
    replicator: Replicator,
}

impl RawNode {
    fn new(network: &LocalNetwork, name: &str) -> Self {
        let partition = LocalPartition::new(link(name));
        partition.promote();
        Self {
            link: link(name),
            manager: network.manager(link(name)),
            replicator: Replicator::new(std::sync::Arc::new(partition), StoreConfig::default()),
        }
    }

    /// Send wave `id` to `to` on a fresh propagate stream, then close it.
    async fn send_wave(&self, to: &Link, id: &str, disambiguator: &str) {
        self.send_wave_of_kind(to, id, disambiguator, KIND).await;
    }

    async fn send_wave_of_kind(&self, to: &Link, id: &str, disambiguator: &str, kind: &str) {
        let name = WaveStreamName::propagate(WaveId::new(id), disambiguator).to_stream_name();
        self.send(to, &name, vec![WaveMessage::Wave(envelope(id, kind))])
            .await;
    }

    async fn send(&self, to: &Link, name: &StreamName, messages: Vec<WaveMessage>) {
        let txn = self.replicator.create_transaction().unwrap();
        let stream = self.manager.create_stream(&txn, to, name).await.unwrap();
        txn.commit().unwrap();
        stream.open().await.unwrap();

        let txn = self.replicator.create_transaction().unwrap();
        for message in messages {
            stream.send(&txn, message.encode().unwrap()).await.unwrap();
        }
        txn.commit().unwrap();
        stream.close().await.unwrap();
    }

    /// Drain the feedback stream a controller opens back to this node.
    async fn receive_feedback(&self, name: &StreamName) -> Vec<WaveFeedback> {
        let manager = self.manager.clone();
        let wanted = name.clone();
        eventually("feedback stream to open", || {
            let manager = manager.clone();
            let wanted = wanted.clone();
            async move { manager.inbound_streams().iter().any(|s| s.name() == &wanted) }
        })
        .await;
        let stream = self
            .manager
            .inbound_streams()
            .into_iter()
            .find(|s| s.name() == name)
            .unwrap();

        let txn = self.replicator.create_transaction().unwrap();
        let mut items = Vec::new();
        loop {
            let next = tokio::time::timeout(Duration::from_secs(5), stream.receive(&txn))
                .await
                .expect("timed out receiving feedback")
                .unwrap();
            let Some(payload) = next else { break };
            match WaveMessage::decode(&payload).unwrap() {
                WaveMessage::Feedback(item) => items.push(item),
                other => panic!("unexpected message {}", other.name()),
            }
        }
        txn.commit().unwrap();
        items
    }
}

fn feedback_name(id: &str, disambiguator: &str) -> StreamName {
    WaveStreamName::propagate(WaveId::new(id), disambiguator)
        .feedback_pair()
        .unwrap()
        .to_stream_name()
}
