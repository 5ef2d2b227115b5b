// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::stream::{CallbackCall, RecordingCallback};
use std::time::Duration;
use wv_core::test_support::link;
use wv_core::{Classify, ErrorClass, LocalPartition};
use wv_storage::{Replicator, StoreConfig};

struct Node {
    replicator: Replicator,
    manager: LocalStreamManager,
}

fn node(network: &LocalNetwork, name: &str) -> Node {
    let partition = LocalPartition::new(link(name));
    partition.promote();
    Node {
        replicator: Replicator::new(Arc::new(partition), StoreConfig::default()),
        manager: network.manager(link(name)),
    }
}

fn stream_name(s: &str) -> StreamName {
    StreamName::new(format!("wavestream:/w-1/propagate/{s}"))
}

/// Create, commit and open an outbound stream from `a` to `b`.
async fn open_stream(a: &Node, b: &Node, name: &str) -> LocalStream {
    let txn = a.replicator.create_transaction().unwrap();
    let stream = a
        .manager
        .create_stream(&txn, b.manager.link(), &stream_name(name))
        .await
        .unwrap();
    txn.commit().unwrap();
    stream.open().await.unwrap();
    stream
}

fn inbound(b: &Node) -> LocalStream {
    let mut streams = b.manager.inbound_streams();
    assert_eq!(streams.len(), 1, "expected one inbound stream");
    streams.remove(0)
}

#[tokio::test]
async fn sends_are_visible_only_after_commit() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    let inb = inbound(&b);

    let txn = a.replicator.create_transaction().unwrap();
    out.send(&txn, b"one".to_vec()).await.unwrap();
    assert!(network.deliveries().is_empty());
    txn.commit().unwrap();

    let deliveries = network.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].from, link("a"));
    assert_eq!(deliveries[0].to, link("b"));
    assert_eq!(deliveries[0].payload, b"one");

    let rx = b.replicator.create_transaction().unwrap();
    assert_eq!(inb.receive(&rx).await.unwrap(), Some(b"one".to_vec()));
}

#[tokio::test]
async fn aborted_sends_never_arrive() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    {
        let txn = a.replicator.create_transaction().unwrap();
        out.send(&txn, b"lost".to_vec()).await.unwrap();
    }
    out.close().await.unwrap();

    let rx = b.replicator.create_transaction().unwrap();
    assert_eq!(inbound(&b).receive(&rx).await.unwrap(), None);
    assert!(network.deliveries().is_empty());
}

#[tokio::test]
async fn stream_created_in_aborted_transaction_does_not_exist() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let stream = {
        let txn = a.replicator.create_transaction().unwrap();
        let stream = a
            .manager
            .create_stream(&txn, b.manager.link(), &stream_name("s"))
            .await
            .unwrap();
        assert!(a.manager.outbound_streams().is_empty());
        stream
    };

    assert!(a.manager.outbound_streams().is_empty());
    assert_eq!(stream.state(), StreamState::Deleted);
    assert!(stream.open().await.is_err());
    assert!(b.manager.inbound_streams().is_empty());
}

#[tokio::test]
async fn duplicate_stream_names_are_rejected() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    open_stream(&a, &b, "s").await;

    let txn = a.replicator.create_transaction().unwrap();
    let err = a
        .manager
        .create_stream(&txn, b.manager.link(), &stream_name("s"))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Invariant);
}

#[tokio::test]
async fn aborted_receive_returns_messages_in_order() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    let txn = a.replicator.create_transaction().unwrap();
    out.send(&txn, b"1".to_vec()).await.unwrap();
    out.send(&txn, b"2".to_vec()).await.unwrap();
    txn.commit().unwrap();
    out.close().await.unwrap();
    let inb = inbound(&b);

    {
        let rx = b.replicator.create_transaction().unwrap();
        assert_eq!(inb.receive(&rx).await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(inb.receive(&rx).await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(inb.receive(&rx).await.unwrap(), None);
        rx.abort();
    }
    assert_eq!(inb.state(), StreamState::Open);

    let rx = b.replicator.create_transaction().unwrap();
    assert_eq!(inb.receive(&rx).await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(inb.receive(&rx).await.unwrap(), Some(b"2".to_vec()));
    assert_eq!(inb.receive(&rx).await.unwrap(), None);
    rx.commit().unwrap();
    assert_eq!(inb.state(), StreamState::Closed);
}

#[tokio::test]
async fn receive_waits_for_commit() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    let inb = inbound(&b);
    let receiver = b.replicator.clone();

    let pending = tokio::spawn(async move {
        let rx = receiver.create_transaction().unwrap();
        let msg = inb.receive(&rx).await.unwrap();
        rx.commit().unwrap();
        msg
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!pending.is_finished());

    let txn = a.replicator.create_transaction().unwrap();
    out.send(&txn, b"late".to_vec()).await.unwrap();
    txn.commit().unwrap();

    assert_eq!(pending.await.unwrap(), Some(b"late".to_vec()));
}

#[tokio::test]
async fn opening_announces_to_partner_callback() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let (callback, mut created) = RecordingCallback::<LocalStream>::new();
    b.manager
        .register_callback_by_prefix("wavestream:/", Arc::new(callback.clone()))
        .unwrap();

    open_stream(&a, &b, "s").await;

    let stream = created.recv().await.unwrap();
    assert_eq!(stream.partner(), &link("a"));
    assert_eq!(stream.direction(), StreamDirection::Inbound);
    assert_eq!(
        callback.calls(),
        vec![
            CallbackCall::Requested {
                partner: link("a"),
                name: stream_name("s"),
            },
            CallbackCall::Created {
                name: stream_name("s"),
            },
        ]
    );
}

#[tokio::test]
async fn rejected_stream_stays_parked() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let (callback, mut created) = RecordingCallback::<LocalStream>::new();
    callback.set_accept(false);
    b.manager
        .register_callback_by_prefix("wavestream:/", Arc::new(callback.clone()))
        .unwrap();

    open_stream(&a, &b, "s").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(created.try_recv().is_err());
    assert_eq!(b.manager.inbound_streams().len(), 1);
}

#[tokio::test]
async fn foreign_prefix_is_not_announced() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let (callback, _created) = RecordingCallback::<LocalStream>::new();
    b.manager
        .register_callback_by_prefix("otherstream:/", Arc::new(callback.clone()))
        .unwrap();

    open_stream(&a, &b, "s").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(callback.calls().is_empty());
}

#[tokio::test]
async fn delete_hides_stream_after_commit() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    out.close().await.unwrap();

    {
        let txn = a.replicator.create_transaction().unwrap();
        out.delete(&txn).await.unwrap();
        assert_eq!(out.state(), StreamState::Deleting);
    }
    assert_eq!(out.state(), StreamState::Closed);
    assert_eq!(a.manager.outbound_streams().len(), 1);

    let txn = a.replicator.create_transaction().unwrap();
    out.delete(&txn).await.unwrap();
    txn.commit().unwrap();
    assert_eq!(out.state(), StreamState::Deleted);
    assert!(a.manager.outbound_streams().is_empty());
    // The receiver still owns its end.
    assert_eq!(b.manager.inbound_streams().len(), 1);
}

#[tokio::test]
async fn direction_is_enforced() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    let inb = inbound(&b);

    let txn = a.replicator.create_transaction().unwrap();
    let err = out.receive(&txn).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvalidOperation);
    let err = inb.send(&txn, vec![]).await.unwrap_err();
    assert!(matches!(err, StreamError::WrongDirection { .. }));
}

#[tokio::test]
async fn send_after_close_is_closed() {
    let network = LocalNetwork::new();
    let (a, b) = (node(&network, "a"), node(&network, "b"));
    let out = open_stream(&a, &b, "s").await;
    out.close().await.unwrap();

    let txn = a.replicator.create_transaction().unwrap();
    let err = out.send(&txn, vec![]).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Closed);
}
