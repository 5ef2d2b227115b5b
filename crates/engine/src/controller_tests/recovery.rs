// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{GateState, StateProvider, WaveError};
use wv_core::test_support::command;
use wv_core::{AccessStatus, Classify, ErrorClass, ReplicaRole, WaveState};

#[tokio::test]
async fn created_wave_is_sent_exactly_once_after_failover() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &[])]).await;
    let init = cluster.node("init");

    // Commit the wave after primary processing stopped: the deferred send
    // belongs to the old tenure and never runs.
    let txn = init.replicator.create_transaction().unwrap();
    let wave = init.controller.propagate(&txn, command(KIND)).await.unwrap();
    init.pause().await;
    txn.commit().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(cluster.waves_delivered_to("a").is_empty());
    assert_eq!(init.waves()[0].state(), WaveState::Created);

    init.start().await;
    let (done, feedback) = init.next_result().await;
    assert_eq!(done.id(), wave.id());
    assert_eq!(feedback.len(), 1);
    assert_eq!(cluster.waves_delivered_to("a"), vec![wave.id().clone()]);
    eventually("wave to be removed", move || async move { init.waves().is_empty() }).await;
}

#[tokio::test]
async fn parked_inbound_stream_is_processed_after_promotion() {
    let cluster = Cluster::build(&[("b", &[])]);
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave(&b.link, "w-1", "d1").await;
    assert_eq!(b.controller.streams().inbound_streams().len(), 1);
    assert!(b.processor.calls().is_empty());

    b.start().await;
    let items = up.receive_feedback(&feedback_name("w-1", "d1")).await;
    assert_eq!(items.len(), 1);
    assert_eq!(
        b.processor
            .count(|c| matches!(c, ProcessorCall::Started { .. })),
        1
    );
}

#[tokio::test]
async fn stream_announced_during_recovery_is_processed_once() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    // The callback from the first tenure is still registered, so the
    // stream is both requested through it and listed by recovery.
    b.pause().await;
    b.partition
        .set_write_status(AccessStatus::ReconfigurationPending);
    b.controller.change_role(ReplicaRole::Primary).await.unwrap();
    up.send_wave(&b.link, "w-x", "d1").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    b.partition.set_write_status(AccessStatus::Granted);
    b.controller.wait_until_ready().await.unwrap();
    let items = up.receive_feedback(&feedback_name("w-x", "d1")).await;
    assert_eq!(items.len(), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(b.partition.faults().is_empty(), "{:?}", b.partition.faults());
    assert_eq!(
        b.processor
            .count(|c| matches!(c, ProcessorCall::Started { .. })),
        1
    );
    eventually("inbound stream to be deleted", move || async move {
        b.controller.streams().inbound_streams().is_empty()
    })
    .await;
}

#[tokio::test]
async fn orphaned_outbound_streams_are_closed_and_deleted() {
    let cluster = Cluster::build(&[("b", &[])]);
    let b = cluster.node("b");
    b.partition.promote();

    let txn = b.replicator.create_transaction().unwrap();
    let name = WaveStreamName::propagate(WaveId::new("ghost"), "x").to_stream_name();
    b.controller
        .streams()
        .create_stream(&txn, &link("z"), &name)
        .await
        .unwrap();
    txn.commit().unwrap();
    assert_eq!(b.controller.streams().outbound_streams().len(), 1);

    b.start().await;
    assert!(b.controller.streams().outbound_streams().is_empty());
}

#[tokio::test]
async fn foreign_outbound_streams_survive_recovery() {
    let cluster = Cluster::build(&[("b", &[])]);
    let b = cluster.node("b");
    b.partition.promote();

    let txn = b.replicator.create_transaction().unwrap();
    b.controller
        .streams()
        .create_stream(&txn, &link("z"), &StreamName::new("otherstream:/keep"))
        .await
        .unwrap();
    txn.commit().unwrap();

    b.start().await;
    assert_eq!(b.controller.streams().outbound_streams().len(), 1);
}

#[tokio::test]
async fn recovery_waits_for_write_access() {
    let cluster = Cluster::build(&[("b", &[])]);
    let b = cluster.node("b");
    b.partition.promote();
    b.partition
        .set_write_status(AccessStatus::ReconfigurationPending);

    b.controller.change_role(ReplicaRole::Primary).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(b.controller.gate_state(), GateState::Pending);

    b.partition.set_write_status(AccessStatus::Granted);
    b.controller.wait_until_ready().await.unwrap();
    assert_eq!(b.controller.gate_state(), GateState::Ready);
}

#[tokio::test]
async fn demotion_fails_the_gate() {
    let cluster = Cluster::start(&[("b", &["c"])]).await;
    let b = cluster.node("b");

    b.pause().await;
    assert_eq!(
        b.controller.gate_state(),
        GateState::Failed(ErrorClass::NotPrimary)
    );
    assert!(b.controller.wave_store().is_none());
    let err = b.controller.wait_until_ready().await.unwrap_err();
    assert!(matches!(err, WaveError::NotPrimary));
}

#[tokio::test]
async fn demotion_during_recovery_cancels_it() {
    let cluster = Cluster::build(&[("b", &[])]);
    let b = cluster.node("b");
    b.partition.promote();
    b.partition.set_read_status(AccessStatus::NoWriteQuorum);

    b.controller.change_role(ReplicaRole::Primary).await.unwrap();
    let waiter = {
        let controller = b.controller.clone();
        tokio::spawn(async move { controller.wait_until_ready().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    b.pause().await;

    let err = waiter.await.unwrap().unwrap_err();
    assert!(err.class().is_benign());
    assert!(b.partition.faults().is_empty());
}

#[tokio::test]
async fn stored_waves_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = StoreConfig::default().with_wal_dir(dir.path());
    let network = LocalNetwork::new();

    // No partition runs at "a", so the wave stays started.
    let first = TestNode::with_config(&network, "init", &["a"], test_config(), store.clone());
    first.start().await;
    let wave = first.controller.initiate(command(KIND)).await.unwrap();
    eventually("wave to be started", || {
        let waves = first.waves();
        async move { waves.first().is_some_and(|w| w.state() == WaveState::Started) }
    })
    .await;
    first.pause().await;

    let second = TestNode::with_config(&LocalNetwork::new(), "init", &["a"], test_config(), store);
    second.start().await;
    let stored = second.controller.wave_store().unwrap().committed();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id(), wave.id());
    assert_eq!(stored[0].state(), WaveState::Started);
}
