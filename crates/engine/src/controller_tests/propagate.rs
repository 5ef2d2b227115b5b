// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{ControllerConfig, WaveError};
use wv_core::test_support::command;
use wv_core::{Classify, ErrorClass, WaveState};

#[tokio::test]
async fn propagate_stages_created_wave_until_commit() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &[])]).await;
    let init = cluster.node("init");

    let txn = init.replicator.create_transaction().unwrap();
    let wave = init.controller.propagate(&txn, command(KIND)).await.unwrap();
    assert_eq!(wave.state(), WaveState::Created);
    assert!(wave.is_initiator());
    assert_eq!(wave.inbound_link(), Some(&init.link));
    assert_eq!(wave.links().cloned().collect::<Vec<_>>(), vec![link("a")]);

    // Nothing is visible before commit.
    assert!(init.waves().is_empty());
    assert!(init.controller.streams().outbound_streams().is_empty());
    assert!(cluster.network.deliveries().is_empty());

    txn.commit().unwrap();
    let (done, _) = init.next_result().await;
    assert_eq!(done.id(), wave.id());
    assert_eq!(cluster.waves_delivered_to("a"), vec![wave.id().clone()]);
}

#[tokio::test]
async fn aborted_propagate_sends_nothing() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &[])]).await;
    let init = cluster.node("init");

    {
        let txn = init.replicator.create_transaction().unwrap();
        init.controller.propagate(&txn, command(KIND)).await.unwrap();
        txn.abort();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(init.waves().is_empty());
    assert!(init.controller.streams().outbound_streams().is_empty());
    assert!(cluster.network.deliveries().is_empty());
    assert!(cluster.node("a").processor.calls().is_empty());
}

async fn assert_no_next_hops(links: &[&str]) {
    let cluster = Cluster::start(&[("init", links)]).await;
    let init = cluster.node("init");

    let err = init.controller.initiate(command(KIND)).await.unwrap_err();
    assert!(matches!(err, WaveError::NoOutboundLinks(_)));
    assert_eq!(err.class(), ErrorClass::InvalidOperation);
    assert!(init.waves().is_empty());
    assert!(init.controller.active_waves().is_empty());
    assert!(init.controller.streams().outbound_streams().is_empty());
}

#[tokio::test]
async fn initiator_without_links_is_invalid() {
    assert_no_next_hops(&[]).await;
}

#[tokio::test]
async fn initiator_linked_only_to_itself_is_invalid() {
    assert_no_next_hops(&["init"]).await;
}

#[tokio::test]
async fn duplicate_links_get_one_stream_each() {
    let cluster = Cluster::start(&[("init", &["a", "a", "init"]), ("a", &[])]).await;
    let init = cluster.node("init");

    let wave = init.controller.initiate(command(KIND)).await.unwrap();
    assert_eq!(wave.outbound_links().len(), 1);
    init.next_result().await;
    assert_eq!(cluster.waves_delivered_to("a").len(), 1);
}

#[tokio::test]
async fn propagate_on_secondary_fails_fast() {
    let cluster = Cluster::build(&[("init", &["a"])]);
    let init = cluster.node("init");

    let err = init.controller.initiate(command(KIND)).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotPrimary);
}

#[tokio::test]
async fn initiate_retries_transient_processor_failures() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &[])]).await;
    let init = cluster.node("init");
    init.processor.fail_started(2);

    let wave = init.controller.initiate(command(KIND)).await.unwrap();
    init.next_result().await;
    assert_eq!(
        init.processor
            .count(|c| matches!(c, ProcessorCall::Started { .. })),
        3
    );
    assert_eq!(cluster.waves_delivered_to("a"), vec![wave.id().clone()]);
}

#[tokio::test]
async fn late_registered_processor_is_picked_up() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &[])]).await;
    let init = cluster.node("init");
    let late = FakeProcessor::new("init", vec![link("a")]);

    let registry = init.registry.clone();
    let register = {
        let late = late.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            registry.register("late", late);
        })
    };
    cluster.node("a").registry.register("late", FakeProcessor::new("a", vec![]));

    let wave = init.controller.initiate(command("late")).await.unwrap();
    register.await.unwrap();
    assert_eq!(wave.state(), WaveState::Created);
    assert_eq!(late.count(|c| matches!(c, ProcessorCall::Started { .. })), 1);
}

#[tokio::test]
async fn unresolved_processor_times_out() {
    let config = ControllerConfig {
        processing_timeout_ms: 20,
        ..test_config()
    };
    let cluster = Cluster::start_with(&[("init", &["a"])], config).await;
    let init = cluster.node("init");

    // Retries are unbounded, so only a non-retried timeout returns.
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        init.controller.initiate(command("unknown")),
    )
    .await;
    let err = result.expect("initiate kept retrying").unwrap_err();
    assert!(matches!(err, WaveError::ProcessorTimeout { .. }));
    assert!(err.class().is_benign());
    assert!(init.partition.faults().is_empty());
}
