// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::{json, Value};
use wv_core::test_support::command;

fn child_nodes(result: &Value) -> Vec<String> {
    let mut nodes: Vec<String> = result["children"]
        .as_array()
        .map(|children| {
            children
                .iter()
                .filter_map(|c| c["node"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    nodes.sort();
    nodes
}

async fn assert_drained(cluster: &Cluster) {
    for node in &cluster.nodes {
        eventually("stores and streams to drain", move || async move {
            node.waves().is_empty() && node.controller.streams().outbound_streams().is_empty()
        })
        .await;
    }
}

#[tokio::test]
async fn fan_out_aggregates_every_branch() {
    let cluster = Cluster::start(&[("init", &["a", "b"]), ("a", &[]), ("b", &[])]).await;
    let init = cluster.node("init");

    let wave = init.controller.initiate(command(KIND)).await.unwrap();
    let (done, feedback) = init.next_result().await;

    assert_eq!(done.id(), wave.id());
    assert_eq!(feedback.len(), 1);
    let result = payload(&feedback[0]);
    assert_eq!(result["node"], "init");
    assert_eq!(child_nodes(&result), vec!["a", "b"]);
    assert_drained(&cluster).await;
    assert!(init.controller.active_waves().is_empty());
}

#[tokio::test]
async fn chain_nests_results() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &["b"]), ("b", &[])]).await;
    let init = cluster.node("init");

    init.controller.initiate(command(KIND)).await.unwrap();
    let (_, feedback) = init.next_result().await;

    similar_asserts::assert_eq!(
        payload(&feedback[0]),
        json!({
            "node": "init",
            "children": [{
                "node": "a",
                "children": [{ "node": "b", "children": [] }]
            }]
        })
    );
    assert_drained(&cluster).await;
}

#[tokio::test]
async fn cycle_back_to_initiator_gets_existent_echo() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &["init"])]).await;
    let init = cluster.node("init");

    init.controller.initiate(command(KIND)).await.unwrap();
    let (_, feedback) = init.next_result().await;

    similar_asserts::assert_eq!(
        payload(&feedback[0]),
        json!({
            "node": "init",
            "children": [{
                "node": "a",
                "children": [{ "node": "init", "existent": true }]
            }]
        })
    );
    assert_eq!(
        init.processor
            .count(|c| matches!(c, ProcessorCall::Existent { .. })),
        1
    );
    assert_drained(&cluster).await;
}

#[tokio::test]
async fn diamond_visits_shared_node_once_per_arrival() {
    let cluster = Cluster::start(&[
        ("init", &["a", "b"]),
        ("a", &["c"]),
        ("b", &["c"]),
        ("c", &[]),
    ])
    .await;
    let init = cluster.node("init");

    init.controller.initiate(command(KIND)).await.unwrap();
    let (_, feedback) = init.next_result().await;

    let result = payload(&feedback[0]);
    assert_eq!(child_nodes(&result), vec!["a", "b"]);
    for branch in result["children"].as_array().unwrap() {
        assert_eq!(child_nodes(branch), vec!["c"]);
    }
    assert_eq!(cluster.waves_delivered_to("c").len(), 2);
    assert_drained(&cluster).await;
}

#[tokio::test]
async fn concurrent_waves_complete_independently() {
    let cluster = Cluster::start(&[("init", &["a"]), ("a", &[])]).await;
    let init = cluster.node("init");

    let first = init.controller.initiate(command(KIND)).await.unwrap();
    let second = init.controller.initiate(command(KIND)).await.unwrap();
    assert_ne!(first.id(), second.id());

    let mut done = vec![
        init.next_result().await.0.id().clone(),
        init.next_result().await.0.id().clone(),
    ];
    done.sort();
    let mut expected = vec![first.id().clone(), second.id().clone()];
    expected.sort();
    assert_eq!(done, expected);
    assert_drained(&cluster).await;
}
