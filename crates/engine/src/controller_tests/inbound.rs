// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::{json, Value};
use wv_core::{FaultType, WaveState};

#[tokio::test]
async fn leaf_echoes_completion_on_paired_stream() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave(&b.link, "w-1", "d1").await;
    let items = up.receive_feedback(&feedback_name("w-1", "d1")).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].wave_id, Some(WaveId::new("w-1")));
    assert_eq!(payload(&items[0]), json!({ "node": "b", "children": [] }));
    assert!(b.waves().is_empty(), "a leaf stores nothing");
    assert_eq!(
        b.processor.calls(),
        vec![
            ProcessorCall::Started {
                wave: WaveId::new("w-1"),
                sender: up.link.clone(),
            },
            ProcessorCall::Completed {
                wave: WaveId::new("w-1"),
            },
        ]
    );

    let streams = b.controller.streams().clone();
    eventually("leaf streams to be deleted", || {
        let streams = streams.clone();
        async move { streams.outbound_streams().is_empty() && streams.inbound_streams().is_empty() }
    })
    .await;
}

#[tokio::test]
async fn non_leaf_stores_wave_and_forwards() {
    // Nothing listens at "c", so the wave waits there.
    let cluster = Cluster::start(&[("b", &["c"])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave(&b.link, "w-1", "d1").await;
    eventually("wave to be started", move || async move {
        b.waves()
            .first()
            .is_some_and(|w| w.state() == WaveState::Started)
    })
    .await;

    let wave = b.waves().remove(0);
    assert!(!wave.is_initiator());
    assert_eq!(wave.inbound_link(), Some(&up.link));
    assert_eq!(
        wave.outbound_feedback_stream(),
        Some(&feedback_name("w-1", "d1"))
    );
    assert_eq!(wave.pending_links().cloned().collect::<Vec<_>>(), vec![link("c")]);
    assert_eq!(cluster.waves_delivered_to("c"), vec![WaveId::new("w-1")]);
    assert!(cluster.feedback_delivered_to("up").is_empty());
}

#[tokio::test]
async fn duplicate_delivery_gets_deterministic_existent_echo() {
    let cluster = Cluster::start(&[("b", &["c"])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave(&b.link, "w-1", "d1").await;
    eventually("wave to be stored", move || async move { !b.waves().is_empty() }).await;

    up.send_wave(&b.link, "w-1", "d2").await;
    let first = up.receive_feedback(&feedback_name("w-1", "d2")).await;
    up.send_wave(&b.link, "w-1", "d3").await;
    let second = up.receive_feedback(&feedback_name("w-1", "d3")).await;

    assert_eq!(first, second);
    assert_eq!(payload(&first[0]), json!({ "node": "b", "existent": true }));
    assert_eq!(
        b.processor
            .count(|c| matches!(c, ProcessorCall::Started { .. })),
        1
    );
    assert_eq!(
        b.processor
            .count(|c| matches!(c, ProcessorCall::Existent { .. })),
        2
    );
    // Still forwarded exactly once.
    assert_eq!(cluster.waves_delivered_to("c"), vec![WaveId::new("w-1")]);
}

#[tokio::test]
async fn aggregate_waits_for_every_next_hop() {
    let cluster = Cluster::start(&[("b", &["c", "d"]), ("c", &[]), ("d", &[])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave(&b.link, "w-1", "d1").await;
    let items = up.receive_feedback(&feedback_name("w-1", "d1")).await;

    assert_eq!(items.len(), 1);
    let aggregate = payload(&items[0]);
    assert_eq!(aggregate["node"], "b");
    let mut children: Vec<String> = aggregate["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["node"].as_str().unwrap().to_string())
        .collect();
    children.sort();
    assert_eq!(children, vec!["c", "d"]);

    // Each echo is attributed to the hop whose stream carried it.
    let echoes: Vec<(Link, Value)> = b
        .processor
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProcessorCall::Echo {
                sender, feedback, ..
            } => Some((sender, payload(&feedback))),
            _ => None,
        })
        .collect();
    assert_eq!(echoes.len(), 2);
    for (sender, echoed) in &echoes {
        assert_eq!(link(echoed["node"].as_str().unwrap()), *sender);
    }

    assert_eq!(
        b.processor
            .count(|c| matches!(c, ProcessorCall::Completed { .. })),
        1
    );
    eventually("wave to be removed", move || async move { b.waves().is_empty() }).await;
}

#[tokio::test]
async fn transient_failure_retries_the_whole_pass() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let b = cluster.node("b");
    b.processor.fail_started(2);
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave(&b.link, "w-1", "d1").await;
    let items = up.receive_feedback(&feedback_name("w-1", "d1")).await;

    assert_eq!(items.len(), 1);
    assert_eq!(
        b.processor
            .count(|c| matches!(c, ProcessorCall::Started { .. })),
        3
    );
    assert_eq!(cluster.feedback_delivered_to("up").len(), 1);
}

#[tokio::test]
async fn empty_completion_feedback_is_sent_as_ack() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let b = cluster.node("b");
    b.registry.register("silent", std::sync::Arc::new(SilentProcessor));
    let up = RawNode::new(&cluster.network, "up");

    up.send_wave_of_kind(&b.link, "w-1", "d1", "silent").await;
    let items = up.receive_feedback(&feedback_name("w-1", "d1")).await;

    assert_eq!(items.len(), 1);
    assert!(items[0].is_ack());
    assert_eq!(items[0].wave_id, Some(WaveId::new("w-1")));
}

#[tokio::test]
async fn empty_feedback_stream_is_not_an_echo() {
    let cluster = Cluster::start(&[("b", &["c", "e"])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");
    let c = RawNode::new(&cluster.network, "c");

    up.send_wave(&b.link, "w-1", "d1").await;
    eventually("wave to be stored", move || async move { !b.waves().is_empty() }).await;

    // "c" closes its feedback stream without sending anything.
    let name = feedback_name("w-1", "x1");
    c.send(&b.link, &name, vec![]).await;
    let streams = b.controller.streams().clone();
    eventually("empty feedback stream to be deleted", || {
        let streams = streams.clone();
        let name = name.clone();
        async move { streams.inbound_streams().iter().all(|s| s.name() != &name) }
    })
    .await;

    let wave = b.waves().remove(0);
    assert_eq!(
        wave.pending_links().cloned().collect::<Vec<_>>(),
        vec![link("c"), link("e")]
    );
    assert!(b.partition.faults().is_empty());
    assert!(b
        .processor
        .calls()
        .iter()
        .all(|c| !matches!(c, ProcessorCall::Echo { .. } | ProcessorCall::Completed { .. })));
}

#[tokio::test]
async fn duplicate_echo_is_an_invariant_fault() {
    let cluster = Cluster::start(&[("b", &["c", "e"])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");
    let c = RawNode::new(&cluster.network, "c");

    up.send_wave(&b.link, "w-1", "d1").await;
    eventually("wave to be stored", move || async move { !b.waves().is_empty() }).await;

    let echo = || {
        vec![WaveMessage::Feedback(
            WaveFeedback::ack().with_wave_id(WaveId::new("w-1")),
        )]
    };
    c.send(&b.link, &feedback_name("w-1", "x1"), echo()).await;
    eventually("first echo to be recorded", move || async move {
        b.waves()
            .first()
            .is_some_and(|w| w.pending_links().count() == 1)
    })
    .await;
    c.send(&b.link, &feedback_name("w-1", "x2"), echo()).await;

    let partition = b.partition.clone();
    eventually("fault to be reported", || {
        let partition = partition.clone();
        async move { partition.faults().contains(&FaultType::Transient) }
    })
    .await;
    let wave = b.waves().remove(0);
    assert_eq!(wave.pending_links().cloned().collect::<Vec<_>>(), vec![link("e")]);
    assert!(b
        .processor
        .calls()
        .iter()
        .all(|c| !matches!(c, ProcessorCall::Completed { .. })));
}

#[tokio::test]
async fn foreign_streams_are_ignored() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let b = cluster.node("b");
    let up = RawNode::new(&cluster.network, "up");

    up.send(&b.link, &StreamName::new("otherstream:/x"), vec![]).await;
    let stream = b.controller.streams().inbound_streams().remove(0);
    b.controller.process_inbound_stream(stream).await;

    assert!(b.controller.streams().outbound_streams().is_empty());
    assert!(b.processor.calls().is_empty());
    assert!(b.partition.faults().is_empty());
}
