// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::processor::WaveResult;
use wv_core::{Link, Wave, WaveCommand, WaveFeedback, WaveId};

fn report() -> RunReport {
    RunReport {
        result: WaveResult {
            wave: Wave::initiator(
                WaveId::new("w-1"),
                WaveCommand::new("survey", json!({})),
                Link::singleton("fabric:/wv"),
            ),
            feedback: vec![WaveFeedback::data(json!({ "node": "init", "children": [] }))],
        },
        initiator: "init".into(),
        messages: 2,
    }
}

#[test]
fn text_starts_with_a_summary() {
    let out = format_report(&report(), OutputFormat::Text).unwrap();
    let mut lines = out.lines();
    assert_eq!(
        lines.next(),
        Some("wave w-1 completed at init (2 messages)")
    );
    assert!(out.contains("\"node\": \"init\""));
}

#[test]
fn json_is_one_parseable_object() {
    let out = format_report(&report(), OutputFormat::Json).unwrap();
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value,
        json!({
            "wave_id": "w-1",
            "initiator": "init",
            "messages": 2,
            "feedback": [{ "node": "init", "children": [] }],
        })
    );
}
