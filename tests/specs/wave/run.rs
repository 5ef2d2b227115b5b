//! `wv run` specs
//!
//! A survey wave reports every node it reached, nested by the path it took.

use crate::prelude::*;
use serde_json::json;

#[test]
fn fan_out_result_lists_both_leaves() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    let run = temp
        .wv()
        .args(&["run", "-t", "topology.toml", "-o", "json"])
        .passes();

    let value = run.json();
    assert_eq!(value["initiator"], "init");
    assert_eq!(value["messages"], 4);
    let feedback = value["feedback"].as_array().unwrap();
    assert_eq!(feedback.len(), 1);
    let mut children: Vec<&str> = feedback[0]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["node"].as_str().unwrap())
        .collect();
    children.sort();
    assert_eq!(children, vec!["a", "b"]);
}

#[test]
fn chain_result_is_nested() {
    let temp = Project::empty();
    temp.topology(
        r#"
[[node]]
name = "init"
partition = "init"
links = ["mid"]

[[node]]
name = "mid"
numbered = 1
links = ["tail"]

[[node]]
name = "tail"
service = "fabric:/tail"
"#,
    );
    let run = temp
        .wv()
        .args(&["run", "-t", "topology.toml", "-o", "json"])
        .passes();

    similar_asserts::assert_eq!(
        run.json()["feedback"],
        json!([{
            "node": "init",
            "children": [{
                "node": "mid",
                "children": [{ "node": "tail", "children": [] }]
            }]
        }])
    );
}

#[test]
fn cycle_reports_the_revisited_node() {
    let temp = Project::empty();
    temp.topology(
        r#"
[[node]]
name = "x"
partition = "x"
links = ["y"]

[[node]]
name = "y"
partition = "y"
links = ["x"]
"#,
    );
    temp.wv()
        .args(&["run", "-t", "topology.toml"])
        .passes()
        .stdout_has("completed at x (4 messages)")
        .stdout_has("\"seen\": true");
}

#[test]
fn from_picks_the_initiator() {
    let temp = Project::empty();
    temp.topology(
        r#"
[[node]]
name = "a"
partition = "a"

[[node]]
name = "b"
partition = "b"
links = ["a"]
"#,
    );
    temp.wv()
        .args(&["run", "-t", "topology.toml", "--from", "b"])
        .passes()
        .stdout_has("completed at b (2 messages)");
}

#[test]
fn log_file_receives_controller_logs() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    temp.wv()
        .args(&["run", "-t", "topology.toml", "--log-file", "logs/wv.log"])
        .passes();

    let found = log_contains(&temp.path().join("logs/wv.log"), "primary processing ready");
    assert!(found, "log file should mention primary processing");
}

fn log_contains(path: &std::path::Path, needle: &str) -> bool {
    std::fs::read_to_string(path)
        .map(|logs| logs.contains(needle))
        .unwrap_or(false)
}

#[test]
fn node_named_by_fail_at_reports_a_fault() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    let run = temp
        .wv()
        .args(&[
            "run",
            "-t",
            "topology.toml",
            "-b",
            r#"{"fail_at":"b"}"#,
            "-o",
            "json",
        ])
        .passes();

    let value = run.json();
    let children = value["feedback"][0]["children"].as_array().unwrap();
    let faults: Vec<&str> = children
        .iter()
        .filter_map(|c| c["fault"].as_str())
        .collect();
    assert_eq!(faults, vec!["survey failed at b"]);
}
