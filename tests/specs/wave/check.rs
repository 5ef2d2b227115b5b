//! `wv check` specs

use crate::prelude::*;

#[test]
fn check_describes_the_topology() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    temp.wv()
        .args(&["check", "-t", "topology.toml"])
        .passes()
        .stdout_eq(
            "topology ok: 3 nodes\n  \
             init [fabric:/wv#named:init] -> a, b\n  \
             a [fabric:/wv#named:a] -> (leaf)\n  \
             b [fabric:/wv#named:b] -> (leaf)\n",
        );
}

#[test]
fn check_json_lists_links() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    let run = temp
        .wv()
        .args(&["check", "-t", "topology.toml", "-o", "json"])
        .passes();
    let value = run.json();
    assert_eq!(value["nodes"][0]["name"], "init");
    assert_eq!(value["nodes"][0]["links"], serde_json::json!(["a", "b"]));
}
