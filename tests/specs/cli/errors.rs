//! CLI error handling specs
//!
//! Verify error messages for invalid topologies and arguments.

use crate::prelude::*;

#[test]
fn missing_topology_file_is_reported() {
    let temp = Project::empty();
    temp.wv()
        .args(&["check", "--topology", "missing.toml"])
        .fails()
        .stderr_has("Error: cannot read topology missing.toml");
}

#[test]
fn unknown_link_is_reported() {
    let temp = Project::empty();
    temp.topology("[[node]]\nname = \"a\"\nlinks = [\"ghost\"]\n");
    temp.wv()
        .args(&["check", "-t", "topology.toml"])
        .fails()
        .stderr_has("node 'a' links to unknown node 'ghost'");
}

#[test]
fn malformed_body_is_rejected() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    temp.wv()
        .args(&["run", "-t", "topology.toml", "--body", "{oops"])
        .fails()
        .stderr_has("body is not valid JSON");
}

#[test]
fn initiator_without_links_fails() {
    let temp = Project::empty();
    temp.topology("[[node]]\nname = \"solo\"\n");
    temp.wv()
        .args(&["run", "-t", "topology.toml"])
        .fails()
        .stderr_has("has no outbound links");
}

#[test]
fn unknown_initiator_fails() {
    let temp = Project::empty();
    temp.topology(FAN_OUT);
    temp.wv()
        .args(&["run", "-t", "topology.toml", "--from", "nobody"])
        .fails()
        .stderr_has("no node named 'nobody'");
}
