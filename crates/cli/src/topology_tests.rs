// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

const FAN_OUT: &str = r#"
[controller]
poll_interval_ms = 10

[[node]]
name = "init"
partition = "p0"
links = ["a", "b"]

[[node]]
name = "a"
numbered = 3

[[node]]
name = "b"
service = "fabric:/other"
"#;

#[test]
fn parses_nodes_and_controller_settings() {
    let topology = Topology::parse(FAN_OUT).unwrap();

    assert_eq!(topology.controller.poll_interval_ms, 10);
    assert_eq!(
        topology.controller.processing_timeout_ms,
        ControllerConfig::default().processing_timeout_ms
    );
    assert_eq!(topology.nodes.len(), 3);
    let init = topology.node("init").unwrap();
    assert_eq!(
        topology.links_of(init),
        vec![
            Link::numbered(DEFAULT_SERVICE, 3, 3),
            Link::singleton("fabric:/other"),
        ]
    );
}

#[test]
fn partition_fields_choose_the_address() {
    let topology = Topology::parse(FAN_OUT).unwrap();
    let links: Vec<Link> = topology.nodes.iter().map(NodeSpec::link).collect();

    assert_eq!(links[0], Link::named(DEFAULT_SERVICE, "p0"));
    assert_eq!(links[1], Link::numbered(DEFAULT_SERVICE, 3, 3));
    assert_eq!(links[2], Link::singleton("fabric:/other"));
    assert_eq!(topology.name_of(&links[2]), Some("b"));
}

#[test]
fn store_log_directory_is_per_node() {
    let text = format!("[store]\nwal_dir = \"/tmp/wv\"\n{FAN_OUT}");
    let topology = Topology::parse(&text).unwrap();
    let init = topology.node("init").unwrap();

    assert_eq!(
        topology.store_for(init).wal_dir,
        Some(PathBuf::from("/tmp/wv/init"))
    );
}

#[parameterized(
    empty = { "", "no nodes" },
    duplicate = { "[[node]]\nname = \"a\"\n[[node]]\nname = \"a\"\npartition = \"x\"", "declared twice" },
    ambiguous = { "[[node]]\nname = \"a\"\npartition = \"x\"\nnumbered = 1", "both partition and numbered" },
    shared = { "[[node]]\nname = \"a\"\n[[node]]\nname = \"b\"", "same partition" },
    unknown_link = { "[[node]]\nname = \"a\"\nlinks = [\"zz\"]", "unknown node 'zz'" },
    unknown_field = { "[[node]]\nname = \"a\"\ncolour = \"red\"", "unknown field" },
)]
fn invalid_topologies_are_rejected(text: &str, expected: &str) {
    let err = Topology::parse(text).unwrap_err().to_string();
    assert!(err.contains(expected), "unexpected error: {err}");
}

#[test]
fn missing_file_names_the_path() {
    let err = Topology::load(Path::new("/nonexistent/topology.toml")).unwrap_err();
    assert!(matches!(err, TopologyError::Read { .. }));
    assert!(err.to_string().contains("/nonexistent/topology.toml"));
}
