// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML description of an in-process cluster.
//!
//! ```toml
//! [controller]
//! poll_interval_ms = 50
//!
//! [[node]]
//! name = "init"
//! partition = "p0"
//! links = ["a", "b"]
//! ```
//!
//! Each node is one partition. `partition = "<name>"` makes a named
//! partition, `numbered = <n>` a numbered one and leaving both out a
//! singleton. `links` name other nodes.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wv_core::Link;
use wv_engine::ControllerConfig;
use wv_storage::StoreConfig;

pub const DEFAULT_SERVICE: &str = "fabric:/wv";

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("cannot read topology {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid topology: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("topology has no nodes")]
    Empty,
    #[error("node '{0}' is declared twice")]
    DuplicateNode(String),
    #[error("node '{0}' sets both partition and numbered")]
    AmbiguousPartition(String),
    #[error("nodes '{0}' and '{1}' address the same partition")]
    SharedPartition(String, String),
    #[error("node '{node}' links to unknown node '{link}'")]
    UnknownLink { node: String, link: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Topology {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default = "default_service")]
    pub service: String,
    pub partition: Option<String>,
    pub numbered: Option<i64>,
    #[serde(default)]
    pub links: Vec<String>,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

impl NodeSpec {
    /// Address other nodes use to reach this one.
    pub fn link(&self) -> Link {
        match (&self.partition, self.numbered) {
            (Some(name), _) => Link::named(&self.service, name),
            (None, Some(n)) => Link::numbered(&self.service, n, n),
            (None, None) => Link::singleton(&self.service),
        }
    }
}

impl Topology {
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path).map_err(|source| TopologyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse and validate.
    pub fn parse(text: &str) -> Result<Self, TopologyError> {
        let topology: Topology = toml::from_str(text)?;
        topology.validate()?;
        Ok(topology)
    }

    fn validate(&self) -> Result<(), TopologyError> {
        if self.nodes.is_empty() {
            return Err(TopologyError::Empty);
        }
        let mut names = HashSet::new();
        let mut addresses: HashMap<Link, &str> = HashMap::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(TopologyError::DuplicateNode(node.name.clone()));
            }
            if node.partition.is_some() && node.numbered.is_some() {
                return Err(TopologyError::AmbiguousPartition(node.name.clone()));
            }
            if let Some(other) = addresses.insert(node.link(), &node.name) {
                return Err(TopologyError::SharedPartition(
                    other.to_string(),
                    node.name.clone(),
                ));
            }
        }
        for node in &self.nodes {
            if let Some(link) = node.links.iter().find(|l| !names.contains(l.as_str())) {
                return Err(TopologyError::UnknownLink {
                    node: node.name.clone(),
                    link: link.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Resolved next hops of `node`, in declaration order.
    pub fn links_of(&self, node: &NodeSpec) -> Vec<Link> {
        node.links
            .iter()
            .filter_map(|name| self.node(name))
            .map(NodeSpec::link)
            .collect()
    }

    /// Node name for a link, for display.
    pub fn name_of(&self, link: &Link) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| &n.link() == link)
            .map(|n| n.name.as_str())
    }

    /// Store settings for one node. Each node gets its own log directory.
    pub fn store_for(&self, node: &NodeSpec) -> StoreConfig {
        match &self.store.wal_dir {
            Some(dir) => self.store.clone().with_wal_dir(dir.join(&node.name)),
            None => self.store.clone(),
        }
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
