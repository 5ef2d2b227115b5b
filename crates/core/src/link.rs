// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Links: addresses of the partitions a wave travels between

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a partition is addressed within its service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionAddress {
    Singleton,
    Named { name: String },
    Numbered { low: i64, high: i64 },
}

impl PartitionAddress {
    pub fn kind(&self) -> &'static str {
        match self {
            PartitionAddress::Singleton => "singleton",
            PartitionAddress::Named { .. } => "named",
            PartitionAddress::Numbered { .. } => "numbered",
        }
    }
}

impl fmt::Display for PartitionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionAddress::Singleton => f.write_str("singleton"),
            PartitionAddress::Named { name } => write!(f, "named:{name}"),
            PartitionAddress::Numbered { low, high } => write!(f, "numbered:{low}..{high}"),
        }
    }
}

/// A directed edge endpoint: the service plus the partition within it.
///
/// Equality is structural. Two links are the same target when they agree
/// on service, partition kind and the kind-specific identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub service: String,
    pub partition: PartitionAddress,
}

impl Link {
    pub fn singleton(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            partition: PartitionAddress::Singleton,
        }
    }

    pub fn named(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            partition: PartitionAddress::Named { name: name.into() },
        }
    }

    pub fn numbered(service: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            service: service.into(),
            partition: PartitionAddress::Numbered { low, high },
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service, self.partition)
    }
}

/// Compare two optional links.
///
/// Absent/absent are equal; absent/present never are.
pub fn same_target(a: Option<&Link>, b: Option<&Link>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Deduplicate `links` preserving first-seen order and drop any link equal
/// to `exclude`.
pub fn distinct_links<I>(links: I, exclude: &Link) -> Vec<Link>
where
    I: IntoIterator<Item = Link>,
{
    let mut out: Vec<Link> = Vec::new();
    for link in links {
        if &link == exclude || out.contains(&link) {
            continue;
        }
        out.push(link);
    }
    out
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
