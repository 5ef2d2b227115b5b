// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Settings for the replicator and the stores it hands out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a transaction waits for a key lock before giving up with a
    /// transient error.
    pub lock_timeout_ms: u64,
    /// Directory for per-store write-ahead logs. `None` keeps state in memory.
    pub wal_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            wal_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn with_wal_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            wal_dir: Some(dir.into()),
            ..self
        }
    }
}
