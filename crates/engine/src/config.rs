// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller tuning

use serde::Deserialize;
use std::time::Duration;

/// Default name of the replicated store holding wave records
pub const DEFAULT_STORE_NAME: &str = "wavestore";

/// Timing and retry knobs for a [`WaveController`](crate::WaveController).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Name of the replicated store for wave records
    pub store_name: String,
    /// How long to wait for the registry to resolve a processor
    pub processing_timeout_ms: u64,
    /// Poll period while waiting for a processor or for write access
    pub poll_interval_ms: u64,
    /// Pause between retries of a transient failure
    pub retry_backoff_ms: u64,
    /// Give up after this many attempts. `None` retries until canceled.
    pub max_attempts: Option<u32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            processing_timeout_ms: 256_000,
            poll_interval_ms: 100,
            retry_backoff_ms: 100,
            max_attempts: None,
        }
    }
}

impl ControllerConfig {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
