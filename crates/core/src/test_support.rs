// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Link, WaveCommand, WaveEnvelope, WaveId};

/// Service name used by every test link.
pub const TEST_SERVICE: &str = "fabric:/test";

/// Named partition link in the test service.
pub fn link(name: &str) -> Link {
    Link::named(TEST_SERVICE, name)
}

pub fn command(kind: &str) -> WaveCommand {
    WaveCommand::new(kind, serde_json::json!({ "test": true }))
}

pub fn envelope(id: &str, kind: &str) -> WaveEnvelope {
    WaveEnvelope {
        id: WaveId::new(id),
        command: command(kind),
    }
}
