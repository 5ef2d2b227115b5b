// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Stream transport adapters

pub mod stream;
pub mod traced;

pub use stream::{
    Delivery, InboundStreamCallback, LocalNetwork, LocalStream, LocalStreamManager, MessageStream,
    StreamDirection, StreamError, StreamManager, StreamState,
};
pub use traced::{TracedStream, TracedStreamManager};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use stream::{CallbackCall, RecordingCallback};
