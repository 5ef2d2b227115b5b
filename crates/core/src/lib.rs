// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wv-core: wave records, links and wire messages

pub mod error;
pub mod feedback;
pub mod id;
pub mod link;
pub mod message;
pub mod partition;
pub mod stream_name;
pub mod wave;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{Classify, ErrorClass};
pub use feedback::{FeedbackOutcome, WaveFeedback};
pub use id::{IdGen, SequentialIdGen, UuidIdGen, WaveId};
pub use link::{distinct_links, same_target, Link, PartitionAddress};
pub use message::{CodecError, WaveEnvelope, WaveMessage};
pub use partition::{AccessStatus, FaultType, LocalPartition, Partition, ReplicaRole};
pub use stream_name::{StreamKind, StreamName, WaveStreamName, WAVE_STREAM_PREFIX, WAVE_STREAM_SCHEME};
pub use wave::{OutboundLink, Wave, WaveCommand, WaveRecordError, WaveState};
