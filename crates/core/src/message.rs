// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire payloads exchanged on wave streams

use crate::error::{Classify, ErrorClass};
use crate::feedback::WaveFeedback;
use crate::id::WaveId;
use crate::wave::WaveCommand;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stripped wave that crosses the wire: identity and command only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveEnvelope {
    pub id: WaveId,
    pub command: WaveCommand,
}

/// A single message on a wave stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaveMessage {
    Wave(WaveEnvelope),
    Feedback(WaveFeedback),
}

#[derive(Debug, Error)]
#[error("malformed wave message: {0}")]
pub struct CodecError(#[from] serde_json::Error);

impl Classify for CodecError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Invariant
    }
}

impl WaveMessage {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WaveMessage::Wave(_) => "wave",
            WaveMessage::Feedback(_) => "feedback",
        }
    }
}

impl From<WaveEnvelope> for WaveMessage {
    fn from(envelope: WaveEnvelope) -> Self {
        WaveMessage::Wave(envelope)
    }
}

impl From<WaveFeedback> for WaveMessage {
    fn from(feedback: WaveFeedback) -> Self {
        WaveMessage::Feedback(feedback)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
