// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feedback echoed back toward the initiator

use crate::id::WaveId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Data(serde_json::Value),
    /// A failure captured at some node; travels back like any other result.
    Fault { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveFeedback {
    /// Empty until the controller stamps it on the way out.
    #[serde(default)]
    pub wave_id: Option<WaveId>,
    pub outcome: FeedbackOutcome,
}

impl WaveFeedback {
    pub fn data(value: serde_json::Value) -> Self {
        Self {
            wave_id: None,
            outcome: FeedbackOutcome::Data(value),
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            wave_id: None,
            outcome: FeedbackOutcome::Fault {
                message: message.into(),
            },
        }
    }

    /// Empty acknowledgement, sent when a node has nothing else to report.
    pub fn ack() -> Self {
        Self::data(serde_json::Value::Null)
    }

    pub fn with_wave_id(self, wave_id: WaveId) -> Self {
        Self {
            wave_id: Some(wave_id),
            ..self
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self.outcome, FeedbackOutcome::Fault { .. })
    }

    pub fn is_ack(&self) -> bool {
        matches!(&self.outcome, FeedbackOutcome::Data(v) if v.is_null())
    }
}
