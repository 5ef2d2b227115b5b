// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primary readiness gate.
//!
//! Public operations and inbound stream acceptance wait here until primary
//! processing has finished recovery. The gate is re-armed on every
//! promotion and failed on demotion, so waiters never block on a replica
//! that will not become ready.

use crate::error::WaveError;
use tokio::sync::watch;
use wv_core::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Recovery is running
    Pending,
    Ready,
    /// Not primary, or recovery failed with the given class
    Failed(ErrorClass),
}

pub(crate) struct PrimaryGate {
    tx: watch::Sender<GateState>,
}

impl PrimaryGate {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(GateState::Failed(ErrorClass::NotPrimary));
        Self { tx }
    }

    pub(crate) fn state(&self) -> GateState {
        *self.tx.borrow()
    }

    pub(crate) fn arm(&self) {
        self.tx.send_replace(GateState::Pending);
    }

    pub(crate) fn open(&self) {
        self.tx.send_replace(GateState::Ready);
    }

    pub(crate) fn fail(&self, class: ErrorClass) {
        self.tx.send_replace(GateState::Failed(class));
    }

    /// Wait while recovery is pending, then report the outcome.
    pub(crate) async fn wait(&self) -> Result<(), WaveError> {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(|s| *s != GateState::Pending).await {
            Ok(state) => *state,
            Err(_) => return Err(WaveError::Canceled),
        };
        match state {
            GateState::Ready => Ok(()),
            GateState::Failed(ErrorClass::NotPrimary) => Err(WaveError::NotPrimary),
            GateState::Failed(ErrorClass::Canceled) => Err(WaveError::Canceled),
            GateState::Failed(class) => Err(WaveError::PrimaryFailed(class)),
            GateState::Pending => Err(WaveError::invariant("gate still pending")),
        }
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
