// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain processor contracts.
//!
//! The controller moves waves and echoes; what a wave *means* is up to a
//! [`WaveProcessor`] resolved per wave. Every hook that receives a
//! transaction runs inside the controller's transaction for that step, so
//! a processor's own replicated writes commit or abort with it.

use crate::error::ProcessorError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wv_core::{Link, Wave, WaveFeedback};
use wv_storage::Transaction;

#[async_trait]
pub trait WaveProcessor: Send + Sync + 'static {
    /// First sight of a wave at this node. Returns the next hops; an empty
    /// list makes this node a leaf for the wave.
    async fn on_wave_started(
        &self,
        txn: &Transaction,
        wave: &Wave,
        sender: &Link,
    ) -> Result<Vec<Link>, ProcessorError>;

    /// The wave arrived again from `sender` after this node already has it.
    async fn on_wave_existent_echo(
        &self,
        txn: &Transaction,
        wave: &Wave,
        sender: &Link,
    ) -> Result<Vec<WaveFeedback>, ProcessorError>;

    /// Every next hop has echoed (or this node is a leaf). Returns the
    /// feedback to send upstream.
    async fn on_wave_completed_echo(
        &self,
        txn: &Transaction,
        wave: &Wave,
    ) -> Result<Vec<WaveFeedback>, ProcessorError>;

    /// One feedback message from the next hop `sender`.
    async fn on_echo(
        &self,
        txn: &Transaction,
        wave: &Wave,
        sender: &Link,
        feedback: &WaveFeedback,
    ) -> Result<(), ProcessorError>;
}

/// Receives the aggregated result at the initiating node, after the
/// completing transaction has committed.
#[async_trait]
pub trait WaveResultProcessor: Send + Sync + 'static {
    async fn on_wave_result(
        &self,
        wave: &Wave,
        feedback: Vec<WaveFeedback>,
        cancel: CancellationToken,
    ) -> Result<(), ProcessorError>;
}

/// Maps a wave to its processor. `None` means "not yet"; the controller
/// polls until its processing timeout.
pub trait ProcessorRegistry: Send + Sync + 'static {
    fn resolve(&self, wave: &Wave) -> Option<Arc<dyn WaveProcessor>>;
}

/// Registry keyed by the wave command's `kind`.
#[derive(Clone, Default)]
pub struct KindRegistry {
    processors: Arc<RwLock<HashMap<String, Arc<dyn WaveProcessor>>>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the processor for `kind`.
    pub fn register(&self, kind: impl Into<String>, processor: Arc<dyn WaveProcessor>) {
        self.processors.write().insert(kind.into(), processor);
    }
}

impl ProcessorRegistry for KindRegistry {
    fn resolve(&self, wave: &Wave) -> Option<Arc<dyn WaveProcessor>> {
        self.processors.read().get(&wave.command().kind).cloned()
    }
}
