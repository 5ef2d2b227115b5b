// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica lifecycle hooks

use super::WaveController;
use crate::error::WaveError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wv_adapters::StreamManager;
use wv_core::{ErrorClass, ReplicaRole};

/// Lifecycle the hosting replica drives a state provider through.
#[async_trait]
pub trait StateProvider: Send + Sync + 'static {
    async fn open(&self) -> Result<(), WaveError>;

    /// Becoming primary starts recovery in the background; any other role
    /// stops primary processing and waits for it to wind down.
    async fn change_role(&self, role: ReplicaRole) -> Result<(), WaveError>;

    async fn close(&self) -> Result<(), WaveError>;

    async fn abort(&self);

    async fn prepare_checkpoint(&self, checkpoint: u64) -> Result<(), WaveError>;

    async fn perform_checkpoint(&self) -> Result<(), WaveError>;

    async fn complete_checkpoint(&self) -> Result<(), WaveError>;

    /// Returns whether state was changed to recover from the loss.
    async fn on_data_loss(&self) -> Result<bool, WaveError>;

    async fn on_recovery_completed(&self) -> Result<(), WaveError>;

    async fn prepare_for_remove(&self) -> Result<(), WaveError>;
}

impl<M: StreamManager> WaveController<M> {
    async fn start_primary(&self) {
        self.stop_tenure().await;
        self.inner.gate.arm();
        let cancel = CancellationToken::new();
        self.inner.tenure.lock().cancel = cancel.clone();
        let handle = tokio::spawn(self.clone().run_primary(cancel));
        self.inner.tenure.lock().recovery = Some(handle);
    }

    async fn stop_primary(&self) {
        self.stop_tenure().await;
        self.inner.gate.fail(ErrorClass::NotPrimary);
        *self.inner.store.lock() = None;
        self.inner.active.lock().clear();
    }

    /// Cancel the current tenure and wait for its recovery task.
    async fn stop_tenure(&self) {
        let (cancel, recovery) = {
            let mut tenure = self.inner.tenure.lock();
            (tenure.cancel.clone(), tenure.recovery.take())
        };
        cancel.cancel();
        if let Some(handle) = recovery {
            if let Err(e) = handle.await {
                warn!(error = %e, "recovery task failed");
            }
        }
    }
}

#[async_trait]
impl<M: StreamManager> StateProvider for WaveController<M> {
    async fn open(&self) -> Result<(), WaveError> {
        debug!(node = %self.self_link(), "wave controller opened");
        Ok(())
    }

    async fn change_role(&self, role: ReplicaRole) -> Result<(), WaveError> {
        info!(node = %self.self_link(), ?role, "role change");
        match role {
            ReplicaRole::Primary => self.start_primary().await,
            _ => self.stop_primary().await,
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), WaveError> {
        self.stop_primary().await;
        debug!(node = %self.self_link(), "wave controller closed");
        Ok(())
    }

    async fn abort(&self) {
        self.stop_primary().await;
    }

    // Wave records are durable through the store log; checkpoints are no-ops.
    async fn prepare_checkpoint(&self, _checkpoint: u64) -> Result<(), WaveError> {
        Ok(())
    }

    async fn perform_checkpoint(&self) -> Result<(), WaveError> {
        Ok(())
    }

    async fn complete_checkpoint(&self) -> Result<(), WaveError> {
        Ok(())
    }

    async fn on_data_loss(&self) -> Result<bool, WaveError> {
        warn!(node = %self.self_link(), "data loss reported, keeping state");
        Ok(false)
    }

    async fn on_recovery_completed(&self) -> Result<(), WaveError> {
        Ok(())
    }

    async fn prepare_for_remove(&self) -> Result<(), WaveError> {
        Err(WaveError::Unsupported)
    }
}
