// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry of transient failures with a fixed backoff

use crate::config::ControllerConfig;
use crate::error::WaveError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wv_core::Classify;
use wv_storage::{Replicator, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &ControllerConfig) -> Self {
        Self {
            backoff: config.retry_backoff(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, runs out of
/// attempts or `cancel` fires.
pub(crate) async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    what: &'static str,
    mut op: F,
) -> Result<T, WaveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaveError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(WaveError::Canceled);
        }
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.class().is_transient() => {
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    warn!(what, attempt, error = %e, "giving up after transient failures");
                    return Err(e);
                }
                debug!(what, attempt, error = %e, "transient failure, retrying");
                sleep_or_cancel(policy.backoff, cancel).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), WaveError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(WaveError::Canceled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

pub(crate) async fn begin(
    replicator: &Replicator,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Transaction, WaveError> {
    retry_transient(policy, cancel, "create transaction", move || async move {
        replicator.create_transaction().map_err(WaveError::from)
    })
    .await
}

/// Commit `txn`. A transient commit failure leaves the transaction active,
/// so the same transaction is retried.
pub(crate) async fn commit(
    txn: &Transaction,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(), WaveError> {
    retry_transient(policy, cancel, "commit", move || async move {
        txn.commit().map_err(WaveError::from)
    })
    .await
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
