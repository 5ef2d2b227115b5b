// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use wv_core::test_support::link;
use wv_core::{AccessStatus, ErrorClass, LocalPartition};
use wv_storage::{StoreConfig, StoreError, TxnStatus};

fn policy(max_attempts: Option<u32>) -> RetryPolicy {
    RetryPolicy {
        backoff: Duration::from_millis(1),
        max_attempts,
    }
}

fn transient() -> WaveError {
    WaveError::Store(StoreError::WriteUnavailable(AccessStatus::NoWriteQuorum))
}

#[tokio::test]
async fn retries_transient_until_success() {
    let calls = AtomicU32::new(0);
    let result = retry_transient(policy(None), &CancellationToken::new(), "test", || async {
        match calls.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => Err(transient()),
            n => Ok(n),
        }
    })
    .await;
    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_transient_fails_immediately() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> =
        retry_transient(policy(None), &CancellationToken::new(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WaveError::invariant("broken"))
        })
        .await;
    assert_eq!(result.unwrap_err().class(), ErrorClass::Invariant);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn max_attempts_surfaces_last_error() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> =
        retry_transient(policy(Some(3)), &CancellationToken::new(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;
    assert!(result.unwrap_err().class().is_transient());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancellation_stops_retrying() {
    let cancel = CancellationToken::new();
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = retry_transient(policy(None), &cancel, "test", || {
        if calls.fetch_add(1, Ordering::SeqCst) == 2 {
            cancel.cancel();
        }
        async { Err(transient()) }
    })
    .await;
    assert!(matches!(result, Err(WaveError::Canceled)));
}

#[tokio::test]
async fn commit_retries_same_transaction_until_quorum_returns() {
    let partition = LocalPartition::new(link("a"));
    partition.promote();
    let replicator = Replicator::new(Arc::new(partition.clone()), StoreConfig::default());
    let cancel = CancellationToken::new();
    let txn = begin(&replicator, policy(None), &cancel).await.unwrap();

    partition.set_write_status(AccessStatus::NoWriteQuorum);
    let restore = {
        let partition = partition.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            partition.set_write_status(AccessStatus::Granted);
        })
    };

    commit(&txn, policy(None), &cancel).await.unwrap();
    restore.await.unwrap();
    assert_eq!(txn.status(), TxnStatus::Committed);
}

#[tokio::test]
async fn begin_on_secondary_is_not_primary() {
    let partition = LocalPartition::new(link("a"));
    let replicator = Replicator::new(Arc::new(partition), StoreConfig::default());
    let err = begin(&replicator, policy(None), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotPrimary);
}
