// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage errors

use crate::txn::TxnId;
use crate::wal::WalError;
use std::time::Duration;
use thiserror::Error;
use wv_core::{AccessStatus, Classify, ErrorClass, WaveId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("replica is not primary")]
    NotPrimary,
    #[error("write access unavailable ({0:?})")]
    WriteUnavailable(AccessStatus),
    #[error("timed out after {timeout:?} waiting for lock on {key}")]
    LockTimeout { key: String, timeout: Duration },
    #[error("transaction {0} is no longer active")]
    TransactionClosed(TxnId),
    #[error("wave {0} already exists")]
    AlreadyExists(WaveId),
    #[error("wave {0} not found")]
    NotFound(WaveId),
    #[error("cannot persist wave {0} in the invalid state")]
    InvalidState(WaveId),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            StoreError::NotPrimary => ErrorClass::NotPrimary,
            StoreError::WriteUnavailable(_) | StoreError::LockTimeout { .. } => {
                ErrorClass::Transient
            }
            StoreError::TransactionClosed(_) => ErrorClass::Closed,
            StoreError::AlreadyExists(_)
            | StoreError::NotFound(_)
            | StoreError::InvalidState(_) => ErrorClass::Invariant,
            StoreError::Wal(_) => ErrorClass::Other,
        }
    }
}
