// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Replicated state for the wave controller: transactions, the wave store
//! and its write-ahead log

mod config;
mod error;
mod replicator;
mod store;
mod txn;
mod wal;

pub use config::StoreConfig;
pub use error::StoreError;
pub use replicator::Replicator;
pub use store::{StoreOp, StoreRecord, WaveStore};
pub use txn::{CommitHook, Transaction, TxnId, TxnParticipant, TxnStatus};
pub use wal::{Wal, WalEntry, WalError};
