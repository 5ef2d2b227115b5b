// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactions.
//!
//! A transaction collects participants (stores, streams) that stage work
//! under its id. `commit` first asks every participant to make its work
//! durable, then applies it everywhere, releases the key locks held by the
//! transaction, and finally runs the post-commit hooks in registration
//! order. Participants hear about the release on abort as well. Dropping an
//! active transaction aborts it.

use crate::error::StoreError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};
use wv_core::{AccessStatus, Partition, ReplicaRole};

pub type TxnId = u64;

/// Work run once the transaction has durably committed.
pub type CommitHook = Box<dyn FnOnce() + Send + 'static>;

/// Something that stages work under a transaction id.
pub trait TxnParticipant: Send + Sync + 'static {
    /// Make staged work durable. Runs before any participant commits.
    fn prepare(&self, _txn: TxnId) -> Result<(), StoreError> {
        Ok(())
    }

    /// Make staged work visible.
    fn commit(&self, txn: TxnId);

    /// Discard staged work.
    fn abort(&self, txn: TxnId);

    /// The transaction ended and its key locks are released.
    fn released(&self, _txn: TxnId) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

struct TxnState {
    status: TxnStatus,
    participants: Vec<(String, Arc<dyn TxnParticipant>)>,
    hooks: Vec<CommitHook>,
    locks: HashMap<String, OwnedMutexGuard<()>>,
}

pub struct Transaction {
    id: TxnId,
    partition: Arc<dyn Partition>,
    state: Mutex<TxnState>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(id: TxnId, partition: Arc<dyn Partition>) -> Self {
        Self {
            id,
            partition,
            state: Mutex::new(TxnState {
                status: TxnStatus::Active,
                participants: Vec::new(),
                hooks: Vec::new(),
                locks: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn status(&self) -> TxnStatus {
        self.state.lock().status
    }

    pub fn ensure_active(&self) -> Result<(), StoreError> {
        match self.status() {
            TxnStatus::Active => Ok(()),
            _ => Err(StoreError::TransactionClosed(self.id)),
        }
    }

    /// Register a participant under `key`. Registering the same key twice
    /// is a no-op.
    pub fn enlist(&self, key: &str, participant: Arc<dyn TxnParticipant>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.status != TxnStatus::Active {
            return Err(StoreError::TransactionClosed(self.id));
        }
        if !state.participants.iter().any(|(k, _)| k == key) {
            state.participants.push((key.to_string(), participant));
        }
        Ok(())
    }

    /// Register work to run after a successful commit. Hooks never run if
    /// the transaction aborts.
    pub fn on_committed(&self, hook: CommitHook) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.status != TxnStatus::Active {
            return Err(StoreError::TransactionClosed(self.id));
        }
        state.hooks.push(hook);
        Ok(())
    }

    pub fn holds_lock(&self, key: &str) -> bool {
        self.state.lock().locks.contains_key(key)
    }

    /// Keep `guard` until the transaction ends.
    pub fn hold_lock(&self, key: String, guard: OwnedMutexGuard<()>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.status != TxnStatus::Active {
            return Err(StoreError::TransactionClosed(self.id));
        }
        state.locks.insert(key, guard);
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.partition.role() != ReplicaRole::Primary {
            return Err(StoreError::NotPrimary);
        }
        match self.partition.write_status() {
            AccessStatus::Granted => Ok(()),
            AccessStatus::NotPrimary => Err(StoreError::NotPrimary),
            status => Err(StoreError::WriteUnavailable(status)),
        }
    }

    /// Commit the transaction.
    ///
    /// When write access is unavailable the transaction stays active so the
    /// caller can retry the commit.
    pub fn commit(&self) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.check_writable()?;

        let participants: Vec<_> = self
            .state
            .lock()
            .participants
            .iter()
            .map(|(_, p)| Arc::clone(p))
            .collect();

        for participant in &participants {
            if let Err(e) = participant.prepare(self.id) {
                warn!(txn = self.id, error = %e, "transaction prepare failed, aborting");
                self.abort();
                return Err(e);
            }
        }

        let (guards, hooks) = {
            let mut state = self.state.lock();
            state.status = TxnStatus::Committed;
            for (_, participant) in state.participants.drain(..) {
                participant.commit(self.id);
            }
            (
                std::mem::take(&mut state.locks),
                std::mem::take(&mut state.hooks),
            )
        };
        drop(guards);
        for participant in &participants {
            participant.released(self.id);
        }

        debug!(
            txn = self.id,
            participants = participants.len(),
            hooks = hooks.len(),
            "transaction committed"
        );
        for hook in hooks {
            hook();
        }
        Ok(())
    }

    /// Abort the transaction, discarding staged work. No-op unless active.
    pub fn abort(&self) {
        let (participants, guards) = {
            let mut state = self.state.lock();
            if state.status != TxnStatus::Active {
                return;
            }
            state.status = TxnStatus::Aborted;
            state.hooks.clear();
            (
                std::mem::take(&mut state.participants),
                std::mem::take(&mut state.locks),
            )
        };
        for (_, participant) in &participants {
            participant.abort(self.id);
        }
        drop(guards);
        for (_, participant) in &participants {
            participant.released(self.id);
        }
        debug!(txn = self.id, "transaction aborted");
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
#[path = "txn_tests.rs"]
mod tests;
