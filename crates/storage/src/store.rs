// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional wave store.
//!
//! Committed records live in a `BTreeMap` keyed by wave id. Each transaction
//! stages its writes in its own write set and reads its own writes. The
//! first access to a key inside a transaction takes that key's lock; the
//! lock is held until the transaction ends, which serializes all work on a
//! given wave.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::txn::{Transaction, TxnId, TxnParticipant};
use crate::wal::Wal;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wv_core::{Wave, WaveId, WaveState};

/// One committed transaction as written to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    pub txn: TxnId,
    pub ops: Vec<StoreOp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    Put { wave: Wave },
    Remove { id: WaveId },
}

type WriteSet = BTreeMap<WaveId, Option<Wave>>;

struct StoreInner {
    name: String,
    lock_timeout: Duration,
    committed: Mutex<BTreeMap<WaveId, Wave>>,
    write_sets: Mutex<HashMap<TxnId, WriteSet>>,
    locks: Mutex<HashMap<WaveId, Arc<tokio::sync::Mutex<()>>>>,
    wal: Option<Mutex<Wal<StoreRecord>>>,
}

#[derive(Clone)]
pub struct WaveStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for WaveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveStore")
            .field("name", &self.inner.name)
            .field("durable", &self.inner.wal.is_some())
            .finish()
    }
}

impl WaveStore {
    /// Open a store, replaying its log when a WAL directory is configured.
    pub(crate) fn open(name: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        let mut committed = BTreeMap::new();
        let wal = match &config.wal_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.wal", file_stem(name)));
                let wal: Wal<StoreRecord> = Wal::open(&path)?;
                let entries = wal.entries_after(0)?;
                for entry in &entries {
                    apply_ops(&mut committed, entry.record.ops.iter().cloned());
                }
                info!(
                    store = name,
                    entries = entries.len(),
                    waves = committed.len(),
                    "wave store replayed"
                );
                Some(Mutex::new(wal))
            }
            None => None,
        };

        Ok(Self {
            inner: Arc::new(StoreInner {
                name: name.to_string(),
                lock_timeout: config.lock_timeout(),
                committed: Mutex::new(committed),
                write_sets: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                wal,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub async fn get(&self, txn: &Transaction, id: &WaveId) -> Result<Option<Wave>, StoreError> {
        self.lock_key(txn, id).await?;
        Ok(self.read(txn.id(), id))
    }

    /// Insert a new wave. Fails if the id is already present.
    pub async fn add(&self, txn: &Transaction, wave: Wave) -> Result<(), StoreError> {
        check_persistable(&wave)?;
        self.lock_key(txn, wave.id()).await?;
        if self.read(txn.id(), wave.id()).is_some() {
            return Err(StoreError::AlreadyExists(wave.id().clone()));
        }
        self.stage(txn, wave.id().clone(), Some(wave))
    }

    /// Replace an existing wave. Fails if the id is absent.
    pub async fn update(&self, txn: &Transaction, wave: Wave) -> Result<(), StoreError> {
        check_persistable(&wave)?;
        self.lock_key(txn, wave.id()).await?;
        if self.read(txn.id(), wave.id()).is_none() {
            return Err(StoreError::NotFound(wave.id().clone()));
        }
        self.stage(txn, wave.id().clone(), Some(wave))
    }

    /// Remove a wave if present, returning the removed value.
    pub async fn try_remove(
        &self,
        txn: &Transaction,
        id: &WaveId,
    ) -> Result<Option<Wave>, StoreError> {
        self.lock_key(txn, id).await?;
        let existing = self.read(txn.id(), id);
        if existing.is_some() {
            self.stage(txn, id.clone(), None)?;
        }
        Ok(existing)
    }

    /// Snapshot of every wave visible to `txn`, in key order. Takes no locks.
    pub async fn enumerate(&self, txn: &Transaction) -> Result<Vec<Wave>, StoreError> {
        txn.ensure_active()?;
        let mut view = self.inner.committed.lock().clone();
        if let Some(writes) = self.inner.write_sets.lock().get(&txn.id()) {
            apply_writes(&mut view, writes.clone());
        }
        Ok(view.into_values().collect())
    }

    /// Committed waves, outside of any transaction.
    pub fn committed(&self) -> Vec<Wave> {
        self.inner.committed.lock().values().cloned().collect()
    }

    pub fn committed_wave(&self, id: &WaveId) -> Option<Wave> {
        self.inner.committed.lock().get(id).cloned()
    }

    fn read(&self, txn: TxnId, id: &WaveId) -> Option<Wave> {
        if let Some(writes) = self.inner.write_sets.lock().get(&txn) {
            if let Some(staged) = writes.get(id) {
                return staged.clone();
            }
        }
        self.inner.committed.lock().get(id).cloned()
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.inner.locks.lock().len()
    }

    fn enlist(&self, txn: &Transaction) -> Result<(), StoreError> {
        let participant: Arc<dyn TxnParticipant> = self.inner.clone();
        txn.enlist(&format!("store:{}", self.inner.name), participant)
    }

    fn stage(&self, txn: &Transaction, id: WaveId, value: Option<Wave>) -> Result<(), StoreError> {
        self.enlist(txn)?;
        self.inner
            .write_sets
            .lock()
            .entry(txn.id())
            .or_default()
            .insert(id, value);
        Ok(())
    }

    async fn lock_key(&self, txn: &Transaction, id: &WaveId) -> Result<(), StoreError> {
        txn.ensure_active()?;
        let key = format!("{}/{}", self.inner.name, id);
        if txn.holds_lock(&key) {
            return Ok(());
        }
        // Enlisted so the lock table is pruned when the transaction ends.
        self.enlist(txn)?;
        let mutex = Arc::clone(self.inner.locks.lock().entry(id.clone()).or_default());
        let timeout = self.inner.lock_timeout;
        let guard = tokio::time::timeout(timeout, mutex.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout {
                key: key.clone(),
                timeout,
            })?;
        txn.hold_lock(key, guard)
    }
}

impl TxnParticipant for StoreInner {
    fn prepare(&self, txn: TxnId) -> Result<(), StoreError> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };
        let ops: Vec<StoreOp> = match self.write_sets.lock().get(&txn) {
            Some(writes) if !writes.is_empty() => writes
                .iter()
                .map(|(id, value)| match value {
                    Some(wave) => StoreOp::Put { wave: wave.clone() },
                    None => StoreOp::Remove { id: id.clone() },
                })
                .collect(),
            _ => return Ok(()),
        };

        let mut wal = wal.lock();
        let result = match wal.append(&StoreRecord { txn, ops }) {
            Ok(_) => wal.flush(),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            wal.discard_buffer();
            return Err(e.into());
        }
        Ok(())
    }

    fn commit(&self, txn: TxnId) {
        if let Some(writes) = self.write_sets.lock().remove(&txn) {
            debug!(store = %self.name, txn, writes = writes.len(), "store writes applied");
            apply_writes(&mut self.committed.lock(), writes);
        }
    }

    fn abort(&self, txn: TxnId) {
        self.write_sets.lock().remove(&txn);
    }

    /// Drop lock entries nobody holds or waits on any more.
    fn released(&self, _txn: TxnId) {
        self.locks.lock().retain(|_, m| Arc::strong_count(m) > 1);
    }
}

fn check_persistable(wave: &Wave) -> Result<(), StoreError> {
    if wave.state() == WaveState::Invalid {
        return Err(StoreError::InvalidState(wave.id().clone()));
    }
    Ok(())
}

fn apply_writes(map: &mut BTreeMap<WaveId, Wave>, writes: WriteSet) {
    for (id, value) in writes {
        match value {
            Some(wave) => {
                map.insert(id, wave);
            }
            None => {
                map.remove(&id);
            }
        }
    }
}

fn apply_ops(map: &mut BTreeMap<WaveId, Wave>, ops: impl IntoIterator<Item = StoreOp>) {
    for op in ops {
        match op {
            StoreOp::Put { wave } => {
                map.insert(wave.id().clone(), wave);
            }
            StoreOp::Remove { id } => {
                map.remove(&id);
            }
        }
    }
}

/// Store names may carry URI punctuation; keep file names portable.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
