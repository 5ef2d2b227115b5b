// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process replicator: hands out transactions and named stores.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::WaveStore;
use crate::txn::Transaction;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use wv_core::{AccessStatus, Partition, ReplicaRole};

struct ReplicatorInner {
    partition: Arc<dyn Partition>,
    config: StoreConfig,
    next_txn: AtomicU64,
    stores: Mutex<HashMap<String, WaveStore>>,
}

#[derive(Clone)]
pub struct Replicator {
    inner: Arc<ReplicatorInner>,
}

impl Replicator {
    pub fn new(partition: Arc<dyn Partition>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(ReplicatorInner {
                partition,
                config,
                next_txn: AtomicU64::new(1),
                stores: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn partition(&self) -> &Arc<dyn Partition> {
        &self.inner.partition
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Begin a transaction. Only the primary may write.
    pub fn create_transaction(&self) -> Result<Transaction, StoreError> {
        if self.inner.partition.role() != ReplicaRole::Primary {
            return Err(StoreError::NotPrimary);
        }
        let id = self.inner.next_txn.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::new(id, Arc::clone(&self.inner.partition)))
    }

    /// Return the named store, creating (and replaying) it on first use.
    ///
    /// Creating a store is a write and needs write access; an existing one
    /// is returned to any caller.
    pub fn get_or_create_store(&self, name: &str) -> Result<WaveStore, StoreError> {
        let mut stores = self.inner.stores.lock();
        if let Some(store) = stores.get(name) {
            return Ok(store.clone());
        }

        let partition = &self.inner.partition;
        if partition.role() != ReplicaRole::Primary {
            return Err(StoreError::NotPrimary);
        }
        match partition.write_status() {
            AccessStatus::Granted => {}
            AccessStatus::NotPrimary => return Err(StoreError::NotPrimary),
            status => return Err(StoreError::WriteUnavailable(status)),
        }

        let store = WaveStore::open(name, &self.inner.config)?;
        info!(store = name, "wave store created");
        stores.insert(name.to_string(), store.clone());
        Ok(store)
    }
}

#[cfg(test)]
#[path = "replicator_tests.rs"]
mod tests;
