// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica role and access status of the hosting partition

use crate::link::Link;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplicaRole {
    #[default]
    Unknown,
    None,
    IdleSecondary,
    ActiveSecondary,
    Primary,
}

/// Read or write access granted to this replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessStatus {
    Granted,
    ReconfigurationPending,
    #[default]
    NotPrimary,
    NoWriteQuorum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Restart the replica; another replica may take over as primary.
    Transient,
    Permanent,
}

/// The partition hosting a controller.
pub trait Partition: Send + Sync + 'static {
    /// Link other nodes use to reach this partition.
    fn self_link(&self) -> Link;
    fn role(&self) -> ReplicaRole;
    fn read_status(&self) -> AccessStatus;
    fn write_status(&self) -> AccessStatus;
    fn report_fault(&self, fault: FaultType);
}

#[derive(Debug)]
struct PartitionState {
    role: ReplicaRole,
    read: AccessStatus,
    write: AccessStatus,
    faults: Vec<FaultType>,
}

/// In-process partition with settable role and status.
#[derive(Clone, Debug)]
pub struct LocalPartition {
    link: Link,
    state: Arc<Mutex<PartitionState>>,
}

impl LocalPartition {
    /// A partition that starts with no role and no access.
    pub fn new(link: Link) -> Self {
        Self {
            link,
            state: Arc::new(Mutex::new(PartitionState {
                role: ReplicaRole::Unknown,
                read: AccessStatus::NotPrimary,
                write: AccessStatus::NotPrimary,
                faults: Vec::new(),
            })),
        }
    }

    /// Become primary with read and write granted.
    pub fn promote(&self) {
        let mut state = self.state.lock();
        state.role = ReplicaRole::Primary;
        state.read = AccessStatus::Granted;
        state.write = AccessStatus::Granted;
    }

    pub fn demote(&self) {
        let mut state = self.state.lock();
        state.role = ReplicaRole::ActiveSecondary;
        state.read = AccessStatus::NotPrimary;
        state.write = AccessStatus::NotPrimary;
    }

    pub fn set_role(&self, role: ReplicaRole) {
        self.state.lock().role = role;
    }

    pub fn set_read_status(&self, status: AccessStatus) {
        self.state.lock().read = status;
    }

    pub fn set_write_status(&self, status: AccessStatus) {
        self.state.lock().write = status;
    }

    pub fn faults(&self) -> Vec<FaultType> {
        self.state.lock().faults.clone()
    }
}

impl Partition for LocalPartition {
    fn self_link(&self) -> Link {
        self.link.clone()
    }

    fn role(&self) -> ReplicaRole {
        self.state.lock().role
    }

    fn read_status(&self) -> AccessStatus {
        self.state.lock().read
    }

    fn write_status(&self) -> AccessStatus {
        self.state.lock().write
    }

    fn report_fault(&self, fault: FaultType) {
        self.state.lock().faults.push(fault);
    }
}

#[cfg(test)]
#[path = "partition_tests.rs"]
mod tests;
