// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification shared by every layer

use std::fmt;

/// Coarse class of a failure.
///
/// Every error type in the workspace maps onto one of these. The class
/// decides whether an operation is retried at the transaction boundary,
/// swallowed as an expected shutdown signal, or reported as a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Contention or reconfiguration; retried with fixed backoff.
    Transient,
    /// This replica is not (or no longer) the primary.
    NotPrimary,
    /// The operation was canceled by a role change or shutdown.
    Canceled,
    /// The object was already closed.
    Closed,
    /// A protocol invariant was violated.
    Invariant,
    /// The caller asked for something the protocol forbids.
    InvalidOperation,
    Other,
}

impl ErrorClass {
    pub fn is_transient(self) -> bool {
        self == ErrorClass::Transient
    }

    /// Expected during role changes and shutdown; never reported as a fault.
    pub fn is_benign(self) -> bool {
        matches!(
            self,
            ErrorClass::NotPrimary | ErrorClass::Canceled | ErrorClass::Closed
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Transient => "transient",
            ErrorClass::NotPrimary => "not_primary",
            ErrorClass::Canceled => "canceled",
            ErrorClass::Closed => "closed",
            ErrorClass::Invariant => "invariant",
            ErrorClass::InvalidOperation => "invalid_operation",
            ErrorClass::Other => "other",
        };
        f.write_str(s)
    }
}

/// Errors that can be classified.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}
