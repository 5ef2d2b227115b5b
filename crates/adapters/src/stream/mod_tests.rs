// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    initialized = { StreamState::Initialized, false },
    open        = { StreamState::Open, false },
    closing     = { StreamState::Closing, true },
    closed      = { StreamState::Closed, true },
    deleting    = { StreamState::Deleting, true },
    deleted     = { StreamState::Deleted, true },
)]
fn finished_states(state: StreamState, finished: bool) {
    assert_eq!(state.is_finished(), finished);
}

#[yare::parameterized(
    already_exists = { StreamError::AlreadyExists(StreamName::new("s")), ErrorClass::Invariant },
    closed         = { StreamError::Closed(StreamName::new("s")), ErrorClass::Closed },
    not_primary    = { StreamError::Txn(StoreError::NotPrimary), ErrorClass::NotPrimary },
    txn_closed     = { StreamError::Txn(StoreError::TransactionClosed(7)), ErrorClass::Closed },
    wrong_way      = {
        StreamError::WrongDirection {
            op: "send",
            direction: StreamDirection::Inbound,
            name: StreamName::new("s"),
        },
        ErrorClass::InvalidOperation
    },
)]
fn error_classes(err: StreamError, class: ErrorClass) {
    assert_eq!(err.class(), class);
}

#[test]
fn state_display() {
    assert_eq!(StreamState::Deleting.to_string(), "deleting");
}
