// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the wave controller

use std::time::Duration;
use thiserror::Error;
use wv_adapters::StreamError;
use wv_core::{Classify, CodecError, ErrorClass, WaveId, WaveRecordError};
use wv_storage::StoreError;

/// Errors raised by domain processors
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("transient processor failure: {0}")]
    Transient(String),
    #[error("processor failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for ProcessorError {
    fn class(&self) -> ErrorClass {
        match self {
            ProcessorError::Transient(_) => ErrorClass::Transient,
            ProcessorError::Failed(_) => ErrorClass::Other,
            ProcessorError::Store(e) => e.class(),
        }
    }
}

/// Errors that can occur in the wave controller
#[derive(Debug, Error)]
pub enum WaveError {
    #[error("replica is not primary")]
    NotPrimary,
    #[error("wave {0} has no outbound links")]
    NoOutboundLinks(WaveId),
    #[error("operation canceled")]
    Canceled,
    #[error("no processor for wave {wave_id} after {timeout:?}")]
    ProcessorTimeout { wave_id: WaveId, timeout: Duration },
    #[error("primary processing failed ({0})")]
    PrimaryFailed(ErrorClass),
    #[error("the wave controller cannot be removed")]
    Unsupported,
    #[error("no async runtime to run deferred work on")]
    NoRuntime,
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error(transparent)]
    Record(#[from] WaveRecordError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),
}

impl WaveError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        WaveError::Invariant(message.into())
    }
}

impl Classify for WaveError {
    fn class(&self) -> ErrorClass {
        match self {
            WaveError::NotPrimary => ErrorClass::NotPrimary,
            WaveError::NoOutboundLinks(_) | WaveError::Unsupported => {
                ErrorClass::InvalidOperation
            }
            WaveError::Canceled | WaveError::ProcessorTimeout { .. } => ErrorClass::Canceled,
            WaveError::PrimaryFailed(class) => *class,
            WaveError::NoRuntime => ErrorClass::Other,
            WaveError::Invariant(_) | WaveError::Record(_) | WaveError::Codec(_) => {
                ErrorClass::Invariant
            }
            WaveError::Store(e) => e.class(),
            WaveError::Stream(e) => e.class(),
            WaveError::Processor(e) => e.class(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
