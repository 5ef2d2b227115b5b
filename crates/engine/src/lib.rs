// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Wave propagation engine: the controller, its processor contracts and
//! recovery

mod config;
mod controller;
mod error;
mod gate;
mod processor;
mod retry;

#[cfg(test)]
mod test_helpers;

pub use config::{ControllerConfig, DEFAULT_STORE_NAME};
pub use controller::{ControllerDeps, StateProvider, WaveController};
pub use error::{ProcessorError, WaveError};
pub use gate::GateState;
pub use processor::{KindRegistry, ProcessorRegistry, WaveProcessor, WaveResultProcessor};
