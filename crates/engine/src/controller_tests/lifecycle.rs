// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{GateState, StateProvider, WaveError};
use std::sync::Arc;
use wv_core::{Classify, ErrorClass, ReplicaRole};

#[tokio::test]
async fn checkpoints_and_recovery_hooks_are_no_ops() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let controller = &cluster.node("b").controller;

    controller.open().await.unwrap();
    controller.prepare_checkpoint(7).await.unwrap();
    controller.perform_checkpoint().await.unwrap();
    controller.complete_checkpoint().await.unwrap();
    controller.on_recovery_completed().await.unwrap();
    assert!(!controller.on_data_loss().await.unwrap());
    assert_eq!(controller.gate_state(), GateState::Ready);
}

#[tokio::test]
async fn removal_is_unsupported() {
    let cluster = Cluster::build(&[("b", &[])]);
    let err = cluster
        .node("b")
        .controller
        .prepare_for_remove()
        .await
        .unwrap_err();
    assert!(matches!(err, WaveError::Unsupported));
    assert_eq!(err.class(), ErrorClass::InvalidOperation);
}

#[tokio::test]
async fn close_and_abort_stop_primary_processing() {
    let cluster = Cluster::start(&[("b", &[]), ("c", &[])]).await;

    cluster.node("b").controller.close().await.unwrap();
    cluster.node("c").controller.abort().await;
    for name in ["b", "c"] {
        assert_eq!(
            cluster.node(name).controller.gate_state(),
            GateState::Failed(ErrorClass::NotPrimary)
        );
    }
}

#[tokio::test]
async fn promotion_again_restarts_recovery() {
    let cluster = Cluster::start(&[("b", &[])]).await;
    let b = cluster.node("b");

    b.controller.change_role(ReplicaRole::IdleSecondary).await.unwrap();
    b.controller.change_role(ReplicaRole::Primary).await.unwrap();
    b.controller.wait_until_ready().await.unwrap();
    b.controller.change_role(ReplicaRole::Primary).await.unwrap();
    b.controller.wait_until_ready().await.unwrap();
    assert!(b.controller.wave_store().is_some());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
#[serial_test::serial(tracing)]
async fn promotion_and_demotion_are_logged() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let cluster = Cluster::start(&[("b", &[])]).await;
    cluster.node("b").pause().await;

    let output = String::from_utf8_lossy(&logs.0.lock()).to_string();
    assert!(output.contains("primary processing ready"), "logs:\n{output}");
    assert!(output.contains("wave store created"), "logs:\n{output}");
}
