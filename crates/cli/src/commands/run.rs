// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wv run --topology <file>` - Run one wave over an in-process cluster

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use wv_core::WaveCommand;

use crate::cluster::LocalCluster;
use crate::output::{format_report, OutputFormat};
use crate::topology::Topology;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Topology file describing the cluster
    #[arg(short = 't', long)]
    pub topology: PathBuf,

    /// Wave command kind
    #[arg(short = 'k', long, default_value = "survey")]
    pub kind: String,

    /// Wave command body (JSON)
    #[arg(short = 'b', long, default_value = "{}", value_parser = parse_body)]
    pub body: Value,

    /// Node that initiates the wave (default: the first node)
    #[arg(long)]
    pub from: Option<String>,

    /// Give up if the wave has not completed after this many milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}

fn parse_body(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("body is not valid JSON: {e}"))
}

pub async fn handle(args: RunArgs, format: OutputFormat) -> Result<()> {
    let topology = Topology::load(&args.topology)?;
    let from = match args.from {
        Some(from) => from,
        None => topology
            .nodes
            .first()
            .map(|n| n.name.clone())
            .context("topology has no nodes")?,
    };

    let mut cluster = LocalCluster::build(&topology, &args.kind);
    cluster.start().await?;
    let report = cluster
        .run(
            &from,
            WaveCommand::new(args.kind, args.body),
            Duration::from_millis(args.timeout_ms),
        )
        .await;
    cluster.shutdown().await;

    print!("{}", format_report(&report?, format)?);
    Ok(())
}
