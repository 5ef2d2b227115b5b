// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wv check --topology <file>` - Validate a topology without running it

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::output::OutputFormat;
use crate::topology::Topology;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Topology file to validate
    #[arg(short = 't', long)]
    pub topology: PathBuf,
}

pub fn handle(args: CheckArgs, format: OutputFormat) -> Result<()> {
    let topology = Topology::load(&args.topology)?;
    print!("{}", describe(&topology, format)?);
    Ok(())
}

pub(crate) fn describe(topology: &Topology, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut out = format!("topology ok: {} nodes\n", topology.nodes.len());
            for node in &topology.nodes {
                let links = if node.links.is_empty() {
                    "(leaf)".to_string()
                } else {
                    node.links.join(", ")
                };
                out.push_str(&format!("  {} [{}] -> {}\n", node.name, node.link(), links));
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let nodes: Vec<_> = topology
                .nodes
                .iter()
                .map(|n| {
                    json!({
                        "name": n.name,
                        "link": n.link().to_string(),
                        "links": n.links,
                    })
                })
                .collect();
            Ok(format!(
                "{}\n",
                serde_json::to_string_pretty(&json!({ "nodes": nodes }))?
            ))
        }
    }
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
