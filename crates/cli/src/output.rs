// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::cluster::RunReport;
use clap::ValueEnum;
use serde_json::{json, Value};

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render a finished run.
///
/// Text prints a summary line and one pretty-printed report per feedback
/// item; JSON prints a single object for scripts.
pub fn format_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<String> {
    let reports = report.result.reports();
    match format {
        OutputFormat::Text => {
            let mut out = format!(
                "wave {} completed at {} ({} messages)\n",
                report.result.wave.id(),
                report.initiator,
                report.messages
            );
            for item in &reports {
                out.push_str(&serde_json::to_string_pretty(item)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let value: Value = json!({
                "wave_id": report.result.wave.id(),
                "initiator": report.initiator,
                "messages": report.messages,
                "feedback": reports,
            });
            Ok(format!("{}\n", serde_json::to_string_pretty(&value)?))
        }
    }
}
