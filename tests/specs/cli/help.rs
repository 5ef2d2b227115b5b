//! CLI help output specs

use crate::prelude::*;

#[test]
fn no_subcommand_prints_help() {
    cli()
        .passes()
        .stdout_has("Usage: wv")
        .stdout_has("run")
        .stdout_has("check");
}

#[test]
fn run_help_lists_its_options() {
    cli()
        .args(&["run", "--help"])
        .passes()
        .stdout_has("--topology")
        .stdout_has("--kind")
        .stdout_has("--body")
        .stdout_has("--from")
        .stdout_has("--timeout-ms");
}

#[test]
fn version_is_printed() {
    cli().args(&["--version"]).passes().stdout_has("wv ");
}
