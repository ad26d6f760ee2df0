//! Behavioural smoke test for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_names_the_cleanup_mode() {
    let mut cmd = cargo_bin_cmd!("palisade");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--cleanup"));
}
