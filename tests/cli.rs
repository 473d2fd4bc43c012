//! Command line smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("kubecomply")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn exec_without_node_fails() {
    Command::cargo_bin("kubecomply")
        .unwrap()
        .args(["exec", "uname -a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--node"));
}

#[test]
fn unreadable_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("kubecomply")
        .unwrap()
        .args(["--config"])
        .arg(dir.path().join("missing.toml"))
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
