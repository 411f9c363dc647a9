//! Integration tests for core CLI contract behavior.

use predicates::prelude::*;
use tempfile::tempdir;

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("picprog")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("picprog"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn short_help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("picprog"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("picprog"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn short_version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains("picprog"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn list_ports_succeeds_without_a_port_flag() {
    let mut cmd = cli_cmd();
    cmd.arg("list-ports")
        .assert()
        .success()
        .stdout(predicate::str::contains("Serial Ports"));
}

#[test]
fn ping_without_a_port_fails_with_a_helpful_message() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env_remove("PICPROG_PORT")
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn fast_write_with_a_missing_file_fails() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env("PICPROG_PORT", "/dev/nonexistent-picprog-test")
        .args([
            "fast-write",
            "does-not-exist.bin",
            "--address",
            "0x1D000000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
