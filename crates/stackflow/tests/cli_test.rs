#![allow(deprecated)] // TODO: move from Command::cargo_bin to cargo_bin_cmd!

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn stackflow() -> Command {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.env_remove("STACKFLOW_CONFIG_PATH").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    stackflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_cli_version() {
    stackflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_invalid_command() {
    stackflow().arg("invalid-command").assert().failure();
}

#[test]
fn test_validate_lists_provisioners() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("stackflow.yaml"),
        r#"
resources:
  - name: Orders
    kind: template-stack
    template: orders.json
  - name: Web
    kind: app
    assembly: cdk.out
  - name: WebApi
    kind: app-stack
    parent: Web
  - name: Legacy
    kind: construct
"#,
    )
    .unwrap();

    stackflow()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("プロジェクトファイルは有効です"))
        .stdout(predicate::str::contains("template-stack"))
        .stdout(predicate::str::contains("WebApi"))
        .stdout(predicate::str::contains("なし（スキップ）"));
}

#[test]
fn test_validate_rejects_unknown_kind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("infra.yaml");
    fs::write(&path, "resources:\n  - name: Fn\n    kind: lambda\n").unwrap();

    stackflow()
        .arg("validate")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource kind"));
}

#[test]
fn test_validate_without_project() {
    let dir = tempfile::tempdir().unwrap();
    stackflow()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .arg("validate")
        .assert()
        .failure();
}

#[test]
fn test_up_with_nothing_to_provision() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stackflow.yaml"), "resources: []\n").unwrap();

    stackflow()
        .current_dir(dir.path())
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 provisioned, 0 skipped, 0 failed"))
        .stderr(predicate::str::contains("Provisioning run finished"));
}

#[test]
fn test_up_fails_when_a_resource_fails() {
    let dir = tempfile::tempdir().unwrap();
    // アセンブリがなければクライアント生成前に失敗する
    fs::write(
        dir.path().join("stackflow.yaml"),
        "resources:\n  - name: Web\n    kind: app\n    assembly: cdk.out\n",
    )
    .unwrap();

    stackflow()
        .current_dir(dir.path())
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Web"))
        .stderr(predicate::str::contains("Resource failed to provision"))
        .stdout(predicate::str::contains("1 failed"));
}
