//! End-to-end tests for the `waf-live` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn waf_live() -> Command {
    let mut cmd = Command::cargo_bin("waf-live").expect("binary built");
    cmd.env_remove("WAF_LIVE_TOKEN")
        .env_remove("WAF_LIVE_CONFIG")
        .env_remove("WAF_LIVE_ENDPOINT")
        .env_remove("WAF_LIVE_API_URL")
        .env_remove("WAF_LIVE_TRANSPORT");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    waf_live()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("snapshot"))
        .stdout(predicate::str::contains("init-config"));
}

#[test]
fn test_watch_requires_token() {
    waf_live()
        .arg("watch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn test_init_config_writes_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("live.toml");

    waf_live()
        .args(["init-config", "--output"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let written = std::fs::read_to_string(&path).expect("config written");
    assert!(written.contains("endpoint = \"http://localhost:8081/ws\""));
    assert!(written.contains("[reconnect]"));

    waf_live()
        .args(["init-config", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_invalid_endpoint_rejected_before_connecting() {
    waf_live()
        .args(["--endpoint", "ftp://example.com", "watch", "--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("endpoint must use"));
}

#[test]
fn test_snapshot_offline_prints_empty_view() {
    waf_live()
        .args([
            "--endpoint",
            "http://127.0.0.1:9/ws",
            "snapshot",
            "--token",
            "t",
            "--no-seed",
            "--seconds",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("WAF Dashboard (offline)"));
}
