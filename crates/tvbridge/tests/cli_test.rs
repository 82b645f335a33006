//! Integration tests for the `tvbridge` binary.
//!
//! Argument parsing, help output, completions, key listing, config
//! handling and error exits, all without a TV on the network.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tvbridge` binary with env isolation.
///
/// Clears all `TVBRIDGE_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn tvbridge_cmd_in(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tvbridge");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("TVBRIDGE_PROFILE")
        .env_remove("TVBRIDGE_ADDRESS")
        .env_remove("TVBRIDGE_PROTOCOL")
        .env_remove("TVBRIDGE_MAC")
        .env_remove("TVBRIDGE_TOKEN")
        .env_remove("TVBRIDGE_OUTPUT")
        .env_remove("TVBRIDGE_WAIT")
        .env_remove("TVBRIDGE_PIN");
    cmd
}

fn tvbridge_cmd() -> assert_cmd::Command {
    tvbridge_cmd_in(Path::new("/tmp/tvbridge-cli-test-nonexistent"))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = tvbridge_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    tvbridge_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("remote-control protocol")
            .and(predicate::str::contains("send"))
            .and(predicate::str::contains("power"))
            .and(predicate::str::contains("keys")),
    );
}

#[test]
fn test_version_flag() {
    tvbridge_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tvbridge"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    tvbridge_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    tvbridge_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Keys ────────────────────────────────────────────────────────────

#[test]
fn test_keys_table() {
    tvbridge_cmd().arg("keys").assert().success().stdout(
        predicate::str::contains("KEY_VOLUP")
            .and(predicate::str::contains("Navigation"))
            .and(predicate::str::contains("KEY_HDMI")),
    );
}

#[test]
fn test_keys_group_plain() {
    let output = tvbridge_cmd()
        .args(["keys", "--group", "volume", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let codes: Vec<&str> = stdout.lines().collect();
    assert_eq!(codes, vec!["KEY_VOLUP", "KEY_VOLDOWN", "KEY_MUTE"]);
}

#[test]
fn test_keys_json_has_state_keys() {
    let output = tvbridge_cmd()
        .args(["keys", "-g", "Color", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["state_key"], "keys.Color.Red");
}

#[test]
fn test_keys_unknown_group() {
    tvbridge_cmd()
        .args(["keys", "--group", "Teleport"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Teleport"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = tvbridge_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_send_without_config() {
    let output = tvbridge_cmd().args(["send", "Mute"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(
        text.contains("config init"),
        "Expected setup hint in output:\n{text}"
    );
}

#[test]
fn test_send_unknown_key_fails_before_connecting() {
    tvbridge_cmd()
        .args(["send", "Teleport", "--address", "192.0.2.1"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Unknown key 'Teleport'"));
}

#[test]
fn test_invalid_protocol_is_usage_error() {
    tvbridge_cmd()
        .args(["status", "--address", "127.0.0.1", "--protocol", "infrared"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("protocol"));
}

#[test]
fn test_power_requires_valid_state() {
    tvbridge_cmd()
        .args(["power", "sideways", "--address", "127.0.0.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sideways"));
}

// ── Status ──────────────────────────────────────────────────────────

#[test]
fn test_status_of_loopback_is_reachable() {
    // Refused connections count as an answering host.
    let output = tvbridge_cmd()
        .args([
            "status",
            "--address",
            "127.0.0.1",
            "--protocol",
            "generic",
            "--mac",
            "a4-30-7a-01-02-03",
            "-o",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["reachable"], true);
    assert_eq!(report["protocol"], "generic");
    assert_eq!(report["mac"], "a4:30:7a:01:02:03");
    assert_eq!(report["probe_ports"], serde_json::json!([55000, 9197]));
}

// ── Config ──────────────────────────────────────────────────────────

fn write_config(home: &Path, body: &str) {
    let dir = home.join("tvbridge");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

#[test]
fn test_config_path_uses_config_dir() {
    let home = tempfile::tempdir().unwrap();
    tvbridge_cmd_in(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_secrets() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        r#"
default_profile = "living"

[profiles.living]
address = "192.168.1.40"
protocol = "token"
token = "super-secret-token"
"#,
    );

    let output = tvbridge_cmd_in(home.path())
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[profiles.living]"));
    assert!(stdout.contains("token = \"****\""));
    assert!(!stdout.contains("super-secret-token"));
}

#[test]
fn test_profile_feeds_status() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        r#"
[profiles.den]
address = "127.0.0.1"
protocol = "hj"
"#,
    );

    let output = tvbridge_cmd_in(home.path())
        .args(["status", "-p", "den", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["profile"], "den");
    assert_eq!(report["protocol"], "pin");
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), "[profiles.den]\naddress = \"10.0.0.2\"\n");

    tvbridge_cmd_in(home.path())
        .args(["status", "-p", "kitchen"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("kitchen").and(predicate::str::contains("den")));
}

#[test]
fn test_config_use_switches_default() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        "[profiles.den]\naddress = \"10.0.0.2\"\n\n[profiles.attic]\naddress = \"10.0.0.3\"\n",
    );

    tvbridge_cmd_in(home.path())
        .args(["config", "use", "attic"])
        .assert()
        .success();
    tvbridge_cmd_in(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("attic *"));
}
