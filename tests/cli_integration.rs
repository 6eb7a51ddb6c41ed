//! Integration tests for the `reelbot` CLI.
//!
//! Spawns the binary in a temporary working directory. Covers help
//! output and the exit-code contract: non-zero only for configuration
//! failures detected before any run starts.

use std::path::PathBuf;
use std::process::Command;

fn reelbot_bin() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_reelbot")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("target/debug/reelbot"))
}

const MINIMAL_CONTENT_CONFIG: &str = r#"
name: minimal
description: test config
content_idea:
  role: test
  task: test
story_writer:
  role: test
image_generation: {}
"#;

fn setup_content_config(tmp: &tempfile::TempDir) {
    let dir = tmp.path().join("content_configs");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("minimal.yaml"), MINIMAL_CONTENT_CONFIG).unwrap();
}

#[test]
fn help_exits_successfully() {
    let output = Command::new(reelbot_bin())
        .arg("--help")
        .output()
        .expect("reelbot --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("auth"));
    assert!(stdout.contains("configs"));
    assert!(stdout.contains("--no-publish"));
    assert!(stdout.contains("--publish-to"));
}

#[test]
fn unknown_command_shows_help_without_failing() {
    let output = Command::new(reelbot_bin())
        .arg("frobnicate")
        .output()
        .expect("reelbot frobnicate");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown command"));
}

#[test]
fn missing_content_config_exits_nonzero() {
    let tmp = tempfile::tempdir().unwrap();

    let output = Command::new(reelbot_bin())
        .args(["run", "--config", "does-not-exist", "--no-publish"])
        .current_dir(tmp.path())
        .output()
        .expect("reelbot run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does-not-exist"));
}

#[test]
fn missing_api_key_fails_validation_before_any_run() {
    let tmp = tempfile::tempdir().unwrap();
    setup_content_config(&tmp);

    let output = Command::new(reelbot_bin())
        .args(["run", "--config", "minimal", "--no-publish"])
        .current_dir(tmp.path())
        .env_remove("OPENAI_API_KEY")
        .output()
        .expect("reelbot run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("openai_api_key"));
}

#[test]
fn unknown_publish_target_exits_nonzero() {
    let tmp = tempfile::tempdir().unwrap();
    setup_content_config(&tmp);

    let output = Command::new(reelbot_bin())
        .args(["run", "--config", "minimal", "--publish-to", "myspace"])
        .current_dir(tmp.path())
        .output()
        .expect("reelbot run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("myspace"));
}

#[test]
fn configs_command_lists_available_configs() {
    let tmp = tempfile::tempdir().unwrap();
    setup_content_config(&tmp);

    let output = Command::new(reelbot_bin())
        .arg("configs")
        .current_dir(tmp.path())
        .output()
        .expect("reelbot configs");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("minimal"));
}
