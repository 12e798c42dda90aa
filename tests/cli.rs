//! Integration tests for the crucible CLI.
//!
//! These run the built binary and check output, exit codes, and file system
//! effects. Nothing here needs Docker or an API key.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// -----------------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------------

#[allow(deprecated)]
fn crucible() -> Command {
    Command::cargo_bin("crucible").expect("failed to find crucible binary")
}

fn crucible_in(dir: &TempDir) -> Command {
    let mut cmd = crucible();
    cmd.current_dir(dir.path());
    cmd
}

// -----------------------------------------------------------------------------
// Help and version
// -----------------------------------------------------------------------------

#[test]
fn test_help_shows_all_commands() {
    crucible()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("crucible"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("profile"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_version_shows_version() {
    crucible()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("crucible"));
}

#[test]
fn test_run_help_shows_all_options() {
    crucible()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--task-file"))
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--report"))
        .stdout(predicate::str::contains("--log-file"));
}

#[test]
fn test_unknown_command_fails() {
    crucible().arg("explode").assert().failure();
}

// -----------------------------------------------------------------------------
// Profile command
// -----------------------------------------------------------------------------

#[test]
fn test_profile_flask_task_is_python() {
    crucible()
        .args([
            "profile",
            "Create a simple Flask 'Hello World' web server in a file named app.py",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("python"))
        .stdout(predicate::str::contains("app.py"))
        .stdout(predicate::str::contains("test_main.py"))
        .stdout(predicate::str::contains("pytest"))
        .stdout(predicate::str::contains("FROM python:3.11-slim"));
}

#[test]
fn test_profile_express_task_is_node() {
    crucible()
        .args(["profile", "Build an EXPRESS server with a health route"])
        .assert()
        .success()
        .stdout(predicate::str::contains("node"))
        .stdout(predicate::str::contains("app.test.js"))
        .stdout(predicate::str::contains("npm test"))
        .stdout(predicate::str::contains("COPY package.json ."));
}

#[test]
fn test_profile_blank_task_fails() {
    crucible()
        .args(["profile", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task cannot be empty"));
}

// -----------------------------------------------------------------------------
// Run command argument handling
// -----------------------------------------------------------------------------

#[test]
fn test_run_without_task_fails() {
    let dir = TempDir::new().unwrap();
    crucible_in(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No task given"));
}

#[test]
fn test_run_with_unknown_provider_fails() {
    let dir = TempDir::new().unwrap();
    crucible_in(&dir)
        .args(["run", "flask app", "--provider", "nope"])
        .env_remove("CRUCIBLE_PROVIDER")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown LLM provider"));
}

#[test]
fn test_run_without_api_key_fails_before_docker() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("crucible.toml"),
        "[llm]\napi_key_env = \"CRUCIBLE_CLI_TEST_KEY_NEVER_SET\"\n",
    )
    .unwrap();

    crucible_in(&dir)
        .args(["run", "flask app"])
        .env_remove("CRUCIBLE_PROVIDER")
        .env_remove("CRUCIBLE_CLI_TEST_KEY_NEVER_SET")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CRUCIBLE_CLI_TEST_KEY_NEVER_SET"));
}

#[test]
fn test_run_with_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("crucible.toml"), "[llm\n").unwrap();

    crucible_in(&dir)
        .args(["run", "flask app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("crucible.toml"));
}

// -----------------------------------------------------------------------------
// Init command
// -----------------------------------------------------------------------------

#[test]
fn test_init_creates_config() {
    let dir = TempDir::new().unwrap();

    crucible_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("crucible initialized"));

    let content = fs::read_to_string(dir.path().join("crucible.toml")).unwrap();
    assert!(content.contains("[llm]"));
    assert!(content.contains("[sandbox]"));
}

#[test]
fn test_init_skips_existing_without_force() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("crucible.toml"), "# custom\n").unwrap();

    crucible_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let content = fs::read_to_string(dir.path().join("crucible.toml")).unwrap();
    assert_eq!(content, "# custom\n");
}

#[test]
fn test_init_force_overwrites() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("crucible.toml"), "# custom\n").unwrap();

    crucible_in(&dir)
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overwritten"));

    let content = fs::read_to_string(dir.path().join("crucible.toml")).unwrap();
    assert!(content.contains("[llm]"));
}
