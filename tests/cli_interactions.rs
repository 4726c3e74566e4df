//! CLI options interaction tests
//!
//! These run the `mlt` binary against an in-process Modbus server and check
//! output, exit codes and report files. Tests that need the server use a
//! multi-threaded runtime so it keeps answering while the binary runs.

mod common;

use assert_cmd::prelude::*;
use common::{closed_port, FakeServer};
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Helper function to create a test command running in a scratch directory
fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mlt").unwrap();
    cmd.current_dir(dir.path())
        .arg("--no-color")
        .env("NO_COLOR", "1")
        .env_remove("MODBUS_HOST")
        .env_remove("MODBUS_PORT")
        .env_remove("TEST_DURATION_MINUTES")
        .env_remove("LOG_FILE");
    cmd
}

fn short_run_args(port: u16) -> Vec<String> {
    ["--host", "127.0.0.1", "--port", &port.to_string(), "--rates", "20", "--sizes", "1,5", "--duration", "0.005"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn test_help_and_version() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--on-connection-loss"))
        .stdout(predicate::str::contains("--check"));

    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mlt"));
}

#[test]
fn test_help_topics() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--help-topic", "env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MODBUS_TIMEOUT_SECONDS"));

    create_test_cmd(&dir)
        .args(["--help-topic", "bogus"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown help topic"));
}

#[test]
fn test_invalid_arguments_rejected() {
    let dir = TempDir::new().unwrap();
    for args in [
        vec!["--rates", "0"],
        vec!["--sizes", "abc"],
        vec!["--register-type", "coil"],
        vec!["--quick", "--duration", "2"],
    ] {
        create_test_cmd(&dir).args(&args).assert().failure();
    }
}

#[test]
fn test_configuration_errors_exit_1() {
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(["--sizes", "200"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[CONFIG]"));

    create_test_cmd(&dir)
        .args(["--check", "--quick"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[VALIDATION]"));

    create_test_cmd(&dir)
        .env("TEST_RATES_HZ", "1,fast")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("TEST_RATES_HZ"));
}

#[test]
fn test_unknown_config_file_key_exits_1() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.yaml"), "modbus:\n  hostname: plc\n").unwrap();

    create_test_cmd(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("hostname"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_against_server() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(["--check", "--port", &server.port().to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modbus Connection Check"))
        .stdout(predicate::str::contains("[OK] Reading 1 registers"))
        .stdout(predicate::str::contains("[OK] Reading 20 registers"));

    // The check never writes reports
    assert!(!dir.path().join("results").exists());
}

#[tokio::test]
async fn test_check_without_server_exits_2() {
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(["--check", "--port", &closed_port().await.to_string()])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Connection failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_matrix_run_writes_reports() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(short_run_args(server.port()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Test 1/2: 20Hz, 1 registers"))
        .stdout(predicate::str::contains("Test 2/2: 20Hz, 5 registers"))
        .stdout(predicate::str::contains("Freq (Hz)"))
        .stdout(predicate::str::contains("All 2 runs completed"));

    let mut names: Vec<String> = fs::read_dir(dir.path().join("results"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names.len(), 3, "{:?}", names);
    assert!(names[0].starts_with("detailed_results_") && names[0].ends_with(".csv"));
    assert!(names[1].starts_with("test_stats_") && names[1].ends_with(".csv"));
    assert!(names[2].starts_with("test_stats_") && names[2].ends_with(".json"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_flags_and_log_file() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(short_run_args(server.port()))
        .args(["--no-detailed", "--output-dir", "out", "--log-file", "mlt.log"])
        .assert()
        .success();

    let files: Vec<_> = fs::read_dir(dir.path().join("out")).unwrap().collect();
    assert_eq!(files.len(), 2);

    let log = fs::read_to_string(dir.path().join("mlt.log")).unwrap();
    assert!(!log.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nothing_saved_when_reports_disabled() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(short_run_args(server.port()))
        .args(["--no-summary", "--no-detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved:").not());

    assert!(!dir.path().join("results").exists());
}

#[tokio::test]
async fn test_run_without_server_exits_2() {
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(short_run_args(closed_port().await))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[CONNECTION]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_file_and_env_layering() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.yaml"),
        format!(
            "modbus:\n  host: 127.0.0.1\n  port: {}\ntest:\n  frequencies: [20]\n  register_counts: [1]\n  duration_minutes: 5\n",
            closed_port().await
        ),
    )
    .unwrap();

    // Environment beats the file, CLI beats the environment
    create_test_cmd(&dir)
        .env("MODBUS_PORT", server.port().to_string())
        .env("TEST_DURATION_MINUTES", "10")
        .args(["--duration", "0.005", "--no-summary", "--no-detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("127.0.0.1:{}", server.port())))
        .stdout(predicate::str::contains("All 1 runs completed"));
}
