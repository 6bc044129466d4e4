//! CLI integration tests

use std::process::Command;

fn vitals() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vitals"))
}

#[test]
fn test_cli_help() {
    let output = vitals().arg("--help").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Vitals pipeline"), "Should show app name");
    for command in ["login", "logout", "data", "prediction", "plot", "health"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

#[test]
fn test_cli_version() {
    let output = vitals().arg("--version").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("vitals"), "Should show binary name");
}

#[test]
fn test_plot_help_shows_output_option() {
    let output = vitals()
        .args(["plot", "--help"])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--output"));
}

#[test]
fn test_data_against_unreachable_server_fails() {
    let home = tempfile::TempDir::new().unwrap();
    let output = vitals()
        .env("HOME", home.path())
        .args(["--api-url", "http://127.0.0.1:9", "data"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to send request"));
}

#[test]
fn test_invalid_format_rejected() {
    let output = vitals()
        .args(["--format", "xml", "prediction"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}
