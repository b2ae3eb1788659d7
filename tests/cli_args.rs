//! Integration tests for the binary argument surface
//!
//! Runs the compiled binary with isolated config/cache directories and
//! checks the exit behavior for the failure paths that never reach the
//! network.

use std::process::Command;

use tempfile::TempDir;

/// Helper to run the CLI with given args and isolated state directories
fn run_cli(args: &[&str], home: &TempDir) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_assistnow"))
        .args(args)
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_CACHE_HOME", home.path().join("cache"))
        .output()
        .expect("Failed to execute assistnow")
}

#[test]
fn test_help_flag_exits_successfully() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["--help"], &home);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("assistnow"), "Help should mention assistnow");
    assert!(stdout.contains("KEY=VALUE"), "Help should mention KEY=VALUE");
}

#[test]
fn test_version_flag_exits_successfully() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["--version"], &home);
    assert!(output.status.success());
}

#[test]
fn test_malformed_pair_exits_with_usage_error() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["gnss"], &home);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("KEY=VALUE"),
        "Should explain the expected form: {}",
        stderr
    );
}

#[test]
fn test_unknown_parameter_exits_with_usage_error() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["speed=10"], &home);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("speed"),
        "Should name the offending parameter: {}",
        stderr
    );
}

#[test]
fn test_invalid_constellation_exits_with_usage_error() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["gnss=navic"], &home);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("navic"), "Should name the bad value: {}", stderr);
}

#[test]
fn test_unregistered_device_without_token_exits_with_usage_error() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["gnss=gps"], &home);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("token"),
        "Should point at the missing token: {}",
        stderr
    );
}

#[test]
fn test_out_of_range_cache_duration_exits_with_usage_error() {
    let home = TempDir::new().unwrap();
    let output = run_cli(&["cache_duration=48"], &home);

    assert_eq!(output.status.code(), Some(2));
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;

    use assistnow::cli::{invocation_from_cli, Cli};

    #[test]
    fn test_cli_collects_positional_pairs() {
        let cli = Cli::parse_from(["assistnow", "gnss=gps,glo", "lat=45"]);
        assert_eq!(cli.settings, vec!["gnss=gps,glo", "lat=45"]);
    }

    #[test]
    fn test_invocation_splits_token_from_overrides() {
        let cli = Cli::parse_from(["assistnow", "token=abc", "gnss=gps"]);
        let invocation = invocation_from_cli(&cli).unwrap();
        assert_eq!(invocation.token.as_deref(), Some("abc"));
        assert!(!invocation.overrides.contains_key("token"));
        assert!(invocation.overrides.contains_key("gnss"));
    }
}
