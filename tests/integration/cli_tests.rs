//! `migrate` binary tests
//!
//! Run the compiled binary and check its exit codes and output.

use std::path::Path;
use std::process::{Command, Output};

use crate::common::shipped_migrations_dir;

fn migrate(workdir: &Path, args: &[&str], db_url: Option<&str>) -> Output {
    let config = workdir.join("missing.yaml");
    let mut command = Command::new(env!("CARGO_BIN_EXE_migrate"));
    command
        .arg("--config")
        .arg(&config)
        .args(args)
        .current_dir(workdir)
        .env_remove("DB_URL")
        .env_remove("DATABASE_URL")
        .env_remove("HELLO_MIGRATIONS_DIR")
        .env_remove("HELLO_MIGRATIONS_TABLE");
    if let Some(url) = db_url {
        command.env("DB_URL", url);
    }
    command.output().expect("Failed to run migrate binary")
}

#[test]
fn test_unknown_command_exits_with_failure() {
    let workdir = tempfile::tempdir().unwrap();

    let output = migrate(workdir.path(), &["sideways"], None);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown command: sideways"));
}

#[test]
fn test_missing_command_exits_with_failure() {
    let workdir = tempfile::tempdir().unwrap();

    let output = migrate(workdir.path(), &[], None);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help_exits_with_success() {
    let workdir = tempfile::tempdir().unwrap();

    let output = migrate(workdir.path(), &["--help"], None);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("USAGE:"));
}

#[test]
fn test_missing_db_url_exits_with_failure() {
    let workdir = tempfile::tempdir().unwrap();

    let output = migrate(workdir.path(), &["status"], None);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("DB_URL"));
}

#[test]
fn test_up_status_down_through_binary() {
    let workdir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", workdir.path().join("cli.db").display());
    let dir = shipped_migrations_dir();
    let dir = dir.to_string_lossy().into_owned();

    let output = migrate(workdir.path(), &["status"], Some(url.as_str()));
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains("Migrations table does not exist. No migrations have been run."));

    let output = migrate(workdir.path(), &["--dir", dir.as_str(), "up"], Some(url.as_str()));
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains("Applied migration: 001_initial_schema"));

    let output = migrate(workdir.path(), &["status"], Some(url.as_str()));
    assert!(String::from_utf8_lossy(&output.stdout).contains("  001_initial_schema (applied at: "));

    let output = migrate(workdir.path(), &["--dir", dir.as_str(), "down"], Some(url.as_str()));
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains("Rolled back migration: 001_initial_schema"));
}
