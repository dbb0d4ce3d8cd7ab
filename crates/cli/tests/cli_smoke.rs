//! CLI smoke tests for sitevault.
//!
//! These tests verify that every command parses, prints help and fails
//! cleanly on bad input.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn sitevault_cmd(data: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("sitevault");
  cmd.env("SITEVAULT_DATA_DIR", data.path());
  cmd.env_remove("RUST_LOG");
  cmd
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  let data = TempDir::new().unwrap();
  sitevault_cmd(&data)
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  let data = TempDir::new().unwrap();
  sitevault_cmd(&data)
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("sitevault"));
}

#[test]
fn subcommand_help_works() {
  let data = TempDir::new().unwrap();
  for cmd in &[
    "website", "env", "domain", "bundle", "import", "promote", "rollback", "activate", "status", "gc",
  ] {
    sitevault_cmd(&data)
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn unknown_subcommand_fails() {
  let data = TempDir::new().unwrap();
  sitevault_cmd(&data).arg("deploy").assert().failure();
}

// =============================================================================
// Data directory
// =============================================================================

#[test]
fn data_dir_flag_overrides_environment() {
  let env_data = TempDir::new().unwrap();
  let flag_data = TempDir::new().unwrap();

  sitevault_cmd(&env_data)
    .arg("--data-dir")
    .arg(flag_data.path())
    .args(["website", "create", "futurelab"])
    .assert()
    .success();

  assert!(flag_data.path().join("db.json").exists());
  assert!(!env_data.path().join("db.json").exists());
}

#[test]
fn corrupt_metadata_store_is_reported() {
  let data = TempDir::new().unwrap();
  std::fs::write(data.path().join("db.json"), "{not json").unwrap();

  sitevault_cmd(&data)
    .args(["website", "list"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to open metadata store"));
}

#[test]
fn invalid_website_name_is_rejected() {
  let data = TempDir::new().unwrap();
  sitevault_cmd(&data)
    .args(["website", "create", "../escape"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid website name"));
}
