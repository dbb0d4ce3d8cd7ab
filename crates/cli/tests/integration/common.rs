//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own data directory plus a scratch area for site output
/// and bundles.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// A `futurelab` website with `staging` and `prod` environments.
  pub fn with_site() -> Self {
    let env = Self::empty();
    env.run(&["website", "create", "futurelab"]);
    env.run(&["env", "create", "futurelab", "staging"]);
    env.run(&["env", "create", "futurelab", "prod"]);
    env
  }

  pub fn data_path(&self) -> PathBuf {
    let p = self.temp.path().join("data");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn env_dir(&self, env: &str) -> PathBuf {
    self.data_path().join("websites").join("futurelab").join("envs").join(env)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// A rendered site directory with a versioned home page.
  pub fn site_output(&self, name: &str, version: &str) -> PathBuf {
    self.write_file(&format!("{}/index.html", name), &format!("<h1>{}</h1>", version));
    self.write_file(&format!("{}/styles/default.css", name), "body{}");
    self.temp.path().join(name)
  }

  /// Get a pre-configured Command for the sitevault binary.
  pub fn cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("sitevault");
    cmd.env("SITEVAULT_DATA_DIR", self.data_path());
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Run a command that must succeed and return its stdout.
  pub fn run(&self, args: &[&str]) -> String {
    let out = self.cmd().args(args).assert().success().get_output().stdout.clone();
    String::from_utf8(out).unwrap()
  }

  /// Run a command with `-o json` and parse its output.
  pub fn run_json(&self, args: &[&str]) -> serde_json::Value {
    let mut args = args.to_vec();
    args.extend(["-o", "json"]);
    serde_json::from_str(&self.run(&args)).unwrap()
  }

  pub fn import(&self, env: &str, dir: &Path) -> String {
    let dir = dir.to_str().unwrap();
    let result = self.run_json(&["import", "futurelab", env, dir]);
    result["release_id"].as_str().unwrap().to_string()
  }

  pub fn current_target(&self, env: &str) -> String {
    std::fs::read_link(self.env_dir(env).join("current"))
      .unwrap()
      .to_string_lossy()
      .replace('\\', "/")
  }
}
