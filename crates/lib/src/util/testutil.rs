//! Test utilities for sitevault-lib.
//!
//! Cross-platform filesystem helpers and fixtures shared by the release,
//! bundle and metadata store tests.

use std::path::{Path, PathBuf};

use crate::ctx::OpContext;
use crate::db::{EnvironmentRow, JsonMetadataStore, MetadataStore, ReleaseRow};

/// Cross-platform symlink creation helper.
pub fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  #[cfg(unix)]
  {
    std::os::unix::fs::symlink(target, link)
  }
  #[cfg(windows)]
  {
    std::os::windows::fs::symlink_file(target, link)
  }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
  let path = root.join(rel);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// A website `futurelab` with `staging` and `prod` environments backed by a
/// JSON metadata store inside a temp directory.
pub struct PromotionFixture {
  pub temp: tempfile::TempDir,
  pub db: JsonMetadataStore,
  pub websites_root: PathBuf,
  pub website_id: i64,
  pub source_env_id: i64,
  pub target_env_id: i64,
}

impl PromotionFixture {
  pub fn new() -> Self {
    let temp = tempfile::tempdir().unwrap();
    let websites_root = temp.path().join("websites");
    std::fs::create_dir_all(&websites_root).unwrap();
    let db = JsonMetadataStore::open(temp.path().join("db.json")).unwrap();

    let website = db.create_website("futurelab").unwrap();
    let staging = db.create_environment(website.id, "staging").unwrap();
    let prod = db.create_environment(website.id, "prod").unwrap();

    Self {
      temp,
      db,
      websites_root,
      website_id: website.id,
      source_env_id: staging.id,
      target_env_id: prod.id,
    }
  }

  pub fn env_dir(&self, env: &str) -> PathBuf {
    self.websites_root.join("futurelab").join("envs").join(env)
  }

  pub fn release_dir(&self, env: &str, release_id: &str) -> PathBuf {
    self.env_dir(env).join("releases").join(release_id)
  }

  pub fn env(&self, name: &str) -> EnvironmentRow {
    self
      .db
      .get_environment_by_name(&OpContext::background(), self.website_id, name)
      .unwrap()
      .unwrap()
  }

  /// Seed an active release in `env` with three content files and metadata.
  ///
  /// `output_hashes` is stored verbatim on the release row; pass an empty
  /// string to store the hashes computed from the seeded files.
  pub fn seed_release(&self, env: &str, release_id: &str, output_hashes: &str) -> PathBuf {
    let ctx = OpContext::background();
    let env_row = self.env(env);
    let dir = self.release_dir(env, release_id);
    write_file(&dir, "index.html", "<!doctype html><h1>hello</h1>\n");
    write_file(&dir, "styles/default.css", "body { color: #111; }\n");
    write_file(&dir, "assets/logo.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>\n");
    let manifest = format!("{{\"website\":\"futurelab\",\"environment\":\"{}\"}}", env);
    write_file(&dir, ".manifest.json", &manifest);
    write_file(&dir, ".build-log.txt", "built\n");

    let hashes = if output_hashes.is_empty() {
      let computed = crate::release::hashes::compute_promotion_hashes(&dir).unwrap();
      serde_json::to_string_pretty(&computed).unwrap()
    } else {
      output_hashes.to_string()
    };
    std::fs::write(dir.join(".output-hashes.json"), &hashes).unwrap();

    self
      .db
      .insert_release(
        &ctx,
        &ReleaseRow {
          id: release_id.to_string(),
          environment_id: env_row.id,
          manifest_json: manifest,
          output_hashes: hashes,
          build_log: "built\n".to_string(),
          status: "active".to_string(),
          created_at: String::new(),
        },
      )
      .unwrap();
    self
      .db
      .update_environment_active_release(&ctx, env_row.id, Some(release_id))
      .unwrap();
    crate::release::symlink::switch_current_symlink(&self.env_dir(env), release_id).unwrap();

    dir
  }

  pub fn seed_source_release(&self, release_id: &str, output_hashes: &str) -> PathBuf {
    self.seed_release("staging", release_id, output_hashes)
  }
}
