//! Creating a release from a plain directory of site output.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::copy::{CopyError, CopyOnly, copy_release_content};
use super::hashes::{HashMismatch, compare_promotion_hashes, compute_output_hashes, compute_promotion_hashes, expected_from, promotion_digest};
use super::id::{ReleaseIdError, ReleaseIdSource, default_id_source};
use super::layout::EnvLayout;
use super::lock::{EnvLock, LockError};
use super::metadata::{MetadataError, imported_build_log, imported_manifest_json};
use super::stage::{StageError, StagedRelease};
use crate::consts::{BUILD_LOG_METADATA_FILE, MANIFEST_METADATA_FILE, OUTPUT_HASHES_METADATA_FILE, RELEASE_STATUS_ACTIVE};
use crate::ctx::{ContextError, OpContext};
use crate::db::{DbError, MetadataStore, ReleaseRow};
use crate::util::hash::{ContentHash, DirHashError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
  pub environment_id: i64,
  pub release_id: String,
  pub file_count: usize,
  pub hash: ContentHash,
}

#[derive(Debug, Error)]
pub enum ImportError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("website and environment are required")]
  MissingArgument,

  #[error("website {0:?} not found")]
  WebsiteNotFound(String),

  #[error("environment {0:?} not found")]
  EnvironmentNotFound(String),

  #[error("import source does not exist: {0}")]
  SourceMissing(PathBuf),

  #[error("import source is not a directory: {0}")]
  SourceNotDirectory(PathBuf),

  #[error("import source has no files: {0}")]
  SourceEmpty(PathBuf),

  #[error("stat import source {path}: {source}")]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{op}: {source}")]
  Db {
    op: &'static str,
    #[source]
    source: DbError,
  },

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  ReleaseId(#[from] ReleaseIdError),

  #[error(transparent)]
  Stage(#[from] StageError),

  #[error(transparent)]
  Hash(#[from] DirHashError),

  #[error(transparent)]
  Copy(#[from] CopyError),

  #[error("imported copy differs from source: {0}")]
  HashMismatch(HashMismatch),

  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error("marshal output hashes: {0}")]
  SerializeHashes(#[source] serde_json::Error),

  #[error("write {name}: {source}")]
  WriteMetadata {
    name: &'static str,
    #[source]
    source: io::Error,
  },
}

impl ImportError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ImportError::WebsiteNotFound(_) | ImportError::EnvironmentNotFound(_))
  }
}

fn db_err(op: &'static str) -> impl FnOnce(DbError) -> ImportError {
  move |source| ImportError::Db { op, source }
}

/// Copy `source_dir` into a new release of `env` and activate it.
///
/// Files are always byte copied; release metadata files found in the source
/// are ignored and regenerated.
pub fn import_directory(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  websites_root: &Path,
  website: &str,
  env: &str,
  source_dir: &Path,
) -> Result<ImportResult, ImportError> {
  import_with_ids(ctx, db, websites_root, website, env, source_dir, default_id_source())
}

pub(crate) fn import_with_ids(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  websites_root: &Path,
  website: &str,
  env: &str,
  source_dir: &Path,
  ids: &dyn ReleaseIdSource,
) -> Result<ImportResult, ImportError> {
  ctx.check()?;
  let website = website.trim();
  let env = env.trim();
  if website.is_empty() || env.is_empty() {
    return Err(ImportError::MissingArgument);
  }
  let website_row = db
    .get_website_by_name(ctx, website)
    .map_err(db_err("lookup website"))?
    .ok_or_else(|| ImportError::WebsiteNotFound(website.to_string()))?;
  let env_row = db
    .get_environment_by_name(ctx, website_row.id, env)
    .map_err(db_err("lookup environment"))?
    .ok_or_else(|| ImportError::EnvironmentNotFound(env.to_string()))?;

  match fs::metadata(source_dir) {
    Ok(meta) if meta.is_dir() => {}
    Ok(_) => return Err(ImportError::SourceNotDirectory(source_dir.to_path_buf())),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(ImportError::SourceMissing(source_dir.to_path_buf()));
    }
    Err(source) => {
      return Err(ImportError::Stat {
        path: source_dir.to_path_buf(),
        source,
      });
    }
  }
  let expected = compute_promotion_hashes(source_dir)?;
  if expected.is_empty() {
    return Err(ImportError::SourceEmpty(source_dir.to_path_buf()));
  }

  let layout = EnvLayout::new(websites_root, &website_row.name, &env_row.name);
  let _lock = EnvLock::acquire(layout.env_dir(), &layout.lock_path(), "import")?;
  let release_id = ids.next_id(SystemTime::now())?;
  let mut staged = StagedRelease::prepare(&layout, &release_id)?;

  let result = (|| -> Result<ImportResult, ImportError> {
    let staging = staged.staging_dir().to_path_buf();
    let stats = copy_release_content(ctx, &CopyOnly, source_dir, &staging)?;
    let actual = compute_promotion_hashes(&staging)?;
    if let Some(mismatch) = compare_promotion_hashes(&expected_from(&expected), &actual) {
      return Err(ImportError::HashMismatch(mismatch));
    }

    let now = SystemTime::now();
    let manifest_json = imported_manifest_json(&website_row.name, &env_row.name, &release_id, stats.file_count, now)?;
    let build_log = imported_build_log(&release_id, &source_dir.display().to_string(), now);
    write_metadata(&staging, MANIFEST_METADATA_FILE, manifest_json.as_bytes())?;
    write_metadata(&staging, BUILD_LOG_METADATA_FILE, build_log.as_bytes())?;
    let output_hashes = compute_output_hashes(&staging)?;
    let output_hashes_json = serde_json::to_string_pretty(&output_hashes).map_err(ImportError::SerializeHashes)?;
    write_metadata(&staging, OUTPUT_HASHES_METADATA_FILE, output_hashes_json.as_bytes())?;

    let row = ReleaseRow {
      id: release_id.clone(),
      environment_id: env_row.id,
      manifest_json,
      output_hashes: output_hashes_json,
      build_log,
      status: RELEASE_STATUS_ACTIVE.to_string(),
      created_at: String::new(),
    };
    staged.commit(ctx, db, &row)?;

    Ok(ImportResult {
      environment_id: env_row.id,
      release_id: release_id.clone(),
      file_count: stats.file_count,
      hash: promotion_digest(&actual),
    })
  })();

  match result {
    Ok(result) => {
      info!(
        website = %website_row.name,
        env = %env_row.name,
        release = %result.release_id,
        files = result.file_count,
        source = %source_dir.display(),
        "release imported"
      );
      Ok(result)
    }
    Err(e) => {
      staged.undo(db);
      Err(e)
    }
  }
}

fn write_metadata(dir: &Path, name: &'static str, content: &[u8]) -> Result<(), ImportError> {
  fs::write(dir.join(name), content).map_err(|source| ImportError::WriteMetadata { name, source })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::release::hashes::load_source_hashes;
  use crate::release::id::UlidGenerator;
  use crate::release::symlink::read_current_target;
  use crate::util::testutil::{PromotionFixture, write_file};

  fn site(fix: &PromotionFixture) -> PathBuf {
    let dir = fix.temp.path().join("out");
    write_file(&dir, "index.html", "<h1>home</h1>");
    write_file(&dir, "blog/post.html", "<p>post</p>");
    write_file(&dir, ".manifest.json", "{\"stale\":true}");
    dir
  }

  #[test]
  fn import_creates_active_release() {
    let fix = PromotionFixture::new();
    let source = site(&fix);
    let ctx = OpContext::background();

    let result = import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", &source).unwrap();
    assert_eq!(result.file_count, 2);
    assert_eq!(result.environment_id, fix.source_env_id);

    let dir = fix.release_dir("staging", &result.release_id);
    assert_eq!(fs::read_to_string(dir.join("blog/post.html")).unwrap(), "<p>post</p>");
    let manifest: serde_json::Value =
      serde_json::from_str(&fs::read_to_string(dir.join(MANIFEST_METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(manifest["releaseId"], result.release_id.as_str());
    assert_eq!(manifest["fileCount"], 2);
    assert!(manifest.get("stale").is_none());

    assert_eq!(
      read_current_target(&fix.env_dir("staging")).unwrap(),
      Some(format!("releases/{}", result.release_id))
    );
    assert_eq!(
      fix.env("staging").active_release_id.as_deref(),
      Some(result.release_id.as_str())
    );

    let row = fix.db.get_release_by_id(&ctx, &result.release_id).unwrap().unwrap();
    let hashes = load_source_hashes(&row.output_hashes).unwrap();
    assert_eq!(hashes.len(), 2);
    // Source files are copied, never linked into the store.
    fs::write(source.join("index.html"), "changed").unwrap();
    assert_eq!(fs::read_to_string(dir.join("index.html")).unwrap(), "<h1>home</h1>");
  }

  #[test]
  fn imported_release_can_be_promoted() {
    let fix = PromotionFixture::new();
    let source = site(&fix);
    let ctx = OpContext::background();
    let imported = import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", &source).unwrap();

    let promoted = crate::release::promote(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", "prod").unwrap();
    assert_eq!(promoted.source_release_id, imported.release_id);
    assert_eq!(promoted.hash, imported.hash);
  }

  #[test]
  fn source_validation() {
    let fix = PromotionFixture::new();
    let ctx = OpContext::background();
    let missing = fix.temp.path().join("nope");
    assert!(matches!(
      import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", &missing),
      Err(ImportError::SourceMissing(_))
    ));

    let file = fix.temp.path().join("file.txt");
    fs::write(&file, "x").unwrap();
    assert!(matches!(
      import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", &file),
      Err(ImportError::SourceNotDirectory(_))
    ));

    let empty = fix.temp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    assert!(matches!(
      import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", &empty),
      Err(ImportError::SourceEmpty(_))
    ));

    let err = import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "qa", &empty).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
      import_directory(&ctx, &fix.db, &fix.websites_root, "", "staging", &empty),
      Err(ImportError::MissingArgument)
    ));
  }

  #[test]
  fn existing_release_directory_aborts_without_changes() {
    struct Fixed;
    impl ReleaseIdSource for Fixed {
      fn next_id(&self, _now: SystemTime) -> Result<String, ReleaseIdError> {
        Ok("01ARZ3NDEKTSV4RRFFQ69G5FAA".to_string())
      }
    }

    let fix = PromotionFixture::new();
    fix.seed_release("staging", "01ARZ3NDEKTSV4RRFFQ69G5FAA", "");
    let source = site(&fix);
    let err = import_with_ids(
      &OpContext::background(),
      &fix.db,
      &fix.websites_root,
      "futurelab",
      "staging",
      &source,
      &Fixed,
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::Stage(StageError::TargetExists(_))));
    assert_eq!(
      fix.env("staging").active_release_id.as_deref(),
      Some("01ARZ3NDEKTSV4RRFFQ69G5FAA")
    );

    // A fresh generator gets past the collision.
    let generator = UlidGenerator::new();
    import_with_ids(
      &OpContext::background(),
      &fix.db,
      &fix.websites_root,
      "futurelab",
      "staging",
      &source,
      &generator,
    )
    .unwrap();
  }

  #[test]
  fn cancelled_import_leaves_no_release() {
    let fix = PromotionFixture::new();
    let source = site(&fix);
    let ctx = OpContext::background();
    ctx.cancel();
    assert!(matches!(
      import_directory(&ctx, &fix.db, &fix.websites_root, "futurelab", "staging", &source),
      Err(ImportError::Context(_))
    ));
    assert!(fix.env("staging").active_release_id.is_none());
  }
}
