//! Promotion of an environment's active release into another environment.
//!
//! Content is linked or copied into a staging directory, verified against the
//! source release's hashes and only then activated. Activation renames the
//! staging directory into place, switches `current` and records the release in
//! the metadata store; a failure at any point restores the previous `current`
//! target and removes everything the promotion created.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::copy::{CopyError, HardLinker, Linker, Strategy, copy_release_content};
use super::hashes::{
  HashMismatch, compare_promotion_hashes, compute_output_hashes, compute_promotion_hashes, expected_from,
  load_source_hashes, promotion_digest,
};
use super::id::{ReleaseIdError, ReleaseIdSource, default_id_source};
use super::layout::EnvLayout;
use super::lock::{EnvLock, LockError};
use super::metadata::{MetadataError, promoted_build_log, promoted_manifest_json};
use super::stage::{StageError, StagedRelease};
use super::warnings::collect_promote_warnings;
use crate::consts::{BUILD_LOG_METADATA_FILE, MANIFEST_METADATA_FILE, OUTPUT_HASHES_METADATA_FILE, RELEASE_STATUS_ACTIVE};
use crate::ctx::{ContextError, OpContext};
use crate::db::{DbError, EnvironmentRow, MetadataStore, ReleaseRow, WebsiteRow};
use crate::util::hash::{ContentHash, DirHashError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoteResult {
  pub source_environment_id: i64,
  pub target_environment_id: i64,
  pub source_release_id: String,
  pub release_id: String,
  pub file_count: usize,
  pub hash: ContentHash,
  pub strategy: Strategy,
  pub warnings: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PromoteError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("website, source environment, and target environment are required")]
  MissingArgument,

  #[error("source and target environments must be different")]
  SourceTargetMatch,

  #[error("website {0:?} not found")]
  WebsiteNotFound(String),

  #[error("environment {0:?} not found")]
  EnvironmentNotFound(String),

  #[error("source environment has no active release")]
  SourceNoActive,

  #[error("source release {0:?} not found")]
  SourceReleaseNotFound(String),

  #[error("active source release {release_id:?} does not belong to environment {env:?}")]
  SourceReleaseForeign { release_id: String, env: String },

  #[error("source release directory {0} does not exist")]
  SourceDirMissing(PathBuf),

  #[error("source release path is not a directory: {0}")]
  SourceNotDirectory(PathBuf),

  #[error("stat {path}: {source}")]
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

  #[error("load source release hashes: {0}")]
  LoadSourceHashes(#[source] serde_json::Error),

  #[error("hash promotion files: {0}")]
  Hash(#[from] DirHashError),

  #[error(transparent)]
  Copy(#[from] CopyError),

  #[error("promotion hash verification failed: {0}")]
  HashMismatch(HashMismatch),

  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error("marshal target output hashes: {0}")]
  SerializeHashes(#[source] serde_json::Error),

  #[error("write target {name} metadata: {source}")]
  WriteMetadata {
    name: &'static str,
    #[source]
    source: io::Error,
  },
}

impl PromoteError {
  /// A named website, environment or release does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      PromoteError::WebsiteNotFound(_) | PromoteError::EnvironmentNotFound(_) | PromoteError::SourceReleaseNotFound(_)
    )
  }

  /// The request conflicts with the current state rather than being malformed.
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      PromoteError::SourceTargetMatch
        | PromoteError::SourceNoActive
        | PromoteError::HashMismatch(_)
        | PromoteError::Lock(LockError::Contention { .. } | LockError::ContentionUnknown { .. })
    )
  }
}

fn db_err(op: &'static str) -> impl FnOnce(DbError) -> PromoteError {
  move |source| PromoteError::Db { op, source }
}

/// Promotion engine bound to a metadata store and a websites root.
pub struct Promoter<'a> {
  db: &'a dyn MetadataStore,
  websites_root: &'a Path,
  linker: &'a dyn Linker,
  ids: &'a dyn ReleaseIdSource,
}

impl<'a> Promoter<'a> {
  pub fn new(db: &'a dyn MetadataStore, websites_root: &'a Path) -> Self {
    Self {
      db,
      websites_root,
      linker: &HardLinker,
      ids: default_id_source(),
    }
  }

  pub fn with_linker(mut self, linker: &'a dyn Linker) -> Self {
    self.linker = linker;
    self
  }

  pub fn with_id_source(mut self, ids: &'a dyn ReleaseIdSource) -> Self {
    self.ids = ids;
    self
  }

  /// Promote the active release of `source_env` into `target_env`.
  pub fn promote(
    &self,
    ctx: &OpContext,
    website: &str,
    source_env: &str,
    target_env: &str,
  ) -> Result<PromoteResult, PromoteError> {
    ctx.check()?;
    let website = website.trim();
    let source_env = source_env.trim();
    let target_env = target_env.trim();
    if website.is_empty() || source_env.is_empty() || target_env.is_empty() {
      return Err(PromoteError::MissingArgument);
    }
    if source_env == target_env {
      return Err(PromoteError::SourceTargetMatch);
    }

    let website_row = self
      .db
      .get_website_by_name(ctx, website)
      .map_err(db_err("lookup website"))?
      .ok_or_else(|| PromoteError::WebsiteNotFound(website.to_string()))?;
    let source_row = self.environment(ctx, &website_row, source_env, "lookup source environment")?;
    let target_row = self.environment(ctx, &website_row, target_env, "lookup target environment")?;

    let source_release_id = source_row
      .active_release_id
      .as_deref()
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .ok_or(PromoteError::SourceNoActive)?
      .to_string();
    let source_release = self
      .db
      .get_release_by_id(ctx, &source_release_id)
      .map_err(db_err("lookup source release"))?
      .ok_or_else(|| PromoteError::SourceReleaseNotFound(source_release_id.clone()))?;
    if source_release.environment_id != source_row.id {
      return Err(PromoteError::SourceReleaseForeign {
        release_id: source_release_id,
        env: source_row.name,
      });
    }

    let source_layout = EnvLayout::new(self.websites_root, &website_row.name, &source_row.name);
    let source_dir = source_layout.release_dir(&source_release_id);
    match fs::metadata(&source_dir) {
      Ok(meta) if meta.is_dir() => {}
      Ok(_) => return Err(PromoteError::SourceNotDirectory(source_dir)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(PromoteError::SourceDirMissing(source_dir)),
      Err(source) => return Err(PromoteError::Stat { path: source_dir, source }),
    }

    let mut expected = load_source_hashes(&source_release.output_hashes).map_err(PromoteError::LoadSourceHashes)?;
    if expected.is_empty() {
      debug!(release = %source_release_id, "no stored output hashes, recomputing from source");
      expected = expected_from(&compute_promotion_hashes(&source_dir)?);
    }

    let target_layout = EnvLayout::new(self.websites_root, &website_row.name, &target_row.name);
    let _lock = EnvLock::acquire(target_layout.env_dir(), &target_layout.lock_path(), "promote")?;

    let release_id = self.ids.next_id(SystemTime::now())?;
    let mut staged = StagedRelease::prepare(&target_layout, &release_id)?;

    let plan = Plan {
      source: &source_row,
      target: &target_row,
      source_release: &source_release,
      source_dir: &source_dir,
      release_id: &release_id,
      expected: &expected,
    };
    let mut result = match self.assemble_and_activate(ctx, &plan, &mut staged) {
      Ok(result) => result,
      Err(e) => {
        staged.undo(self.db);
        return Err(e);
      }
    };

    result.warnings = match collect_promote_warnings(
      ctx,
      self.db,
      &website_row.name,
      &source_row.name,
      &target_row.name,
      &source_release.manifest_json,
    ) {
      Ok(warnings) => warnings,
      Err(e) => {
        warn!(release = %release_id, error = %e, "could not check page metadata hosts");
        Vec::new()
      }
    };

    info!(
      website = %website_row.name,
      from = %source_row.name,
      to = %target_row.name,
      source_release = %source_release_id,
      release = %release_id,
      files = result.file_count,
      strategy = %result.strategy,
      "release promoted"
    );
    Ok(result)
  }

  fn environment(
    &self,
    ctx: &OpContext,
    website: &WebsiteRow,
    name: &str,
    op: &'static str,
  ) -> Result<EnvironmentRow, PromoteError> {
    self
      .db
      .get_environment_by_name(ctx, website.id, name)
      .map_err(db_err(op))?
      .ok_or_else(|| PromoteError::EnvironmentNotFound(name.to_string()))
  }

  fn assemble_and_activate(
    &self,
    ctx: &OpContext,
    plan: &Plan<'_>,
    staged: &mut StagedRelease,
  ) -> Result<PromoteResult, PromoteError> {
    let staging = staged.staging_dir().to_path_buf();
    let stats = copy_release_content(ctx, self.linker, plan.source_dir, &staging)?;
    debug!(
      linked = stats.linked,
      copied = stats.copied,
      files = stats.file_count,
      "release content staged"
    );

    let actual = compute_promotion_hashes(&staging)?;
    if let Some(mismatch) = compare_promotion_hashes(plan.expected, &actual) {
      return Err(PromoteError::HashMismatch(mismatch));
    }

    let now = SystemTime::now();
    let manifest_json = promoted_manifest_json(
      &plan.source_release.manifest_json,
      &plan.source.name,
      &plan.target.name,
      &plan.source_release.id,
      now,
    )?;
    let build_log = promoted_build_log(&plan.source_release.id, &plan.source.name, &plan.target.name, now);
    write_metadata(&staging, MANIFEST_METADATA_FILE, manifest_json.as_bytes())?;
    write_metadata(&staging, BUILD_LOG_METADATA_FILE, build_log.as_bytes())?;

    let output_hashes = compute_output_hashes(&staging)?;
    let output_hashes_json = serde_json::to_string_pretty(&output_hashes).map_err(PromoteError::SerializeHashes)?;
    write_metadata(&staging, OUTPUT_HASHES_METADATA_FILE, output_hashes_json.as_bytes())?;

    let row = ReleaseRow {
      id: plan.release_id.to_string(),
      environment_id: plan.target.id,
      manifest_json,
      output_hashes: output_hashes_json,
      build_log,
      status: RELEASE_STATUS_ACTIVE.to_string(),
      created_at: String::new(),
    };
    staged.commit(ctx, self.db, &row)?;

    Ok(PromoteResult {
      source_environment_id: plan.source.id,
      target_environment_id: plan.target.id,
      source_release_id: plan.source_release.id.clone(),
      release_id: plan.release_id.to_string(),
      file_count: stats.file_count,
      hash: promotion_digest(&actual),
      strategy: stats.strategy(),
      warnings: Vec::new(),
    })
  }
}

/// Promote with the default linker and release ID source.
pub fn promote(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  websites_root: &Path,
  website: &str,
  source_env: &str,
  target_env: &str,
) -> Result<PromoteResult, PromoteError> {
  Promoter::new(db, websites_root).promote(ctx, website, source_env, target_env)
}

struct Plan<'p> {
  source: &'p EnvironmentRow,
  target: &'p EnvironmentRow,
  source_release: &'p ReleaseRow,
  source_dir: &'p Path,
  release_id: &'p str,
  expected: &'p BTreeMap<String, String>,
}

fn write_metadata(dir: &Path, name: &'static str, content: &[u8]) -> Result<(), PromoteError> {
  fs::write(dir.join(name), content).map_err(|source| PromoteError::WriteMetadata { name, source })
}
