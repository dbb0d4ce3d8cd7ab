//! Moving an environment back to an earlier release.
//!
//! Rollback and explicit activation only retarget `current` and the active
//! pointer; release directories are never modified.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::layout::EnvLayout;
use super::lock::{EnvLock, LockError};
use super::symlink::{SymlinkError, read_current_target, set_current_target, switch_current_symlink};
use crate::consts::RELEASE_STATUS_FAILED;
use crate::ctx::{ContextError, OpContext};
use crate::db::{DbError, EnvironmentRow, MetadataStore, WebsiteRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackResult {
  pub environment_id: i64,
  pub from_release_id: Option<String>,
  pub to_release_id: String,
}

#[derive(Debug, Error)]
pub enum RollbackError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("website and environment are required")]
  MissingArgument,

  #[error("release id is required")]
  MissingReleaseId,

  #[error("website {0:?} not found")]
  WebsiteNotFound(String),

  #[error("environment {0:?} not found")]
  EnvironmentNotFound(String),

  #[error("release {0:?} not found")]
  ReleaseNotFound(String),

  #[error("release {release_id:?} does not belong to environment {env:?}")]
  ReleaseForeign { release_id: String, env: String },

  #[error("release {0:?} is marked failed")]
  ReleaseFailed(String),

  #[error("no previous release available")]
  NoPreviousRelease,

  #[error("active release {0:?} was not found in release history")]
  ActiveNotInHistory(String),

  #[error("rollback target release directory is missing for release {release_id} at {path}")]
  MissingReleaseDir { release_id: String, path: PathBuf },

  #[error("rollback target release path is not a directory: {0}")]
  NotDirectory(PathBuf),

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
  Symlink(#[from] SymlinkError),
}

impl RollbackError {
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      RollbackError::WebsiteNotFound(_) | RollbackError::EnvironmentNotFound(_) | RollbackError::ReleaseNotFound(_)
    )
  }
}

fn db_err(op: &'static str) -> impl FnOnce(DbError) -> RollbackError {
  move |source| RollbackError::Db { op, source }
}

/// Make the newest non-failed release before the active one active again.
pub fn rollback(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  websites_root: &Path,
  website: &str,
  env: &str,
) -> Result<RollbackResult, RollbackError> {
  let (website_row, env_row) = lookup(ctx, db, website, env)?;
  let active = env_row
    .active_release_id
    .as_deref()
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .ok_or(RollbackError::NoPreviousRelease)?
    .to_string();

  let releases = db
    .list_releases_by_environment(ctx, env_row.id)
    .map_err(db_err("list releases"))?;
  let active_idx = releases
    .iter()
    .position(|r| r.id == active)
    .ok_or_else(|| RollbackError::ActiveNotInHistory(active.clone()))?;
  let target = releases[active_idx + 1..]
    .iter()
    .find(|r| !r.status.trim().eq_ignore_ascii_case(RELEASE_STATUS_FAILED))
    .ok_or(RollbackError::NoPreviousRelease)?;

  let layout = EnvLayout::new(websites_root, &website_row.name, &env_row.name);
  let _lock = EnvLock::acquire(layout.env_dir(), &layout.lock_path(), "rollback")?;
  retarget(ctx, db, &layout, &env_row, &target.id)?;

  info!(website = %website_row.name, env = %env_row.name, from = %active, to = %target.id, "release rolled back");
  Ok(RollbackResult {
    environment_id: env_row.id,
    from_release_id: Some(active),
    to_release_id: target.id.clone(),
  })
}

/// Make an existing release of `env` its active release.
pub fn activate_release(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  websites_root: &Path,
  website: &str,
  env: &str,
  release_id: &str,
) -> Result<RollbackResult, RollbackError> {
  let release_id = release_id.trim();
  if release_id.is_empty() {
    return Err(RollbackError::MissingReleaseId);
  }
  let (website_row, env_row) = lookup(ctx, db, website, env)?;
  let release = db
    .get_release_by_id(ctx, release_id)
    .map_err(db_err("lookup release"))?
    .ok_or_else(|| RollbackError::ReleaseNotFound(release_id.to_string()))?;
  if release.environment_id != env_row.id {
    return Err(RollbackError::ReleaseForeign {
      release_id: release.id,
      env: env_row.name,
    });
  }
  if release.status.trim().eq_ignore_ascii_case(RELEASE_STATUS_FAILED) {
    return Err(RollbackError::ReleaseFailed(release.id));
  }

  let layout = EnvLayout::new(websites_root, &website_row.name, &env_row.name);
  let _lock = EnvLock::acquire(layout.env_dir(), &layout.lock_path(), "activate")?;
  retarget(ctx, db, &layout, &env_row, &release.id)?;

  info!(website = %website_row.name, env = %env_row.name, release = %release.id, "release activated");
  Ok(RollbackResult {
    environment_id: env_row.id,
    from_release_id: env_row.active_release_id.clone(),
    to_release_id: release.id,
  })
}

fn lookup(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  website: &str,
  env: &str,
) -> Result<(WebsiteRow, EnvironmentRow), RollbackError> {
  ctx.check()?;
  let website = website.trim();
  let env = env.trim();
  if website.is_empty() || env.is_empty() {
    return Err(RollbackError::MissingArgument);
  }
  let website_row = db
    .get_website_by_name(ctx, website)
    .map_err(db_err("lookup website"))?
    .ok_or_else(|| RollbackError::WebsiteNotFound(website.to_string()))?;
  let env_row = db
    .get_environment_by_name(ctx, website_row.id, env)
    .map_err(db_err("lookup environment"))?
    .ok_or_else(|| RollbackError::EnvironmentNotFound(env.to_string()))?;
  Ok((website_row, env_row))
}

/// Switch `current` to `release_id` and update the pointer, restoring the
/// previous link if the pointer update fails.
fn retarget(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  layout: &EnvLayout,
  env_row: &EnvironmentRow,
  release_id: &str,
) -> Result<(), RollbackError> {
  let release_dir = layout.release_dir(release_id);
  match fs::metadata(&release_dir) {
    Ok(meta) if meta.is_dir() => {}
    Ok(_) => return Err(RollbackError::NotDirectory(release_dir)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(RollbackError::MissingReleaseDir {
        release_id: release_id.to_string(),
        path: release_dir,
      });
    }
    Err(source) => return Err(RollbackError::Stat { path: release_dir, source }),
  }

  let previous = read_current_target(layout.env_dir())?;
  ctx.check()?;
  switch_current_symlink(layout.env_dir(), release_id)?;

  if let Err(source) = db.update_environment_active_release(ctx, env_row.id, Some(release_id)) {
    if let Err(e) = set_current_target(layout.env_dir(), previous.as_deref()) {
      warn!(env_dir = %layout.env_dir().display(), error = %e, "failed to restore current symlink");
    }
    return Err(RollbackError::Db {
      op: "update environment active release",
      source,
    });
  }
  Ok(())
}
