//! Staging directories for new releases and their activation.
//!
//! A new release is assembled in `releases/<id>.tmp`, then committed: renamed
//! to `releases/<id>`, made the `current` target and recorded as the
//! environment's active release. [`StagedRelease::undo`] reverts whatever part
//! of that sequence already happened.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::layout::EnvLayout;
use super::symlink::{SymlinkError, read_current_target, set_current_target, switch_current_symlink};
use crate::consts::RELEASE_STATUS_FAILED;
use crate::ctx::{ContextError, OpContext};
use crate::db::{DbError, MetadataStore, ReleaseRow};

#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("create releases directory {path}: {source}")]
  CreateReleasesDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("target release directory already exists: {0}")]
  TargetExists(PathBuf),

  #[error("stat target release directory {path}: {source}")]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("finalize release directory {path}: {source}")]
  Finalize {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Symlink(#[from] SymlinkError),

  #[error("{op}: {source}")]
  Db {
    op: &'static str,
    #[source]
    source: DbError,
  },
}

/// A release being assembled, plus what committing it has changed so far.
#[derive(Debug)]
pub(crate) struct StagedRelease {
  release_id: String,
  env_dir: PathBuf,
  previous_target: Option<String>,
  staging_dir: PathBuf,
  final_dir: PathBuf,
  finalized: bool,
  switched: bool,
  recorded: bool,
}

impl StagedRelease {
  /// Reserve `release_id` in the environment and clear any stale staging dir.
  pub(crate) fn prepare(layout: &EnvLayout, release_id: &str) -> Result<Self, StageError> {
    let releases_dir = layout.releases_dir();
    fs::create_dir_all(&releases_dir).map_err(|source| StageError::CreateReleasesDir {
      path: releases_dir,
      source,
    })?;

    let final_dir = layout.release_dir(release_id);
    match fs::symlink_metadata(&final_dir) {
      Ok(_) => return Err(StageError::TargetExists(final_dir)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => return Err(StageError::Stat { path: final_dir, source }),
    }
    let staging_dir = layout.staging_dir(release_id);
    let _ = fs::remove_dir_all(&staging_dir);

    Ok(Self {
      release_id: release_id.to_string(),
      env_dir: layout.env_dir().to_path_buf(),
      previous_target: read_current_target(layout.env_dir())?,
      staging_dir,
      final_dir,
      finalized: false,
      switched: false,
      recorded: false,
    })
  }

  pub(crate) fn staging_dir(&self) -> &Path {
    &self.staging_dir
  }

  /// Move the staged content into place and make it the active release.
  ///
  /// The row and the environment pointer are recorded after `current`
  /// already points at the new release, so a reader following the pointer
  /// always finds the directory.
  pub(crate) fn commit(&mut self, ctx: &OpContext, db: &dyn MetadataStore, row: &ReleaseRow) -> Result<(), StageError> {
    ctx.check()?;
    fs::rename(&self.staging_dir, &self.final_dir).map_err(|source| StageError::Finalize {
      path: self.final_dir.clone(),
      source,
    })?;
    self.finalized = true;

    switch_current_symlink(&self.env_dir, &self.release_id)?;
    self.switched = true;

    // Stores without an atomic activation may have inserted the row before
    // failing, so undo has to look for it.
    self.recorded = true;
    db.record_activation(ctx, row).map_err(|source| StageError::Db {
      op: "record release activation",
      source,
    })
  }

  /// Revert a failed attempt. Cleanup failures are logged, not returned.
  pub(crate) fn undo(&self, db: &dyn MetadataStore) {
    if let Err(e) = fs::remove_dir_all(&self.staging_dir)
      && e.kind() != io::ErrorKind::NotFound
    {
      warn!(path = %self.staging_dir.display(), error = %e, "failed to remove staging directory");
    }
    if self.switched
      && let Err(e) = set_current_target(&self.env_dir, self.previous_target.as_deref())
    {
      warn!(env_dir = %self.env_dir.display(), error = %e, "failed to restore current symlink");
    }
    if self.finalized
      && let Err(e) = fs::remove_dir_all(&self.final_dir)
    {
      warn!(path = %self.final_dir.display(), error = %e, "failed to remove release directory");
    }
    // The row stays for the audit trail but must never be rolled back to.
    if self.recorded {
      match db.update_release_status(&OpContext::background(), &self.release_id, RELEASE_STATUS_FAILED) {
        Ok(()) | Err(DbError::NotFound(_)) => {}
        Err(e) => warn!(release = %self.release_id, error = %e, "failed to mark release as failed"),
      }
    }
  }
}
