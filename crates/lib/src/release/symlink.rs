//! Atomic activation of an environment's `current` symlink.
//!
//! The link is always replaced by creating `.current.tmp` and renaming it over
//! `current`, so readers observe either the old target or the new one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::layout::release_link_target;
use crate::consts::{CURRENT_LINK, CURRENT_TMP_LINK};

#[derive(Debug, Error)]
pub enum SymlinkError {
  #[error("release id is required")]
  MissingReleaseId,

  #[error("remove current symlink {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("create temp symlink {path} -> {target}: {source}")]
  CreateTemp {
    path: PathBuf,
    target: String,
    #[source]
    source: io::Error,
  },

  #[error("activate current symlink {path} -> {target}: {source}")]
  Activate {
    path: PathBuf,
    target: String,
    #[source]
    source: io::Error,
  },

  #[error("read current symlink {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Point `env_dir/current` at `releases/<release_id>`.
pub fn switch_current_symlink(env_dir: &Path, release_id: &str) -> Result<(), SymlinkError> {
  if release_id.is_empty() {
    return Err(SymlinkError::MissingReleaseId);
  }
  set_current_target(env_dir, Some(&release_link_target(release_id)))
}

/// Retarget `env_dir/current` to `target`, or remove it when `target` is `None`.
pub fn set_current_target(env_dir: &Path, target: Option<&str>) -> Result<(), SymlinkError> {
  let current = env_dir.join(CURRENT_LINK);
  let Some(target) = target.filter(|t| !t.is_empty()) else {
    return match fs::remove_file(&current) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(SymlinkError::Remove { path: current, source }),
    };
  };

  let tmp = env_dir.join(CURRENT_TMP_LINK);
  match fs::remove_file(&tmp) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(source) => return Err(SymlinkError::Remove { path: tmp, source }),
  }

  create_dir_symlink(Path::new(target), &tmp).map_err(|source| SymlinkError::CreateTemp {
    path: tmp.clone(),
    target: target.to_string(),
    source,
  })?;

  if let Err(source) = fs::rename(&tmp, &current) {
    let _ = fs::remove_file(&tmp);
    return Err(SymlinkError::Activate {
      path: current,
      target: target.to_string(),
      source,
    });
  }
  Ok(())
}

/// Target of `env_dir/current`, or `None` when the link does not exist.
pub fn read_current_target(env_dir: &Path) -> Result<Option<String>, SymlinkError> {
  let current = env_dir.join(CURRENT_LINK);
  match fs::read_link(&current) {
    Ok(target) => Ok(Some(target.to_string_lossy().replace('\\', "/"))),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(SymlinkError::Read { path: current, source }),
  }
}

#[cfg(unix)]
fn create_dir_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_dir_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_dir(target, link)
}
