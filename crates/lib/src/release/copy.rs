//! Link-or-copy of release content between release directories.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::hashes::is_release_metadata_file;
use crate::ctx::{ContextError, OpContext};
use crate::util::hash::relative_slash_path;

/// Places a file at a new path sharing the source's storage.
///
/// A failed link is not fatal; the caller falls back to a byte copy.
pub trait Linker: Send + Sync {
  fn link(&self, source: &Path, target: &Path) -> io::Result<()>;
}

/// Hard links via the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardLinker;

impl Linker for HardLinker {
  fn link(&self, source: &Path, target: &Path) -> io::Result<()> {
    fs::hard_link(source, target)
  }
}

/// Never links, so every file is byte copied. Used for directories the store
/// does not own.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyOnly;

impl Linker for CopyOnly {
  fn link(&self, _source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
  }
}

/// How promoted files reached the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
  #[serde(rename = "hardlink")]
  Hardlink,
  #[serde(rename = "copy")]
  Copy,
  #[serde(rename = "hardlink+copy")]
  Mixed,
}

impl Strategy {
  pub fn as_str(self) -> &'static str {
    match self {
      Strategy::Hardlink => "hardlink",
      Strategy::Copy => "copy",
      Strategy::Mixed => "hardlink+copy",
    }
  }
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
  pub linked: usize,
  pub copied: usize,
  pub file_count: usize,
}

impl CopyStats {
  /// `Hardlink` when nothing was copied, `Copy` when nothing was linked.
  pub fn strategy(&self) -> Strategy {
    if self.copied == 0 {
      Strategy::Hardlink
    } else if self.linked == 0 {
      Strategy::Copy
    } else {
      Strategy::Mixed
    }
  }
}

#[derive(Debug, Error)]
pub enum CopyError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("walk release content {root}: {source}")]
  Walk {
    root: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("create target directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("read source symlink {path}: {source}")]
  ReadLink {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("create target symlink {path}: {source}")]
  Symlink {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("copy target file {path}: {source}")]
  CopyFile {
    path: String,
    #[source]
    source: io::Error,
  },
}

/// Place every content file of `source_root` at the same relative path below
/// `target_root`.
///
/// Release metadata files are skipped. Symlinks are recreated with their
/// original target and count as copied. Other files are linked through
/// `linker`, falling back to a byte copy that keeps the source permissions.
pub fn copy_release_content(
  ctx: &OpContext,
  linker: &dyn Linker,
  source_root: &Path,
  target_root: &Path,
) -> Result<CopyStats, CopyError> {
  let mut stats = CopyStats::default();
  fs::create_dir_all(target_root).map_err(|source| CopyError::CreateDir {
    path: target_root.to_path_buf(),
    source,
  })?;

  for entry in WalkDir::new(source_root).sort_by_file_name() {
    ctx.check()?;
    let entry = entry.map_err(|source| CopyError::Walk {
      root: source_root.to_path_buf(),
      source,
    })?;
    let rel = relative_slash_path(source_root, entry.path());
    if rel.is_empty() {
      continue;
    }
    let target = target_root.join(&rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target).map_err(|source| CopyError::CreateDir { path: target, source })?;
      continue;
    }
    if is_release_metadata_file(&rel) {
      continue;
    }

    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).map_err(|source| CopyError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    stats.file_count += 1;
    if entry.path_is_symlink() {
      let link_target = fs::read_link(entry.path()).map_err(|source| CopyError::ReadLink {
        path: rel.clone(),
        source,
      })?;
      create_symlink(&link_target, &target).map_err(|source| CopyError::Symlink { path: rel, source })?;
      stats.copied += 1;
      continue;
    }

    match linker.link(entry.path(), &target) {
      Ok(()) => stats.linked += 1,
      Err(e) => {
        debug!(path = %rel, error = %e, "link failed, copying");
        copy_file(entry.path(), &target).map_err(|source| CopyError::CopyFile { path: rel, source })?;
        stats.copied += 1;
      }
    }
  }

  Ok(stats)
}

/// Byte copy that keeps the source file's permissions.
pub fn copy_file(source: &Path, target: &Path) -> io::Result<u64> {
  // fs::copy carries permission bits over on every platform.
  fs::copy(source, target)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}
