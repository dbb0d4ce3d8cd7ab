//! Removal of staging directories left behind by interrupted operations.
//!
//! Promotion and import assemble releases in `releases/<id>.tmp` and remove
//! them on failure. A process killed midway leaves the directory behind; the
//! sweep reclaims it. Environments whose lock is held are skipped, since their
//! staging directory may belong to a running operation.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use std::{fs, io};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::consts::STAGING_SUFFIX;
use crate::release::layout::EnvLayout;
use crate::release::lock::{EnvLock, LockError};

#[derive(Debug, Error)]
pub enum GcError {
  #[error("failed to read {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
  /// Report what would be removed without deleting anything.
  pub dry_run: bool,
  /// Keep staging directories modified more recently than this.
  pub older_than: Option<Duration>,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct SweepStats {
  pub environments_scanned: usize,
  pub environments_skipped: usize,
  pub staging_kept: usize,
  pub staging_deleted: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct SweepResult {
  pub stats: SweepStats,
  pub deleted_paths: Vec<PathBuf>,
}

fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

fn subdirs(path: &Path) -> Result<Vec<(String, PathBuf)>, GcError> {
  let entries = match fs::read_dir(path) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(source) => {
      return Err(GcError::ReadDir {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  let mut dirs: Vec<(String, PathBuf)> = entries
    .flatten()
    .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
    .filter_map(|entry| Some((entry.file_name().to_str()?.to_string(), entry.path())))
    .collect();
  dirs.sort();
  Ok(dirs)
}

/// Remove every `envs/*/releases/*.tmp` directory below `websites_root`.
///
/// With `dry_run` nothing is deleted; the result lists what would be.
pub fn sweep_staging(websites_root: &Path, options: &SweepOptions) -> Result<SweepResult, GcError> {
  let now = SystemTime::now();
  let mut stats = SweepStats::default();
  let mut deleted_paths = Vec::new();

  for (website, website_dir) in subdirs(websites_root)? {
    for (env, _) in subdirs(&website_dir.join("envs"))? {
      let layout = EnvLayout::new(websites_root, &website, &env);
      stats.environments_scanned += 1;
      sweep_env(&layout, options, now, &mut stats, &mut deleted_paths)?;
    }
  }

  info!(
    deleted = stats.staging_deleted,
    skipped = stats.environments_skipped,
    bytes_freed = stats.bytes_freed,
    dry_run = options.dry_run,
    "staging sweep complete"
  );

  Ok(SweepResult { stats, deleted_paths })
}

/// Whether `path` was last modified at least `min_age` before `now`.
/// Unreadable timestamps count as old.
fn is_stale(path: &Path, min_age: Option<Duration>, now: SystemTime) -> bool {
  let Some(min_age) = min_age else {
    return true;
  };
  match fs::metadata(path).and_then(|m| m.modified()) {
    Ok(modified) => now.duration_since(modified).map(|age| age >= min_age).unwrap_or(false),
    Err(_) => true,
  }
}

fn sweep_env(
  layout: &EnvLayout,
  options: &SweepOptions,
  now: SystemTime,
  stats: &mut SweepStats,
  deleted_paths: &mut Vec<PathBuf>,
) -> Result<(), GcError> {
  let staging: Vec<PathBuf> = subdirs(&layout.releases_dir())?
    .into_iter()
    .filter(|(name, _)| name.len() > STAGING_SUFFIX.len() && name.ends_with(STAGING_SUFFIX))
    .map(|(_, path)| path)
    .collect();
  if staging.is_empty() {
    return Ok(());
  }

  let _lock = match EnvLock::acquire(layout.env_dir(), &layout.lock_path(), "gc") {
    Ok(lock) => lock,
    Err(e @ (LockError::Contention { .. } | LockError::ContentionUnknown { .. })) => {
      debug!(env_dir = %layout.env_dir().display(), error = %e, "environment busy, skipping");
      stats.environments_skipped += 1;
      return Ok(());
    }
    Err(e) => {
      warn!(env_dir = %layout.env_dir().display(), error = %e, "failed to lock environment, skipping");
      stats.environments_skipped += 1;
      return Ok(());
    }
  };

  for path in staging {
    if !is_stale(&path, options.older_than, now) {
      debug!(path = %path.display(), "staging directory too recent, keeping");
      stats.staging_kept += 1;
      continue;
    }
    let size = dir_size(&path);
    debug!(path = %path.display(), "removing orphaned staging directory");

    if options.dry_run {
      stats.staging_deleted += 1;
      stats.bytes_freed += size;
      deleted_paths.push(path);
    } else {
      match fs::remove_dir_all(&path) {
        Ok(()) => {
          stats.staging_deleted += 1;
          stats.bytes_freed += size;
          deleted_paths.push(path);
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "failed to delete staging directory");
        }
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_file;

  const RELEASE: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAA";

  fn populated() -> (tempfile::TempDir, EnvLayout) {
    let temp = tempfile::tempdir().unwrap();
    let layout = EnvLayout::new(temp.path(), "futurelab", "prod");
    write_file(&layout.release_dir(RELEASE), "index.html", "kept");
    write_file(&layout.staging_dir("01ARZ3NDEKTSV4RRFFQ69G5FAB"), "index.html", "12345");
    fs::create_dir_all(layout.releases_dir().join(".tmp")).unwrap();
    (temp, layout)
  }

  #[test]
  fn sweep_removes_only_staging_dirs() {
    let (temp, layout) = populated();

    let result = sweep_staging(temp.path(), &SweepOptions::default()).unwrap();
    assert_eq!(result.stats.environments_scanned, 1);
    assert_eq!(result.stats.staging_deleted, 1);
    assert_eq!(result.stats.bytes_freed, 5);
    assert_eq!(result.deleted_paths, vec![layout.staging_dir("01ARZ3NDEKTSV4RRFFQ69G5FAB")]);
    assert!(layout.release_dir(RELEASE).join("index.html").exists());
    assert!(!layout.staging_dir("01ARZ3NDEKTSV4RRFFQ69G5FAB").exists());
  }

  #[test]
  fn dry_run_deletes_nothing() {
    let (temp, layout) = populated();

    let options = SweepOptions {
      dry_run: true,
      ..Default::default()
    };
    let result = sweep_staging(temp.path(), &options).unwrap();
    assert_eq!(result.stats.staging_deleted, 1);
    assert!(layout.staging_dir("01ARZ3NDEKTSV4RRFFQ69G5FAB").exists());
  }

  #[test]
  fn missing_root_is_empty() {
    let temp = tempfile::tempdir().unwrap();
    let result = sweep_staging(&temp.path().join("nope"), &SweepOptions::default()).unwrap();
    assert_eq!(result.stats.environments_scanned, 0);
    assert!(result.deleted_paths.is_empty());
  }

  #[test]
  fn recent_staging_is_kept() {
    let (temp, layout) = populated();

    let options = SweepOptions {
      dry_run: false,
      older_than: Some(Duration::from_secs(3600)),
    };
    let result = sweep_staging(temp.path(), &options).unwrap();
    assert_eq!(result.stats.staging_kept, 1);
    assert_eq!(result.stats.staging_deleted, 0);
    assert!(layout.staging_dir("01ARZ3NDEKTSV4RRFFQ69G5FAB").exists());
  }

  #[test]
  fn staleness_threshold() {
    let temp = tempfile::tempdir().unwrap();
    let now = SystemTime::now() + Duration::from_secs(7200);
    assert!(is_stale(temp.path(), None, SystemTime::now()));
    assert!(is_stale(temp.path(), Some(Duration::from_secs(3600)), now));
    assert!(!is_stale(temp.path(), Some(Duration::from_secs(3 * 3600)), now));
  }

  #[cfg(unix)]
  #[test]
  fn locked_environment_is_skipped() {
    let (temp, layout) = populated();
    let _held = EnvLock::acquire(layout.env_dir(), &layout.lock_path(), "promote").unwrap();

    let result = sweep_staging(temp.path(), &SweepOptions::default()).unwrap();
    assert_eq!(result.stats.environments_skipped, 1);
    assert_eq!(result.stats.staging_deleted, 0);
    assert!(layout.staging_dir("01ARZ3NDEKTSV4RRFFQ69G5FAB").exists());
  }
}
