//! Per-environment advisory locking.
//!
//! Promotion, rollback and import into an environment take an exclusive lock
//! on `envs/<env>/.lock` for their whole duration. The lock is non-blocking: a
//! second writer fails immediately with the holder's details.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::flock::try_lock_exclusive;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub operation: String,
  pub env_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "environment is locked by another operation: {operation} (PID {pid}, started {started_at})\n\
     If you're sure no sitevault process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    operation: String,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "environment is locked (could not read lock metadata)\n\
     If you're sure no sitevault process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("create environment directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("open lock file {path}: {source}")]
  OpenFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Exclusive lock on one environment, released on drop.
#[derive(Debug)]
pub struct EnvLock {
  file: File,
  lock_path: PathBuf,
}

impl EnvLock {
  pub fn acquire(env_dir: &Path, lock_path: &Path, operation: &str) -> Result<Self, LockError> {
    std::fs::create_dir_all(env_dir).map_err(|source| LockError::CreateDir {
      path: env_dir.to_path_buf(),
      source,
    })?;

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(lock_path)
      .map_err(|source| LockError::OpenFile {
        path: lock_path.to_path_buf(),
        source,
      })?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(read_contention_error(lock_path));
      }
      return Err(LockError::LockFailed(err));
    }

    write_metadata(&file, operation, env_dir)?;
    Ok(EnvLock {
      file,
      lock_path: lock_path.to_path_buf(),
    })
  }

  /// Reads the lock metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, operation: &str, env_dir: &Path) -> Result<(), LockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    operation: operation.to_string(),
    env_dir: env_dir.to_path_buf(),
  };

  file.set_len(0).map_err(LockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| LockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(LockError::WriteMetadata)?;
  Ok(())
}

fn read_contention_error(lock_path: &Path) -> LockError {
  if let Ok(mut file) = File::open(lock_path) {
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_ok()
      && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
      let started_at = UNIX_EPOCH + std::time::Duration::from_secs(metadata.started_at_unix);
      return LockError::Contention {
        operation: metadata.operation,
        pid: metadata.pid,
        started_at: humantime::format_rfc3339_seconds(started_at).to_string(),
        lock_path: lock_path.to_path_buf(),
      };
    }
  }

  LockError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}
