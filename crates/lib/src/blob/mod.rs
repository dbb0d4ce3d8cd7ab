//! Deduplicating content-addressed blob store.
//!
//! Blobs live flat under the store root, named by their 64-character hex
//! digest:
//!
//! ```text
//! {root}/
//! ├── 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! └── ...
//! ```
//!
//! Writes are first-writer-wins: a hash that already exists is never rewritten,
//! because identical hashes imply identical content.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::ctx::{ContextError, OpContext};

#[derive(Debug, Error)]
pub enum BlobError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("invalid hash {0:?}")]
  InvalidHash(String),

  #[error("blob {0} not found")]
  NotFound(String),

  #[error("create blob directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("stat blob {path}: {source}")]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("write temp blob file: {0}")]
  WriteTemp(#[source] io::Error),

  #[error("finalize blob {path}: {source}")]
  Finalize {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("read blob {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone)]
pub struct BlobStore {
  root: PathBuf,
}

impl BlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// On-disk location of a blob. `hash_hex` is not validated.
  pub fn path(&self, hash_hex: &str) -> PathBuf {
    self.root.join(hash_hex)
  }

  /// Store `content` under `hash_hex`.
  ///
  /// Returns `Ok(true)` when a new blob was written and `Ok(false)` when the
  /// hash was already present, including when a concurrent writer of the same
  /// hash finished first. The content is not compared against the hash.
  pub fn put(&self, ctx: &OpContext, hash_hex: &str, content: &[u8]) -> Result<bool, BlobError> {
    ctx.check()?;
    validate_hex(hash_hex)?;
    fs::create_dir_all(&self.root).map_err(|source| BlobError::CreateDir {
      path: self.root.clone(),
      source,
    })?;

    let dst = self.path(hash_hex);
    match fs::metadata(&dst) {
      Ok(_) => {
        debug!(hash = %hash_hex, "blob already present");
        return Ok(false);
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => return Err(BlobError::Stat { path: dst, source }),
    }

    let mut tmp = tempfile::Builder::new()
      .prefix(&format!("{}.tmp-", hash_hex))
      .tempfile_in(&self.root)
      .map_err(BlobError::WriteTemp)?;
    tmp.write_all(content).map_err(BlobError::WriteTemp)?;
    tmp.flush().map_err(BlobError::WriteTemp)?;

    if let Err(err) = tmp.persist(&dst) {
      // The temp file is removed when `err.file` drops.
      if dst.exists() {
        debug!(hash = %hash_hex, "blob written concurrently");
        return Ok(false);
      }
      return Err(BlobError::Finalize {
        path: dst,
        source: err.error,
      });
    }
    Ok(true)
  }

  pub fn contains(&self, hash_hex: &str) -> bool {
    validate_hex(hash_hex).is_ok() && self.path(hash_hex).is_file()
  }

  pub fn get(&self, ctx: &OpContext, hash_hex: &str) -> Result<Vec<u8>, BlobError> {
    ctx.check()?;
    validate_hex(hash_hex)?;
    let path = self.path(hash_hex);
    fs::read(&path).map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        BlobError::NotFound(hash_hex.to_string())
      } else {
        BlobError::Read { path, source }
      }
    })
  }
}

/// Blob names are exactly 64 lowercase hex characters; no prefix or case
/// folding is applied here.
fn validate_hex(hash_hex: &str) -> Result<(), BlobError> {
  let ok = hash_hex.len() == 64 && hash_hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
  if ok {
    Ok(())
  } else {
    Err(BlobError::InvalidHash(hash_hex.to_string()))
  }
}
