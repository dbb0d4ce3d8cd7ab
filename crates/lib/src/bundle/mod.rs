//! Bundle archive codec.
//!
//! A bundle is a tar stream carrying `manifest.json` plus every file the
//! manifest references. Archive content is untrusted: [`read_tar`] only hands
//! back files after proving each one hashes to the value its manifest declares.

mod archive;
mod ingest;

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::manifest::{Manifest, ManifestError};
use crate::util::hash::HashError;
use crate::util::relpath::RelPathError;

pub use archive::{build_tar, read_tar};
pub use ingest::{IngestError, IngestStats, ingest_bundle};

/// A decoded and verified bundle.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
  pub manifest: Manifest,
  /// Archive content keyed by cleaned relative path.
  pub files: BTreeMap<String, Vec<u8>>,
  /// Archive members no manifest resource references, sorted.
  pub extra_files: Vec<String>,
}

/// Every integrity problem found in a bundle, collected in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
  pub missing_files: Vec<String>,
  pub hash_mismatches: Vec<String>,
}

impl ValidationError {
  pub fn is_empty(&self) -> bool {
    self.missing_files.is_empty() && self.hash_mismatches.is_empty()
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut parts = Vec::with_capacity(2);
    if !self.missing_files.is_empty() {
      parts.push(format!("missing files: {}", self.missing_files.join(", ")));
    }
    if !self.hash_mismatches.is_empty() {
      parts.push(format!("hash mismatches: {}", self.hash_mismatches.join(", ")));
    }
    if parts.is_empty() {
      return f.write_str("invalid bundle");
    }
    f.write_str(&parts.join("; "))
  }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Error)]
pub enum BundleError {
  #[error("read tar entry: {0}")]
  ReadEntry(#[source] io::Error),

  #[error("unsupported tar entry type for {path:?}")]
  UnsupportedEntryType { path: String },

  #[error("invalid tar path {path:?}: {source}")]
  InvalidPath {
    path: String,
    #[source]
    source: RelPathError,
  },

  #[error("duplicate tar entry {0:?}")]
  DuplicateEntry(String),

  #[error("bundle is missing manifest.json")]
  MissingManifest,

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error("manifest resource {resource:?} file {file:?}: {source}")]
  InvalidHash {
    resource: String,
    file: String,
    #[source]
    source: HashError,
  },

  #[error("manifest defines conflicting hashes for {0:?}")]
  ConflictingHashes(String),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("write tar entry {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("marshal manifest: {0}")]
  Serialize(#[source] serde_json::Error),
}
