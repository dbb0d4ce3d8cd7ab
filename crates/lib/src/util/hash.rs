//! Hashing utilities for content-addressed storage and verification.
//!
//! This module provides:
//! - `ContentHash`: a validated SHA-256 digest with one canonical string form
//! - `hash_hex()` / `canonical_hash()`: normalization of user supplied hashes
//! - `hash_tree()`: per-file hashes of a directory
//! - `hash_file()`: Single file hashing
//! - `hash_bytes()`: Arbitrary byte hashing

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::HASH_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
  #[error("invalid hash {value:?}: expected sha256 hex digest")]
  Invalid { value: String },
}

/// Normalize a hash to its 64-character lowercase hex digest.
///
/// Surrounding whitespace is trimmed, case is folded and an optional
/// `sha256:` prefix is removed. Anything that is not exactly 64 hex
/// characters afterwards is rejected.
pub fn hash_hex(raw: &str) -> Result<String, HashError> {
  let lowered = raw.trim().to_ascii_lowercase();
  let hex = lowered.strip_prefix(HASH_PREFIX).unwrap_or(&lowered);
  if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
    return Err(HashError::Invalid { value: raw.to_string() });
  }
  Ok(hex.to_string())
}

/// Normalize a hash to its canonical `sha256:<hex>` form.
pub fn canonical_hash(raw: &str) -> Result<String, HashError> {
  Ok(format!("{}{}", HASH_PREFIX, hash_hex(raw)?))
}

/// A full SHA-256 content identity.
///
/// Bare and prefixed inputs parse to the same value, so equality on
/// `ContentHash` is equality of canonical forms.
///
/// # Format
///
/// Displays and serializes as `sha256:` followed by 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(String);

impl ContentHash {
  pub fn parse(raw: &str) -> Result<Self, HashError> {
    hash_hex(raw).map(ContentHash)
  }

  /// The bare 64-character hex digest.
  pub fn hex(&self) -> &str {
    &self.0
  }

  pub fn canonical(&self) -> String {
    format!("{}{}", HASH_PREFIX, self.0)
  }

  fn from_digest(digest: impl AsRef<[u8]>) -> Self {
    ContentHash(hex::encode(digest))
  }
}

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", HASH_PREFIX, self.0)
  }
}

impl FromStr for ContentHash {
  type Err = HashError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ContentHash::parse(s)
  }
}

impl Serialize for ContentHash {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for ContentHash {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    ContentHash::parse(&raw).map_err(serde::de::Error::custom)
  }
}

/// Error during directory hashing.
#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk directory {root}: {source}")]
  WalkDir {
    root: String,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hash every non-directory entry below `root`, keyed by slash-separated
/// relative path.
///
/// Symlinks are not followed during the walk, but a symlink entry is hashed by
/// the content it resolves to, so a link and a regular file with the same bytes
/// carry the same identity. Paths listed in `exclude` (relative, slash form) are
/// skipped.
pub fn hash_tree(root: &Path, exclude: &[&str]) -> Result<BTreeMap<String, ContentHash>, DirHashError> {
  let mut out = BTreeMap::new();

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|source| DirHashError::WalkDir {
      root: root.display().to_string(),
      source,
    })?;
    if entry.file_type().is_dir() {
      continue;
    }

    let rel = relative_slash_path(root, entry.path());
    if rel.is_empty() || exclude.contains(&rel.as_str()) {
      continue;
    }

    let hash = hash_file(entry.path())?;
    out.insert(rel, hash);
  }

  Ok(out)
}

/// Relative path of `path` below `root`, with `/` separators.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
  let rel = path.strip_prefix(root).unwrap_or(path);
  rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let read_err = |source| DirHashError::ReadFile {
    path: path.display().to_string(),
    source,
  };
  let mut file = fs::File::open(path).map_err(read_err)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash::from_digest(hasher.finalize()))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash::from_digest(Sha256::digest(data))
}

/// Aggregate digest of a path → hash map.
///
/// Each entry contributes `path\nhash\n` in sorted path order, so the digest is
/// stable for a given file set regardless of walk order.
pub fn digest_hash_map(hashes: &BTreeMap<String, ContentHash>) -> ContentHash {
  let mut hasher = Sha256::new();
  for (path, hash) in hashes {
    hasher.update(path.as_bytes());
    hasher.update(b"\n");
    hasher.update(hash.to_string().as_bytes());
    hasher.update(b"\n");
  }
  ContentHash::from_digest(hasher.finalize())
}
