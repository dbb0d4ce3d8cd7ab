//! Content hashes of release directories and their verification.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::consts::{OUTPUT_HASHES_METADATA_FILE, RELEASE_METADATA_FILES};
use crate::util::hash::{ContentHash, DirHashError, canonical_hash, digest_hash_map, hash_tree};

/// Path → hash of every promotable file of a release, metadata excluded.
pub fn compute_promotion_hashes(root: &Path) -> Result<BTreeMap<String, ContentHash>, DirHashError> {
  hash_tree(root, &RELEASE_METADATA_FILES)
}

/// Path → hash of every file of a release except `.output-hashes.json`.
///
/// This is the map persisted into `.output-hashes.json` and the release row.
pub fn compute_output_hashes(root: &Path) -> Result<BTreeMap<String, ContentHash>, DirHashError> {
  hash_tree(root, &[OUTPUT_HASHES_METADATA_FILE])
}

pub fn is_release_metadata_file(rel: &str) -> bool {
  RELEASE_METADATA_FILES.contains(&rel)
}

/// Parse a release row's stored `output_hashes` JSON.
///
/// Blank input yields an empty map. Blank keys and metadata files are dropped.
/// Values are normalized to canonical form when they parse as hashes and kept
/// verbatim otherwise, so a malformed value surfaces as a mismatch later.
pub fn load_source_hashes(raw: &str) -> Result<BTreeMap<String, String>, serde_json::Error> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(BTreeMap::new());
  }

  let parsed: BTreeMap<String, String> = serde_json::from_str(raw)?;
  Ok(
    parsed
      .into_iter()
      .filter_map(|(path, hash)| {
        let path = path.trim().replace('\\', "/");
        if path.is_empty() || is_release_metadata_file(&path) {
          return None;
        }
        let hash = hash.trim();
        let hash = canonical_hash(hash).unwrap_or_else(|_| hash.to_string());
        Some((path, hash))
      })
      .collect(),
  )
}

/// Expected hashes from actual ones, in canonical string form.
pub fn expected_from(hashes: &BTreeMap<String, ContentHash>) -> BTreeMap<String, String> {
  hashes.iter().map(|(path, hash)| (path.clone(), hash.canonical())).collect()
}

/// Why a promoted tree did not verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashMismatch {
  MissingFile { path: String },
  Differs { path: String },
  UnexpectedFile { path: String },
}

impl HashMismatch {
  pub fn path(&self) -> &str {
    match self {
      HashMismatch::MissingFile { path } | HashMismatch::Differs { path } | HashMismatch::UnexpectedFile { path } => {
        path
      }
    }
  }
}

impl fmt::Display for HashMismatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HashMismatch::MissingFile { path } => write!(f, "target is missing file {}", path),
      HashMismatch::Differs { path } => write!(f, "hash mismatch for {}", path),
      HashMismatch::UnexpectedFile { path } => write!(f, "target has unexpected file {}", path),
    }
  }
}

/// First discrepancy between `expected` and `actual`, if any.
///
/// Expected paths are checked first in sorted order, then paths only present
/// in `actual`.
pub fn compare_promotion_hashes(
  expected: &BTreeMap<String, String>,
  actual: &BTreeMap<String, ContentHash>,
) -> Option<HashMismatch> {
  for (path, expected_hash) in expected {
    match actual.get(path) {
      None => return Some(HashMismatch::MissingFile { path: path.clone() }),
      Some(hash) if hash.canonical() != *expected_hash => {
        return Some(HashMismatch::Differs { path: path.clone() });
      }
      Some(_) => {}
    }
  }
  actual
    .keys()
    .find(|path| !expected.contains_key(*path))
    .map(|path| HashMismatch::UnexpectedFile { path: path.clone() })
}

/// Aggregate hash identifying a promoted file set.
pub fn promotion_digest(hashes: &BTreeMap<String, ContentHash>) -> ContentHash {
  digest_hash_map(hashes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::hash_bytes;
  use crate::util::testutil::write_file;
  use tempfile::TempDir;

  fn tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "index.html", "hello");
    write_file(temp.path(), "styles/default.css", "body{}");
    write_file(temp.path(), ".manifest.json", "{}");
    write_file(temp.path(), ".build-log.txt", "log");
    write_file(temp.path(), ".output-hashes.json", "{}");
    temp
  }

  #[test]
  fn promotion_hashes_skip_all_metadata() {
    let temp = tree();
    let hashes = compute_promotion_hashes(temp.path()).unwrap();
    assert_eq!(hashes.keys().collect::<Vec<_>>(), vec!["index.html", "styles/default.css"]);
    assert_eq!(hashes["index.html"], hash_bytes(b"hello"));
  }

  #[test]
  fn output_hashes_skip_only_themselves() {
    let temp = tree();
    let hashes = compute_output_hashes(temp.path()).unwrap();
    assert_eq!(
      hashes.keys().collect::<Vec<_>>(),
      vec![".build-log.txt", ".manifest.json", "index.html", "styles/default.css"]
    );
  }

  #[test]
  fn load_source_hashes_filters_and_normalizes() {
    let hex = "a".repeat(64);
    let raw = format!(
      r#"{{" index.html ":"{hex}", "":"{hex}", "  ":"x", ".manifest.json":"{hex}", "a\\b.css":" SHA256:{upper} ", "bad":"nope"}}"#,
      upper = hex.to_uppercase()
    );
    let loaded = load_source_hashes(&raw).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded["index.html"], format!("sha256:{hex}"));
    assert_eq!(loaded["a/b.css"], format!("sha256:{hex}"));
    assert_eq!(loaded["bad"], "nope");

    assert!(load_source_hashes("   ").unwrap().is_empty());
    assert!(load_source_hashes("{not json").is_err());
  }

  #[test]
  fn compare_reports_first_problem_in_order() {
    let actual: BTreeMap<String, ContentHash> = [
      ("a.html".to_string(), hash_bytes(b"a")),
      ("b.html".to_string(), hash_bytes(b"b")),
    ]
    .into_iter()
    .collect();

    let expected = expected_from(&actual);
    assert_eq!(compare_promotion_hashes(&expected, &actual), None);

    let mut missing = expected.clone();
    missing.insert("0.html".to_string(), hash_bytes(b"0").canonical());
    assert_eq!(
      compare_promotion_hashes(&missing, &actual),
      Some(HashMismatch::MissingFile {
        path: "0.html".to_string()
      })
    );

    let mut differs = expected.clone();
    differs.insert("b.html".to_string(), hash_bytes(b"x").canonical());
    let mismatch = compare_promotion_hashes(&differs, &actual).unwrap();
    assert_eq!(mismatch.to_string(), "hash mismatch for b.html");

    let mut unexpected = expected.clone();
    unexpected.remove("a.html");
    let mismatch = compare_promotion_hashes(&unexpected, &actual).unwrap();
    assert_eq!(mismatch.to_string(), "target has unexpected file a.html");
    assert_eq!(mismatch.path(), "a.html");
  }

  #[test]
  fn digest_is_stable_for_same_set() {
    let temp = tree();
    let first = promotion_digest(&compute_promotion_hashes(temp.path()).unwrap());
    write_file(temp.path(), ".build-log.txt", "different log");
    let second = promotion_digest(&compute_promotion_hashes(temp.path()).unwrap());
    assert_eq!(first, second);
  }
}
