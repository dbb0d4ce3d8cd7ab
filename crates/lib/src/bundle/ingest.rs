use serde::Serialize;
use tracing::info;

use super::Bundle;
use super::archive::expected_hashes;
use crate::blob::{BlobError, BlobStore};
use crate::bundle::BundleError;
use crate::ctx::OpContext;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestStats {
  pub created: usize,
  pub deduplicated: usize,
  pub bytes_written: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
  #[error(transparent)]
  Bundle(#[from] BundleError),

  #[error("store blob for {path}: {source}")]
  Blob {
    path: String,
    #[source]
    source: BlobError,
  },
}

/// Store every manifest-referenced file of a verified bundle in the blob store.
///
/// Files already present under their hash are counted as deduplicated and
/// left untouched. Extra archive members are not stored.
pub fn ingest_bundle(ctx: &OpContext, store: &BlobStore, bundle: &Bundle) -> Result<IngestStats, IngestError> {
  let expected = expected_hashes(&bundle.manifest)?;
  let mut stats = IngestStats::default();

  for (path, hash) in &expected {
    let Some(content) = bundle.files.get(path) else {
      continue;
    };
    let created = store.put(ctx, hash.hex(), content).map_err(|source| IngestError::Blob {
      path: path.clone(),
      source,
    })?;
    if created {
      stats.created += 1;
      stats.bytes_written += content.len() as u64;
    } else {
      stats.deduplicated += 1;
    }
  }

  info!(
    website = %bundle.manifest.website,
    created = stats.created,
    deduplicated = stats.deduplicated,
    "bundle ingested"
  );
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::bundle::{build_tar, read_tar};
  use crate::manifest::{ApplyMode, Manifest, Resource, ResourceKind};
  use crate::util::hash::hash_bytes;

  fn bundle_with(files: &[(&str, &str)]) -> Bundle {
    let mut map = BTreeMap::new();
    let mut resources = Vec::new();
    for (path, content) in files {
      map.insert(path.to_string(), content.as_bytes().to_vec());
      resources.push(Resource::single(
        ResourceKind::Asset,
        *path,
        *path,
        hash_bytes(content.as_bytes()).hex(),
      ));
    }
    let manifest = Manifest::new(ApplyMode::Full, "futurelab", resources);
    read_tar(build_tar(&manifest, &map).unwrap().as_slice()).unwrap()
  }

  #[test]
  fn ingest_counts_created_and_deduplicated() {
    let temp = tempfile::tempdir().unwrap();
    let store = BlobStore::new(temp.path());
    let ctx = OpContext::background();

    let first = bundle_with(&[("assets/a.css", "a"), ("assets/b.css", "b")]);
    let stats = ingest_bundle(&ctx, &store, &first).unwrap();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.deduplicated, 0);
    assert_eq!(stats.bytes_written, 2);

    let second = bundle_with(&[("assets/a.css", "a"), ("assets/c.css", "c")]);
    let stats = ingest_bundle(&ctx, &store, &second).unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.deduplicated, 1);
    assert!(store.contains(hash_bytes(b"c").hex()));
  }
}
