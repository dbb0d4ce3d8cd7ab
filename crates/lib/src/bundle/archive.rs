use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::Read;

use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

use super::{Bundle, BundleError, ValidationError};
use crate::consts::BUNDLE_MANIFEST_ENTRY;
use crate::manifest::Manifest;
use crate::util::hash::{ContentHash, hash_bytes};
use crate::util::relpath::sanitize;

const MAX_PREALLOCATE: u64 = 64 * 1024;

/// Decode a bundle from a tar stream and verify it against its manifest.
///
/// Directory entries are skipped and any entry type other than a regular file
/// is rejected. Every file declared by a non-deleted resource must be present
/// and hash to its declared value; all missing files and mismatches are
/// reported together in a single [`ValidationError`].
pub fn read_tar<R: Read>(reader: R) -> Result<Bundle, BundleError> {
  let mut archive = Archive::new(reader);
  let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
  let mut manifest_bytes: Option<Vec<u8>> = None;

  for entry in archive.entries().map_err(BundleError::ReadEntry)? {
    let mut entry = entry.map_err(BundleError::ReadEntry)?;
    let raw_path = entry
      .path()
      .map_err(BundleError::ReadEntry)?
      .to_string_lossy()
      .into_owned();

    let entry_type = entry.header().entry_type();
    if entry_type == EntryType::Directory {
      continue;
    }
    if !entry_type.is_file() {
      return Err(BundleError::UnsupportedEntryType { path: raw_path });
    }

    let name = sanitize(&raw_path).map_err(|source| BundleError::InvalidPath {
      path: raw_path.clone(),
      source,
    })?;

    // Header sizes are untrusted; reserve at most a bounded amount up front.
    let mut content = Vec::with_capacity(entry.size().min(MAX_PREALLOCATE) as usize);
    entry.read_to_end(&mut content).map_err(BundleError::ReadEntry)?;

    if name == BUNDLE_MANIFEST_ENTRY {
      manifest_bytes = Some(content);
      continue;
    }
    match files.entry(name) {
      Entry::Occupied(occupied) => return Err(BundleError::DuplicateEntry(occupied.key().clone())),
      Entry::Vacant(vacant) => {
        vacant.insert(content);
      }
    }
  }

  let manifest_bytes = match manifest_bytes {
    Some(bytes) if !bytes.is_empty() => bytes,
    _ => return Err(BundleError::MissingManifest),
  };
  let manifest = Manifest::parse(&manifest_bytes)?;

  let expected = expected_hashes(&manifest)?;

  let mut validation = ValidationError::default();
  for (file, expected_hash) in &expected {
    match files.get(file) {
      None => validation.missing_files.push(file.clone()),
      Some(content) if hash_bytes(content) != *expected_hash => validation.hash_mismatches.push(file.clone()),
      Some(_) => {}
    }
  }
  if !validation.is_empty() {
    validation.missing_files.sort();
    validation.hash_mismatches.sort();
    return Err(validation.into());
  }

  let extra_files: Vec<String> = files.keys().filter(|f| !expected.contains_key(*f)).cloned().collect();
  debug!(
    website = %manifest.website,
    files = files.len(),
    extra = extra_files.len(),
    "bundle verified"
  );

  Ok(Bundle {
    manifest,
    files,
    extra_files,
  })
}

/// Every file a non-deleted resource declares, keyed by cleaned path.
pub(crate) fn expected_hashes(manifest: &Manifest) -> Result<BTreeMap<String, ContentHash>, BundleError> {
  let mut expected: BTreeMap<String, ContentHash> = BTreeMap::new();
  for resource in manifest.resources.iter().filter(|r| !r.deleted) {
    for file_ref in resource.file_entries() {
      let hash = ContentHash::parse(&file_ref.hash).map_err(|source| BundleError::InvalidHash {
        resource: resource.name.clone(),
        file: file_ref.file.clone(),
        source,
      })?;
      let path = sanitize(&file_ref.file).map_err(|source| BundleError::InvalidPath {
        path: file_ref.file.clone(),
        source,
      })?;
      match expected.get(&path) {
        Some(previous) if *previous != hash => return Err(BundleError::ConflictingHashes(path)),
        Some(_) => {}
        None => {
          expected.insert(path, hash);
        }
      }
    }
  }
  Ok(expected)
}

/// Encode a manifest and its files as a tar stream.
///
/// The manifest is validated and written first as `manifest.json` with
/// canonical hashes; files follow in sorted path order. File content is not
/// checked against the manifest here, that is the reader's job.
pub fn build_tar(manifest: &Manifest, files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, BundleError> {
  manifest.validate()?;
  let mut manifest = manifest.clone();
  manifest.canonicalize_hashes();
  let manifest_bytes = serde_json::to_vec(&manifest).map_err(BundleError::Serialize)?;

  let mut builder = Builder::new(Vec::new());
  append_file(&mut builder, BUNDLE_MANIFEST_ENTRY, &manifest_bytes)?;
  for (path, content) in files {
    append_file(&mut builder, path, content)?;
  }

  builder.into_inner().map_err(|source| BundleError::Write {
    path: "<archive>".to_string(),
    source,
  })
}

fn append_file(builder: &mut Builder<Vec<u8>>, path: &str, content: &[u8]) -> Result<(), BundleError> {
  let mut header = Header::new_gnu();
  header.set_entry_type(EntryType::Regular);
  header.set_mode(0o644);
  header.set_size(content.len() as u64);
  builder
    .append_data(&mut header, path, content)
    .map_err(|source| BundleError::Write {
      path: path.to_string(),
      source,
    })
}
