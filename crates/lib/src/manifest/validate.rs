use std::collections::HashSet;

use thiserror::Error;

use super::types::{ApplyMode, Manifest, Resource, ResourceKind};
use crate::util::hash::{HashError, hash_hex};
use crate::util::relpath::{RelPathError, sanitize};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("parse manifest json: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("manifest.mode must be \"full\" or \"partial\", got {mode:?}")]
  InvalidMode { mode: String },

  #[error("manifest.website is required")]
  MissingWebsite,

  #[error("manifest.resources must not be empty")]
  NoResources,

  #[error("manifest.resources[{index}]: {source}")]
  Resource {
    index: usize,
    #[source]
    source: ResourceError,
  },

  #[error("manifest.resources[{index}]: duplicate resource {kind} {name:?}")]
  Duplicate { index: usize, kind: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
  #[error("unsupported resource kind {0:?}")]
  UnsupportedKind(String),

  #[error("name is required")]
  MissingName,

  #[error("deleted resources are only allowed in partial mode")]
  DeletedOutsidePartial,

  #[error("deleted {kind} resources require file")]
  DeletedRequiresFile { kind: ResourceKind },

  #[error("at least one file entry is required")]
  NoFileEntries,

  #[error("invalid file path {path:?}: {source}")]
  InvalidPath {
    path: String,
    #[source]
    source: RelPathError,
  },

  #[error("invalid hash for file {path:?}: {source}")]
  InvalidHash {
    path: String,
    #[source]
    source: HashError,
  },

  #[error("{kind} resources must reference exactly one file")]
  ExactlyOneFile { kind: ResourceKind },

  #[error("{kind} name must match file path {file:?}")]
  NameMustMatchFile { kind: ResourceKind, file: String },
}

impl Manifest {
  /// Decode a manifest from JSON and validate it.
  pub fn parse(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = serde_json::from_slice(bytes).map_err(ManifestError::Parse)?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Validate the manifest, reporting the first problem found.
  ///
  /// Checks run in a fixed order: mode, website, resource count, each resource
  /// in turn, then `(kind, name)` uniqueness.
  pub fn validate(&self) -> Result<(), ManifestError> {
    let mode = ApplyMode::parse(&self.mode).ok_or_else(|| ManifestError::InvalidMode {
      mode: self.mode.clone(),
    })?;
    if self.website.trim().is_empty() {
      return Err(ManifestError::MissingWebsite);
    }
    if self.resources.is_empty() {
      return Err(ManifestError::NoResources);
    }

    let mut seen = HashSet::with_capacity(self.resources.len());
    for (index, resource) in self.resources.iter().enumerate() {
      let kind = resource
        .validate(mode)
        .map_err(|source| ManifestError::Resource { index, source })?;

      if !seen.insert((kind, resource.name.trim().to_string())) {
        return Err(ManifestError::Duplicate {
          index,
          kind: resource.kind.clone(),
          name: resource.name.clone(),
        });
      }
    }
    Ok(())
  }
}

impl Resource {
  fn validate(&self, mode: ApplyMode) -> Result<ResourceKind, ResourceError> {
    let kind = self
      .resource_kind()
      .ok_or_else(|| ResourceError::UnsupportedKind(self.kind.clone()))?;
    let name = self.name.trim();
    if name.is_empty() {
      return Err(ResourceError::MissingName);
    }

    if self.deleted {
      if mode != ApplyMode::Partial {
        return Err(ResourceError::DeletedOutsidePartial);
      }
      if kind.name_is_path() {
        let file = self.file.trim();
        if file.is_empty() {
          return Err(ResourceError::DeletedRequiresFile { kind });
        }
        validate_path(file)?;
        if name != file {
          return Err(ResourceError::NameMustMatchFile {
            kind,
            file: file.to_string(),
          });
        }
      }
      return Ok(kind);
    }

    let entries = self.file_entries();
    if entries.is_empty() {
      return Err(ResourceError::NoFileEntries);
    }
    for entry in &entries {
      validate_path(&entry.file)?;
      hash_hex(&entry.hash).map_err(|source| ResourceError::InvalidHash {
        path: entry.file.clone(),
        source,
      })?;
    }
    if kind.is_single_file() && entries.len() != 1 {
      return Err(ResourceError::ExactlyOneFile { kind });
    }
    if kind.name_is_path() && name != entries[0].file {
      return Err(ResourceError::NameMustMatchFile {
        kind,
        file: entries[0].file.clone(),
      });
    }
    Ok(kind)
  }
}

fn validate_path(path: &str) -> Result<(), ResourceError> {
  sanitize(path).map(|_| ()).map_err(|source| ResourceError::InvalidPath {
    path: path.to_string(),
    source,
  })
}
