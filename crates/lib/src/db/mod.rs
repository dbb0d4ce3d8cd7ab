//! Metadata store interface.
//!
//! The store is the single source of truth for which release each environment
//! serves. The release engine only talks to it through [`MetadataStore`]; any
//! backing implementation (relational or otherwise) can sit behind the trait.

mod json;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ctx::{ContextError, OpContext};

pub use json::JsonMetadataStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteRow {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRow {
  pub id: i64,
  pub website_id: i64,
  pub name: String,
  #[serde(default)]
  pub active_release_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRow {
  pub id: String,
  pub environment_id: i64,
  #[serde(default)]
  pub manifest_json: String,
  /// JSON object mapping content-relative path to canonical hash.
  #[serde(default)]
  pub output_hashes: String,
  #[serde(default)]
  pub build_log: String,
  pub status: String,
  /// Filled in by the store on insert when empty.
  #[serde(default)]
  pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBindingRow {
  pub domain: String,
  pub environment_id: i64,
}

#[derive(Debug, Error)]
pub enum DbError {
  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("read metadata store {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("write metadata store {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("parse metadata store {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("serialize metadata store: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported metadata store version: {0}")]
  UnsupportedVersion(u32),

  #[error("{0} not found")]
  NotFound(String),

  #[error("{0} already exists")]
  Conflict(String),

  #[error("invalid {kind} name {name:?}: use letters, digits, '.', '-' and '_'")]
  InvalidName { kind: &'static str, name: String },

  #[error("lock metadata store {path}: {source}")]
  Lock {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Website and environment names double as directory names.
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), DbError> {
  let valid = !name.is_empty()
    && name != "."
    && name != ".."
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
  if valid {
    Ok(())
  } else {
    Err(DbError::InvalidName {
      kind,
      name: name.to_string(),
    })
  }
}

/// Queries and updates the release engine needs from the metadata store.
///
/// Lookups return `Ok(None)` for a missing row so callers can map absence to
/// their own typed errors. Every call checks `ctx` before doing any work.
pub trait MetadataStore {
  fn get_website_by_name(&self, ctx: &OpContext, name: &str) -> Result<Option<WebsiteRow>, DbError>;

  fn get_environment_by_name(
    &self,
    ctx: &OpContext,
    website_id: i64,
    name: &str,
  ) -> Result<Option<EnvironmentRow>, DbError>;

  fn get_release_by_id(&self, ctx: &OpContext, id: &str) -> Result<Option<ReleaseRow>, DbError>;

  /// Releases of an environment, newest first.
  fn list_releases_by_environment(&self, ctx: &OpContext, environment_id: i64) -> Result<Vec<ReleaseRow>, DbError>;

  fn insert_release(&self, ctx: &OpContext, row: &ReleaseRow) -> Result<(), DbError>;

  fn update_release_status(&self, ctx: &OpContext, release_id: &str, status: &str) -> Result<(), DbError>;

  fn update_environment_active_release(
    &self,
    ctx: &OpContext,
    environment_id: i64,
    release_id: Option<&str>,
  ) -> Result<(), DbError>;

  /// Insert `row` and make it its environment's active release.
  ///
  /// Stores that can apply both changes atomically should override this; the
  /// default issues two writes and may leave the row without the pointer.
  fn record_activation(&self, ctx: &OpContext, row: &ReleaseRow) -> Result<(), DbError> {
    self.insert_release(ctx, row)?;
    self.update_environment_active_release(ctx, row.environment_id, Some(&row.id))
  }

  /// Domains bound to an environment of a website.
  fn list_domain_bindings(&self, ctx: &OpContext, website: &str, environment: &str) -> Result<Vec<String>, DbError>;
}
