//! Manifest wire types.
//!
//! `kind` and `mode` are kept as the raw strings received on the wire so that
//! validation can report them in a fixed order with precise messages; typed
//! views are available through [`Resource::resource_kind`] and
//! [`Manifest::apply_mode`].
//!
//! # Example
//!
//! ```json
//! {
//!   "apiVersion": "sitevault/v1",
//!   "kind": "Bundle",
//!   "mode": "full",
//!   "website": "futurelab",
//!   "resources": [
//!     { "kind": "Page", "name": "index", "file": "pages/index.page.yaml", "hash": "sha256:..." },
//!     { "kind": "StyleBundle", "name": "default", "files": [
//!       { "file": "styles/tokens.css", "hash": "sha256:..." },
//!       { "file": "styles/default.css", "hash": "sha256:..." }
//!     ] }
//!   ]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::hash::canonical_hash;

pub const API_VERSION: &str = "sitevault/v1";
pub const BUNDLE_KIND: &str = "Bundle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
  Full,
  Partial,
}

impl ApplyMode {
  pub fn as_str(self) -> &'static str {
    match self {
      ApplyMode::Full => "full",
      ApplyMode::Partial => "partial",
    }
  }

  /// Parse a mode. Modes are matched exactly.
  pub fn parse(raw: &str) -> Option<Self> {
    match raw {
      "full" => Some(ApplyMode::Full),
      "partial" => Some(ApplyMode::Partial),
      _ => None,
    }
  }
}

impl fmt::Display for ApplyMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Kinds a bundle resource can declare.
///
/// This is the full set a bundle builder emits, including the site-level
/// `Website` and `WebsiteIcon` entries, so bundles built locally always
/// validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
  Website,
  Component,
  Page,
  StyleBundle,
  Asset,
  Script,
  WebsiteIcon,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 7] = [
    ResourceKind::Website,
    ResourceKind::Component,
    ResourceKind::Page,
    ResourceKind::StyleBundle,
    ResourceKind::Asset,
    ResourceKind::Script,
    ResourceKind::WebsiteIcon,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ResourceKind::Website => "Website",
      ResourceKind::Component => "Component",
      ResourceKind::Page => "Page",
      ResourceKind::StyleBundle => "StyleBundle",
      ResourceKind::Asset => "Asset",
      ResourceKind::Script => "Script",
      ResourceKind::WebsiteIcon => "WebsiteIcon",
    }
  }

  /// Case-insensitive parse of a kind name.
  pub fn parse(raw: &str) -> Option<Self> {
    let raw = raw.trim();
    Self::ALL.into_iter().find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
  }

  /// Kinds that must reference exactly one file.
  pub fn is_single_file(self) -> bool {
    matches!(
      self,
      ResourceKind::Component | ResourceKind::Page | ResourceKind::Asset | ResourceKind::Script
    )
  }

  /// Kinds whose name is their file path.
  pub fn name_is_path(self) -> bool {
    matches!(self, ResourceKind::Asset | ResourceKind::Script)
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
  #[serde(default)]
  pub file: String,
  #[serde(default)]
  pub hash: String,
}

impl FileRef {
  pub fn new(file: impl Into<String>, hash: impl Into<String>) -> Self {
    Self {
      file: file.into(),
      hash: hash.into(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
  #[serde(default)]
  pub kind: String,
  #[serde(default)]
  pub name: String,
  /// Single-file shorthand; combined with `files` by [`Resource::file_entries`].
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub file: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub hash: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub files: Vec<FileRef>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub content_type: String,
  #[serde(default, skip_serializing_if = "is_zero")]
  pub size: i64,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub deleted: bool,
}

fn is_zero(v: &i64) -> bool {
  *v == 0
}

impl Resource {
  /// A single-file resource.
  pub fn single(kind: ResourceKind, name: impl Into<String>, file: impl Into<String>, hash: impl Into<String>) -> Self {
    Self {
      kind: kind.as_str().to_string(),
      name: name.into(),
      file: file.into(),
      hash: hash.into(),
      ..Default::default()
    }
  }

  /// A resource backed by several files.
  pub fn multi(kind: ResourceKind, name: impl Into<String>, files: Vec<FileRef>) -> Self {
    Self {
      kind: kind.as_str().to_string(),
      name: name.into(),
      files,
      ..Default::default()
    }
  }

  pub fn resource_kind(&self) -> Option<ResourceKind> {
    ResourceKind::parse(&self.kind)
  }

  /// All file references of this resource: the `file`/`hash` shorthand first
  /// (when either is set), then the `files` list, each trimmed.
  pub fn file_entries(&self) -> Vec<FileRef> {
    let mut out = Vec::with_capacity(self.files.len() + 1);
    if !self.file.trim().is_empty() || !self.hash.trim().is_empty() {
      out.push(FileRef::new(self.file.trim(), self.hash.trim()));
    }
    out.extend(self.files.iter().map(|f| FileRef::new(f.file.trim(), f.hash.trim())));
    out
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
  #[serde(default)]
  pub api_version: String,
  #[serde(default)]
  pub kind: String,
  #[serde(default)]
  pub mode: String,
  #[serde(default)]
  pub website: String,
  #[serde(default)]
  pub resources: Vec<Resource>,
}

impl Manifest {
  pub fn new(mode: ApplyMode, website: impl Into<String>, resources: Vec<Resource>) -> Self {
    Self {
      api_version: API_VERSION.to_string(),
      kind: BUNDLE_KIND.to_string(),
      mode: mode.as_str().to_string(),
      website: website.into(),
      resources,
    }
  }

  pub fn apply_mode(&self) -> Option<ApplyMode> {
    ApplyMode::parse(&self.mode)
  }

  /// Rewrite every present hash in canonical `sha256:<hex>` form.
  ///
  /// Hashes that do not parse are left untouched; call after `validate`.
  pub fn canonicalize_hashes(&mut self) {
    for resource in &mut self.resources {
      if let Ok(hash) = canonical_hash(&resource.hash) {
        resource.hash = hash;
      }
      for file in &mut resource.files {
        if let Ok(hash) = canonical_hash(&file.hash) {
          file.hash = hash;
        }
      }
    }
  }
}
