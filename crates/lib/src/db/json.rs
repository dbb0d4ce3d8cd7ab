//! JSON-file metadata store.
//!
//! Keeps every website, environment, release and domain binding in a single
//! document that is rewritten atomically (temp file + rename) on each update.
//! Updates hold an exclusive lock on `db.json.lock` from load to rename, so
//! concurrent processes never overwrite each other's changes.
//!
//! # Storage Layout
//!
//! ```text
//! {data_dir}/
//! ├── db.json       # MetadataState
//! └── db.json.lock  # held during updates
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DbError, DomainBindingRow, EnvironmentRow, MetadataStore, ReleaseRow, WebsiteRow, validate_name};
use crate::ctx::OpContext;
use crate::util::flock::lock_exclusive;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetadataState {
  version: u32,
  next_id: i64,
  #[serde(default)]
  websites: Vec<WebsiteRow>,
  #[serde(default)]
  environments: Vec<EnvironmentRow>,
  #[serde(default)]
  releases: Vec<ReleaseRow>,
  #[serde(default)]
  domains: Vec<DomainBindingRow>,
}

impl Default for MetadataState {
  fn default() -> Self {
    Self {
      version: STATE_VERSION,
      next_id: 1,
      websites: Vec::new(),
      environments: Vec::new(),
      releases: Vec::new(),
      domains: Vec::new(),
    }
  }
}

impl MetadataState {
  fn allocate_id(&mut self) -> i64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }
}

#[derive(Debug)]
pub struct JsonMetadataStore {
  path: PathBuf,
}

impl JsonMetadataStore {
  /// Open the store at `path`, verifying any existing document is readable.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
    let store = Self { path: path.into() };
    store.load()?;
    Ok(store)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn load(&self) -> Result<MetadataState, DbError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MetadataState::default()),
      Err(source) => {
        return Err(DbError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    let state: MetadataState = serde_json::from_str(&content).map_err(|source| DbError::Parse {
      path: self.path.clone(),
      source,
    })?;
    if state.version != STATE_VERSION {
      return Err(DbError::UnsupportedVersion(state.version));
    }
    Ok(state)
  }

  fn dir(&self) -> &Path {
    match self.path.parent() {
      Some(dir) if !dir.as_os_str().is_empty() => dir,
      _ => Path::new("."),
    }
  }

  /// Exclusive lock on the store, released when the returned file is dropped.
  fn lock(&self) -> Result<File, DbError> {
    let lock_path = self.path.with_extension("json.lock");
    let lock_err = |source| DbError::Lock {
      path: lock_path.clone(),
      source,
    };
    fs::create_dir_all(self.dir()).map_err(lock_err)?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(lock_err)?;
    lock_exclusive(&file).map_err(lock_err)?;
    Ok(file)
  }

  fn save(&self, state: &MetadataState) -> Result<(), DbError> {
    let write_err = |source| DbError::Write {
      path: self.path.clone(),
      source,
    };
    let content = serde_json::to_vec_pretty(state).map_err(DbError::Serialize)?;
    let mut temp = tempfile::NamedTempFile::new_in(self.dir()).map_err(write_err)?;
    temp.write_all(&content).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&self.path).map_err(|e| write_err(e.error))?;
    Ok(())
  }

  fn update<T>(&self, f: impl FnOnce(&mut MetadataState) -> Result<T, DbError>) -> Result<T, DbError> {
    let _lock = self.lock()?;
    let mut state = self.load()?;
    let out = f(&mut state)?;
    self.save(&state)?;
    Ok(out)
  }

  pub fn create_website(&self, name: &str) -> Result<WebsiteRow, DbError> {
    let name = name.trim().to_string();
    validate_name("website", &name)?;
    self.update(|state| {
      if state.websites.iter().any(|w| w.name == name) {
        return Err(DbError::Conflict(format!("website {:?}", name)));
      }
      let row = WebsiteRow {
        id: state.allocate_id(),
        name,
        created_at: now_rfc3339(),
      };
      state.websites.push(row.clone());
      debug!(website = %row.name, id = row.id, "website created");
      Ok(row)
    })
  }

  pub fn create_environment(&self, website_id: i64, name: &str) -> Result<EnvironmentRow, DbError> {
    let name = name.trim().to_string();
    validate_name("environment", &name)?;
    self.update(|state| {
      if !state.websites.iter().any(|w| w.id == website_id) {
        return Err(DbError::NotFound(format!("website id {}", website_id)));
      }
      if state
        .environments
        .iter()
        .any(|e| e.website_id == website_id && e.name == name)
      {
        return Err(DbError::Conflict(format!("environment {:?}", name)));
      }
      let row = EnvironmentRow {
        id: state.allocate_id(),
        website_id,
        name,
        active_release_id: None,
      };
      state.environments.push(row.clone());
      Ok(row)
    })
  }

  pub fn bind_domain(&self, environment_id: i64, domain: &str) -> Result<DomainBindingRow, DbError> {
    let domain = domain.trim().to_ascii_lowercase();
    self.update(|state| {
      if !state.environments.iter().any(|e| e.id == environment_id) {
        return Err(DbError::NotFound(format!("environment id {}", environment_id)));
      }
      if state.domains.iter().any(|d| d.domain == domain) {
        return Err(DbError::Conflict(format!("domain {:?}", domain)));
      }
      let row = DomainBindingRow { domain, environment_id };
      state.domains.push(row.clone());
      Ok(row)
    })
  }

  pub fn list_websites(&self) -> Result<Vec<WebsiteRow>, DbError> {
    Ok(self.load()?.websites)
  }

  pub fn list_environments(&self, website_id: i64) -> Result<Vec<EnvironmentRow>, DbError> {
    Ok(
      self
        .load()?
        .environments
        .into_iter()
        .filter(|e| e.website_id == website_id)
        .collect(),
    )
  }
}

impl MetadataStore for JsonMetadataStore {
  fn get_website_by_name(&self, ctx: &OpContext, name: &str) -> Result<Option<WebsiteRow>, DbError> {
    ctx.check()?;
    Ok(self.load()?.websites.into_iter().find(|w| w.name == name))
  }

  fn get_environment_by_name(
    &self,
    ctx: &OpContext,
    website_id: i64,
    name: &str,
  ) -> Result<Option<EnvironmentRow>, DbError> {
    ctx.check()?;
    Ok(
      self
        .load()?
        .environments
        .into_iter()
        .find(|e| e.website_id == website_id && e.name == name),
    )
  }

  fn get_release_by_id(&self, ctx: &OpContext, id: &str) -> Result<Option<ReleaseRow>, DbError> {
    ctx.check()?;
    Ok(self.load()?.releases.into_iter().find(|r| r.id == id))
  }

  fn list_releases_by_environment(&self, ctx: &OpContext, environment_id: i64) -> Result<Vec<ReleaseRow>, DbError> {
    ctx.check()?;
    let mut releases: Vec<ReleaseRow> = self
      .load()?
      .releases
      .into_iter()
      .filter(|r| r.environment_id == environment_id)
      .collect();
    // Release IDs sort by creation time.
    releases.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(releases)
  }

  fn insert_release(&self, ctx: &OpContext, row: &ReleaseRow) -> Result<(), DbError> {
    ctx.check()?;
    self.update(|state| push_release(state, row))
  }

  fn record_activation(&self, ctx: &OpContext, row: &ReleaseRow) -> Result<(), DbError> {
    ctx.check()?;
    self.update(|state| {
      push_release(state, row)?;
      if let Some(env) = state.environments.iter_mut().find(|e| e.id == row.environment_id) {
        env.active_release_id = Some(row.id.clone());
      }
      Ok(())
    })
  }

  fn update_release_status(&self, ctx: &OpContext, release_id: &str, status: &str) -> Result<(), DbError> {
    ctx.check()?;
    self.update(|state| {
      let release = state
        .releases
        .iter_mut()
        .find(|r| r.id == release_id)
        .ok_or_else(|| DbError::NotFound(format!("release {:?}", release_id)))?;
      release.status = status.to_string();
      Ok(())
    })
  }

  fn update_environment_active_release(
    &self,
    ctx: &OpContext,
    environment_id: i64,
    release_id: Option<&str>,
  ) -> Result<(), DbError> {
    ctx.check()?;
    self.update(|state| {
      let env = state
        .environments
        .iter_mut()
        .find(|e| e.id == environment_id)
        .ok_or_else(|| DbError::NotFound(format!("environment id {}", environment_id)))?;
      env.active_release_id = release_id.map(str::to_string);
      Ok(())
    })
  }

  fn list_domain_bindings(&self, ctx: &OpContext, website: &str, environment: &str) -> Result<Vec<String>, DbError> {
    ctx.check()?;
    let state = self.load()?;
    let Some(website) = state.websites.iter().find(|w| w.name == website) else {
      return Ok(Vec::new());
    };
    let Some(env) = state
      .environments
      .iter()
      .find(|e| e.website_id == website.id && e.name == environment)
    else {
      return Ok(Vec::new());
    };
    let mut domains: Vec<String> = state
      .domains
      .iter()
      .filter(|d| d.environment_id == env.id)
      .map(|d| d.domain.clone())
      .collect();
    domains.sort();
    Ok(domains)
  }
}

fn push_release(state: &mut MetadataState, row: &ReleaseRow) -> Result<(), DbError> {
  if !state.environments.iter().any(|e| e.id == row.environment_id) {
    return Err(DbError::NotFound(format!("environment id {}", row.environment_id)));
  }
  if state.releases.iter().any(|r| r.id == row.id) {
    return Err(DbError::Conflict(format!("release {:?}", row.id)));
  }
  let mut row = row.clone();
  if row.created_at.is_empty() {
    row.created_at = now_rfc3339();
  }
  state.releases.push(row);
  Ok(())
}

pub(crate) fn now_rfc3339() -> String {
  humantime::format_rfc3339_millis(SystemTime::now()).to_string()
}
