mod bundle;
mod gc;
mod import;
mod promote;
mod rollback;
mod site;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use sitevault_lib::blob::BlobStore;
use sitevault_lib::db::JsonMetadataStore;
use sitevault_lib::platform::paths;

pub use bundle::{BundleCommand, cmd_bundle};
pub use gc::cmd_gc;
pub use import::cmd_import;
pub use promote::cmd_promote;
pub use rollback::{cmd_activate, cmd_rollback};
pub use site::{DomainCommand, EnvCommand, WebsiteCommand, cmd_domain, cmd_env, cmd_website};
pub use status::cmd_status;

/// Locations of everything the CLI reads and writes.
pub struct Vault {
  data_dir: PathBuf,
}

impl Vault {
  /// `--data-dir` wins over `SITEVAULT_DATA_DIR` and the platform default.
  pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
    let data_dir = match data_dir {
      Some(dir) => dir,
      None => paths::data_dir().context("Cannot determine data directory; set SITEVAULT_DATA_DIR or --data-dir")?,
    };
    debug!(data_dir = %data_dir.display(), "using data directory");
    Ok(Self { data_dir })
  }

  pub fn websites_dir(&self) -> PathBuf {
    paths::websites_dir(&self.data_dir)
  }

  pub fn blobs(&self) -> BlobStore {
    BlobStore::new(paths::blobs_dir(&self.data_dir))
  }

  pub fn open_db(&self) -> Result<JsonMetadataStore> {
    let path = paths::db_path(&self.data_dir);
    JsonMetadataStore::open(&path).with_context(|| format!("Failed to open metadata store {}", path.display()))
  }
}
