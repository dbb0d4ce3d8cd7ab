//! On-disk layout of websites, environments and releases.
//!
//! ```text
//! {websites_root}/
//! └── {website}/envs/{env}/
//!     ├── .lock
//!     ├── current -> releases/{release_id}
//!     └── releases/
//!         ├── {release_id}/          # content + metadata files
//!         └── {release_id}.tmp/      # release still being assembled
//! ```

use std::path::{Path, PathBuf};

use crate::consts::{CURRENT_LINK, ENV_LOCK_FILE, STAGING_SUFFIX};

/// Paths of one environment below a websites root.
#[derive(Debug, Clone)]
pub struct EnvLayout {
  env_dir: PathBuf,
}

impl EnvLayout {
  pub fn new(websites_root: &Path, website: &str, env: &str) -> Self {
    Self {
      env_dir: websites_root.join(website).join("envs").join(env),
    }
  }

  pub fn env_dir(&self) -> &Path {
    &self.env_dir
  }

  pub fn releases_dir(&self) -> PathBuf {
    self.env_dir.join("releases")
  }

  pub fn release_dir(&self, release_id: &str) -> PathBuf {
    self.releases_dir().join(release_id)
  }

  pub fn staging_dir(&self, release_id: &str) -> PathBuf {
    self.releases_dir().join(format!("{}{}", release_id, STAGING_SUFFIX))
  }

  pub fn current_link(&self) -> PathBuf {
    self.env_dir.join(CURRENT_LINK)
  }

  pub fn lock_path(&self) -> PathBuf {
    self.env_dir.join(ENV_LOCK_FILE)
  }
}

/// `current` symlink target for a release, relative to the environment dir.
pub fn release_link_target(release_id: &str) -> String {
  format!("releases/{}", release_id)
}
