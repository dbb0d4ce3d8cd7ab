use crate::consts::{APP_NAME, DATA_DIR_ENV};
use std::path::{Path, PathBuf};

/// Returns the user's home directory, if one is configured
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory, if one is configured
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").filter(|v| !v.is_empty()).map(PathBuf::from)
}

#[cfg(windows)]
fn default_data_dir() -> Option<PathBuf> {
  std::env::var_os("LOCALAPPDATA")
    .filter(|v| !v.is_empty())
    .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
}

#[cfg(not(windows))]
fn default_data_dir() -> Option<PathBuf> {
  let data_home = std::env::var_os("XDG_DATA_HOME")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|home| home.join(".local").join("share")))?;
  Some(data_home.join(APP_NAME))
}

/// Returns the directory holding websites, blobs and the metadata store.
///
/// `SITEVAULT_DATA_DIR` wins over the platform default. `None` when neither is
/// available, e.g. `HOME` unset.
pub fn data_dir() -> Option<PathBuf> {
  std::env::var_os(DATA_DIR_ENV)
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .or_else(default_data_dir)
}

/// Root of the per-website release trees.
pub fn websites_dir(data_dir: &Path) -> PathBuf {
  data_dir.join("websites")
}

pub fn blobs_dir(data_dir: &Path) -> PathBuf {
  data_dir.join("blobs")
}

pub fn db_path(data_dir: &Path) -> PathBuf {
  data_dir.join("db.json")
}
