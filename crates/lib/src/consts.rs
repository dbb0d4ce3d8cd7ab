//! Shared constants for sitevault.

pub const APP_NAME: &str = "sitevault";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SITEVAULT_DATA_DIR";

/// Prefix of a canonical content hash.
pub const HASH_PREFIX: &str = "sha256:";

/// Archive member carrying the bundle manifest.
pub const BUNDLE_MANIFEST_ENTRY: &str = "manifest.json";

pub const MANIFEST_METADATA_FILE: &str = ".manifest.json";
pub const BUILD_LOG_METADATA_FILE: &str = ".build-log.txt";
pub const OUTPUT_HASHES_METADATA_FILE: &str = ".output-hashes.json";

/// Per-release metadata files. These are regenerated for every release and are
/// never hashed, copied or promoted as site content.
pub const RELEASE_METADATA_FILES: [&str; 3] =
  [MANIFEST_METADATA_FILE, BUILD_LOG_METADATA_FILE, OUTPUT_HASHES_METADATA_FILE];

/// Suffix of a release directory that is still being assembled.
pub const STAGING_SUFFIX: &str = ".tmp";

pub const CURRENT_LINK: &str = "current";
pub const CURRENT_TMP_LINK: &str = ".current.tmp";
pub const ENV_LOCK_FILE: &str = ".lock";

/// Upper bound on promotion advisories returned to the caller.
pub const MAX_PROMOTE_WARNINGS: usize = 20;

pub const RELEASE_STATUS_ACTIVE: &str = "active";
pub const RELEASE_STATUS_FAILED: &str = "failed";
