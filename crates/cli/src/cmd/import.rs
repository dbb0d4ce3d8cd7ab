use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use sitevault_lib::ctx::OpContext;
use sitevault_lib::release::import_directory;

use super::Vault;
use crate::output::{OutputFormat, format_duration, print_json, print_stat, print_success, short_hash};

pub fn cmd_import(vault: &Vault, website: &str, env: &str, dir: &Path, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let db = vault.open_db()?;
  let dir = dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());

  let result = import_directory(&OpContext::background(), &db, &vault.websites_dir(), website, env, &dir)
    .with_context(|| format!("Import into {}/{} failed", website, env))?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    print_success(&format!("Imported release {} into {}/{}", result.release_id, website, env));
    print_stat("Files", &result.file_count.to_string());
    print_stat("Hash", &short_hash(&result.hash));
    print_stat("Duration", &format_duration(start.elapsed()));
  }
  Ok(())
}
