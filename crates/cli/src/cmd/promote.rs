//! Implementation of the `sitevault promote` command.

use std::time::Instant;

use anyhow::{Context, Result};

use sitevault_lib::ctx::OpContext;
use sitevault_lib::release::promote;

use super::Vault;
use crate::output::{
  OutputFormat, format_duration, format_transition, print_json, print_stat, print_success, print_warning, short_hash,
};

/// Promote the active release of `from` into `to` and report the new release.
///
/// Metadata host warnings go to stderr in text mode and are part of the JSON
/// document otherwise; they never fail the command.
pub fn cmd_promote(vault: &Vault, website: &str, from: &str, to: &str, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let db = vault.open_db()?;

  let result = promote(&OpContext::background(), &db, &vault.websites_dir(), website, from, to)
    .with_context(|| format!("Promotion of {} from {} to {} failed", website, from, to))?;

  if output.is_json() {
    print_json(&result)?;
    return Ok(());
  }

  print_success(&format!("Promoted {}/{}", website, format_transition(Some(from), to)));
  print_stat("Release", &format_transition(Some(&result.source_release_id), &result.release_id));
  print_stat("Files", &result.file_count.to_string());
  print_stat("Strategy", result.strategy.as_str());
  print_stat("Hash", &short_hash(&result.hash));
  print_stat("Duration", &format_duration(start.elapsed()));
  for warning in &result.warnings {
    print_warning(warning);
  }
  Ok(())
}
