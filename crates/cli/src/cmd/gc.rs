use std::time::{Duration, Instant};

use anyhow::Result;

use sitevault_lib::gc::{SweepOptions, sweep_staging};

use super::Vault;
use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_gc(vault: &Vault, dry_run: bool, older_than: Option<Duration>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let options = SweepOptions { dry_run, older_than };
  let result = sweep_staging(&vault.websites_dir(), &options)?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    println!();
    if dry_run {
      print_info("Dry run - no changes made");
    } else {
      print_success("Garbage collection complete!");
    }
    print_stat("Staging dirs removed", &result.stats.staging_deleted.to_string());
    print_stat("Staging dirs kept", &result.stats.staging_kept.to_string());
    print_stat("Environments skipped", &result.stats.environments_skipped.to_string());
    print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
