use anyhow::{Context, Result};

use sitevault_lib::ctx::OpContext;
use sitevault_lib::release::{RollbackResult, activate_release, rollback};

use super::Vault;
use crate::output::{OutputFormat, format_transition, print_json, print_stat, print_success};

pub fn cmd_rollback(vault: &Vault, website: &str, env: &str, output: OutputFormat) -> Result<()> {
  let db = vault.open_db()?;
  let result = rollback(&OpContext::background(), &db, &vault.websites_dir(), website, env)
    .with_context(|| format!("Rollback of {}/{} failed", website, env))?;
  report(&result, &format!("Rolled back {}/{}", website, env), output)
}

pub fn cmd_activate(vault: &Vault, website: &str, env: &str, release_id: &str, output: OutputFormat) -> Result<()> {
  let db = vault.open_db()?;
  let result = activate_release(
    &OpContext::background(),
    &db,
    &vault.websites_dir(),
    website,
    env,
    release_id,
  )
  .with_context(|| format!("Activation of {} in {}/{} failed", release_id, website, env))?;
  report(&result, &format!("Activated release in {}/{}", website, env), output)
}

fn report(result: &RollbackResult, headline: &str, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    return print_json(result);
  }
  print_success(headline);
  print_stat(
    "Release",
    &format_transition(result.from_release_id.as_deref(), &result.to_release_id),
  );
  Ok(())
}
