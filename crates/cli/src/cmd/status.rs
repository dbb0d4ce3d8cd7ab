//! Status command implementation.
//!
//! Shows the environments of a website with their active release and what
//! `current` points at on disk, or the release history of one environment.

use anyhow::Result;
use serde::Serialize;

use sitevault_lib::ctx::OpContext;
use sitevault_lib::db::MetadataStore;
use sitevault_lib::release::{EnvLayout, read_current_target};

use super::Vault;
use super::site::{find_env, find_website};
use crate::output::{self, OutputFormat, print_info, print_json, print_stat, print_success, print_warning};

#[derive(Debug, Serialize)]
struct EnvStatus {
  name: String,
  active_release_id: Option<String>,
  current_target: Option<String>,
  domains: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReleaseStatus {
  id: String,
  status: String,
  created_at: String,
  active: bool,
}

pub fn cmd_status(vault: &Vault, website: &str, env: Option<&str>, output: OutputFormat) -> Result<()> {
  let db = vault.open_db()?;
  let ctx = OpContext::background();
  let site = find_website(&db, &ctx, website)?;

  if let Some(env) = env {
    let env = find_env(&db, &ctx, &site, env)?;
    let releases: Vec<ReleaseStatus> = db
      .list_releases_by_environment(&ctx, env.id)?
      .into_iter()
      .map(|r| ReleaseStatus {
        active: env.active_release_id.as_deref() == Some(r.id.as_str()),
        id: r.id,
        status: r.status,
        created_at: r.created_at,
      })
      .collect();

    if output.is_json() {
      return print_json(&releases);
    }
    if releases.is_empty() {
      print_info(&format!("No releases in {}/{}", site.name, env.name));
      return Ok(());
    }
    print_success(&format!("Releases of {}/{}", site.name, env.name));
    for release in &releases {
      let marker = if release.active {
        output::symbols::ARROW
      } else {
        output::symbols::INFO
      };
      println!("  {} {} {} {}", marker, release.id, release.status, release.created_at);
    }
    return Ok(());
  }

  let websites_dir = vault.websites_dir();
  let mut envs = Vec::new();
  for env in db.list_environments(site.id)? {
    let layout = EnvLayout::new(&websites_dir, &site.name, &env.name);
    envs.push(EnvStatus {
      current_target: read_current_target(layout.env_dir())?,
      domains: db.list_domain_bindings(&ctx, &site.name, &env.name)?,
      name: env.name,
      active_release_id: env.active_release_id,
    });
  }

  if output.is_json() {
    return print_json(&envs);
  }
  print_success(&format!("Website {}", site.name));
  if envs.is_empty() {
    print_info("No environments");
  }
  for env in &envs {
    println!();
    println!("{}:", env.name);
    print_stat("Active", env.active_release_id.as_deref().unwrap_or("(none)"));
    print_stat("Current", env.current_target.as_deref().unwrap_or("(none)"));
    if !env.domains.is_empty() {
      print_stat("Domains", &env.domains.join(", "));
    }
    let expected = env.active_release_id.as_ref().map(|id| format!("releases/{}", id));
    if expected != env.current_target {
      print_warning(&format!("{}: current link does not match the active release", env.name));
    }
  }
  Ok(())
}
