//! Website, environment and domain binding management.

use anyhow::{Context, Result, bail};
use clap::Subcommand;

use sitevault_lib::ctx::OpContext;
use sitevault_lib::db::{EnvironmentRow, JsonMetadataStore, MetadataStore, WebsiteRow};

use super::Vault;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

#[derive(Subcommand, Debug)]
pub enum WebsiteCommand {
  /// Register a website
  Create {
    name: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// List registered websites
  List {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
  /// Add an environment to a website
  Create {
    website: String,
    name: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

#[derive(Subcommand, Debug)]
pub enum DomainCommand {
  /// Bind a domain to an environment
  Bind {
    website: String,
    env: String,
    domain: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

pub(super) fn find_website(db: &JsonMetadataStore, ctx: &OpContext, name: &str) -> Result<WebsiteRow> {
  match db.get_website_by_name(ctx, name)? {
    Some(row) => Ok(row),
    None => bail!("Website {:?} not found", name),
  }
}

pub(super) fn find_env(db: &JsonMetadataStore, ctx: &OpContext, website: &WebsiteRow, name: &str) -> Result<EnvironmentRow> {
  match db.get_environment_by_name(ctx, website.id, name)? {
    Some(row) => Ok(row),
    None => bail!("Environment {:?} not found in website {:?}", name, website.name),
  }
}

pub fn cmd_website(vault: &Vault, command: WebsiteCommand) -> Result<()> {
  let db = vault.open_db()?;
  match command {
    WebsiteCommand::Create { name, output } => {
      let row = db.create_website(&name).context("Failed to create website")?;
      if output.is_json() {
        print_json(&row)?;
      } else {
        print_success(&format!("Created website {}", row.name));
      }
    }
    WebsiteCommand::List { output } => {
      let websites = db.list_websites()?;
      if output.is_json() {
        print_json(&websites)?;
      } else if websites.is_empty() {
        print_info("No websites registered");
      } else {
        for site in &websites {
          print_stat(&site.name, &site.created_at);
        }
      }
    }
  }
  Ok(())
}

pub fn cmd_env(vault: &Vault, command: EnvCommand) -> Result<()> {
  let db = vault.open_db()?;
  let ctx = OpContext::background();
  match command {
    EnvCommand::Create { website, name, output } => {
      let site = find_website(&db, &ctx, &website)?;
      let row = db
        .create_environment(site.id, &name)
        .context("Failed to create environment")?;
      if output.is_json() {
        print_json(&row)?;
      } else {
        print_success(&format!("Created environment {}/{}", site.name, row.name));
      }
    }
  }
  Ok(())
}

pub fn cmd_domain(vault: &Vault, command: DomainCommand) -> Result<()> {
  let db = vault.open_db()?;
  let ctx = OpContext::background();
  match command {
    DomainCommand::Bind {
      website,
      env,
      domain,
      output,
    } => {
      let site = find_website(&db, &ctx, &website)?;
      let env = find_env(&db, &ctx, &site, &env)?;
      let row = db.bind_domain(env.id, &domain).context("Failed to bind domain")?;
      if output.is_json() {
        print_json(&row)?;
      } else {
        print_success(&format!("Bound {} to {}/{}", row.domain, site.name, env.name));
      }
    }
  }
  Ok(())
}
