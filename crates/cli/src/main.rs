mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BundleCommand, DomainCommand, EnvCommand, WebsiteCommand};
use output::OutputFormat;

/// sitevault - content-addressed release storage for static websites
#[derive(Parser)]
#[command(name = "sitevault")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Data directory (default: $SITEVAULT_DATA_DIR or the platform data dir)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage websites
  #[command(subcommand)]
  Website(WebsiteCommand),

  /// Manage environments of a website
  #[command(subcommand)]
  Env(EnvCommand),

  /// Manage domain bindings
  #[command(subcommand)]
  Domain(DomainCommand),

  /// Verify bundles and store their files
  #[command(subcommand)]
  Bundle(BundleCommand),

  /// Create and activate a release from a directory
  Import {
    website: String,
    env: String,
    /// Directory holding the rendered site
    dir: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Promote the active release of one environment into another
  Promote {
    website: String,
    from: String,
    to: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Re-activate the release before the active one
  Rollback {
    website: String,
    env: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Activate a specific release of an environment
  Activate {
    website: String,
    env: String,
    release_id: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show environments and release history of a website
  Status {
    website: String,
    /// Limit to one environment and list its releases
    env: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Remove staging directories left by interrupted operations
  Gc {
    /// Show what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Only remove staging directories older than this (e.g., "1h", "2d")
    #[arg(long, value_parser = humantime::parse_duration)]
    older_than: Option<Duration>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  if let Err(err) = run(cli) {
    output::print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let vault = cmd::Vault::resolve(cli.data_dir)?;

  match cli.command {
    Commands::Website(command) => cmd::cmd_website(&vault, command),
    Commands::Env(command) => cmd::cmd_env(&vault, command),
    Commands::Domain(command) => cmd::cmd_domain(&vault, command),
    Commands::Bundle(command) => cmd::cmd_bundle(&vault, command),
    Commands::Import {
      website,
      env,
      dir,
      output,
    } => cmd::cmd_import(&vault, &website, &env, &dir, output),
    Commands::Promote {
      website,
      from,
      to,
      output,
    } => cmd::cmd_promote(&vault, &website, &from, &to, output),
    Commands::Rollback { website, env, output } => cmd::cmd_rollback(&vault, &website, &env, output),
    Commands::Activate {
      website,
      env,
      release_id,
      output,
    } => cmd::cmd_activate(&vault, &website, &env, &release_id, output),
    Commands::Status { website, env, output } => cmd::cmd_status(&vault, &website, env.as_deref(), output),
    Commands::Gc {
      dry_run,
      older_than,
      output,
    } => cmd::cmd_gc(&vault, dry_run, older_than, output),
  }
}
