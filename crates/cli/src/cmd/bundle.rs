use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use sitevault_lib::bundle::{Bundle, IngestStats, ingest_bundle, read_tar};
use sitevault_lib::ctx::OpContext;

use super::Vault;
use crate::output::{OutputFormat, format_bytes, print_json, print_stat, print_success, print_warning};

#[derive(Subcommand, Debug)]
pub enum BundleCommand {
  /// Check that every file a bundle's manifest references is present and intact
  Verify {
    /// Path to the bundle tar file
    file: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Verify a bundle and store its files in the blob store
  Ingest {
    /// Path to the bundle tar file
    file: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

#[derive(Debug, Serialize)]
struct VerifySummary<'a> {
  website: &'a str,
  mode: &'a str,
  resources: usize,
  files: usize,
  bytes: u64,
  extra_files: &'a [String],
}

#[derive(Debug, Serialize)]
struct IngestSummary<'a> {
  website: &'a str,
  #[serde(flatten)]
  stats: &'a IngestStats,
}

fn open_bundle(path: &Path) -> Result<Bundle> {
  let file = File::open(path).with_context(|| format!("Failed to open bundle {}", path.display()))?;
  read_tar(BufReader::new(file)).with_context(|| format!("Bundle {} failed verification", path.display()))
}

pub fn cmd_bundle(vault: &Vault, command: BundleCommand) -> Result<()> {
  match command {
    BundleCommand::Verify { file, output } => {
      let bundle = open_bundle(&file)?;
      let summary = VerifySummary {
        website: &bundle.manifest.website,
        mode: &bundle.manifest.mode,
        resources: bundle.manifest.resources.len(),
        files: bundle.files.len(),
        bytes: bundle.files.values().map(|content| content.len() as u64).sum(),
        extra_files: &bundle.extra_files,
      };
      if output.is_json() {
        return print_json(&summary);
      }
      print_success(&format!("Bundle {} verified", file.display()));
      print_stat("Website", summary.website);
      print_stat("Mode", summary.mode);
      print_stat("Resources", &summary.resources.to_string());
      print_stat("Files", &summary.files.to_string());
      print_stat("Size", &format_bytes(summary.bytes));
      for extra in summary.extra_files {
        print_warning(&format!("unreferenced archive member {}", extra));
      }
    }
    BundleCommand::Ingest { file, output } => {
      let bundle = open_bundle(&file)?;
      let stats = ingest_bundle(&OpContext::background(), &vault.blobs(), &bundle).context("Failed to store bundle files")?;
      if output.is_json() {
        return print_json(&IngestSummary {
          website: &bundle.manifest.website,
          stats: &stats,
        });
      }
      print_success(&format!("Bundle {} ingested", file.display()));
      print_stat("Stored", &stats.created.to_string());
      print_stat("Deduplicated", &stats.deduplicated.to_string());
      print_stat("Written", &format_bytes(stats.bytes_written));
    }
  }
  Ok(())
}
