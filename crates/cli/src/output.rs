//! Terminal and JSON rendering for command results.
//!
//! Status lines go to stdout, problems to stderr. Colors are only applied when
//! the stream supports them.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use sitevault_lib::util::hash::ContentHash;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  /// Marks the active release and release transitions.
  pub const ARROW: &str = "→";
}

/// Hex digits shown for a content hash.
const SHORT_HASH_LEN: usize = 12;

/// `sha256:` plus the first hex digits, enough to tell releases apart.
pub fn short_hash(hash: &ContentHash) -> String {
  let hex = hash.hex();
  format!("sha256:{}", &hex[..hex.len().min(SHORT_HASH_LEN)])
}

pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];

  let mut value = bytes as f64;
  let mut unit = None;
  for next in UNITS {
    if value < 1024.0 {
      break;
    }
    value /= 1024.0;
    unit = Some(next);
  }
  match unit {
    Some(unit) => format!("{:.1} {}", value, unit),
    None => format!("{} B", bytes),
  }
}

pub fn format_duration(duration: Duration) -> String {
  match (duration.as_secs(), duration.subsec_millis()) {
    (secs, _) if secs >= 60 => format!("{}m {}s", secs / 60, secs % 60),
    (0, millis) => format!("{}ms", millis),
    (secs, millis) => format!("{}.{:02}s", secs, millis / 10),
  }
}

/// `from → to`, with `(none)` for an environment that had no active release.
pub fn format_transition(from: Option<&str>, to: &str) -> String {
  format!("{} {} {}", from.unwrap_or("(none)"), symbols::ARROW, to)
}

pub fn print_success(message: &str) {
  println!("{} {}", symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn print_info(message: &str) {
  println!("{} {}", symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()), message);
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

/// Soft problems such as promotion warnings; never changes the exit code.
pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

/// An indented `label: value` line under a status line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize result as JSON")?;
  println!("{}", json);
  Ok(())
}
