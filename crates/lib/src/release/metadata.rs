//! Release metadata files derived during promotion and import.

use std::time::SystemTime;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error("parse source manifest metadata: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("source manifest metadata is not a JSON object")]
  NotAnObject,

  #[error("marshal release manifest metadata: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// Manifest metadata of a promoted release.
///
/// A shallow copy of the source manifest's top-level object with the
/// environment replaced and the promotion provenance recorded. Blank or `null`
/// source metadata starts from an empty object.
pub fn promoted_manifest_json(
  source_manifest_json: &str,
  source_env: &str,
  target_env: &str,
  source_release_id: &str,
  now: SystemTime,
) -> Result<String, MetadataError> {
  let mut manifest = parse_object(source_manifest_json)?;
  manifest.insert("environment".to_string(), Value::from(target_env));
  manifest.insert("generatedAt".to_string(), Value::from(timestamp(now)));
  manifest.insert("sourceReleaseId".to_string(), Value::from(source_release_id));
  manifest.insert("sourceEnv".to_string(), Value::from(source_env));
  serde_json::to_string_pretty(&Value::Object(manifest)).map_err(MetadataError::Serialize)
}

/// Manifest metadata of a release imported from a directory.
pub fn imported_manifest_json(
  website: &str,
  env: &str,
  release_id: &str,
  file_count: usize,
  now: SystemTime,
) -> Result<String, MetadataError> {
  let mut manifest = Map::new();
  manifest.insert("website".to_string(), Value::from(website));
  manifest.insert("environment".to_string(), Value::from(env));
  manifest.insert("releaseId".to_string(), Value::from(release_id));
  manifest.insert("fileCount".to_string(), Value::from(file_count));
  manifest.insert("generatedAt".to_string(), Value::from(timestamp(now)));
  serde_json::to_string_pretty(&Value::Object(manifest)).map_err(MetadataError::Serialize)
}

pub fn promoted_build_log(source_release_id: &str, source_env: &str, target_env: &str, now: SystemTime) -> String {
  format!(
    "{} promoted release {} from {} to {}\n",
    timestamp(now),
    source_release_id,
    source_env,
    target_env
  )
}

pub fn imported_build_log(release_id: &str, source: &str, now: SystemTime) -> String {
  format!("{} imported release {} from {}\n", timestamp(now), release_id, source)
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, MetadataError> {
  if raw.trim().is_empty() {
    return Ok(Map::new());
  }
  match serde_json::from_str(raw).map_err(MetadataError::Parse)? {
    Value::Object(map) => Ok(map),
    Value::Null => Ok(Map::new()),
    _ => Err(MetadataError::NotAnObject),
  }
}

fn timestamp(now: SystemTime) -> String {
  humantime::format_rfc3339_nanos(now).to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::{Duration, UNIX_EPOCH};

  fn at() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
  }

  #[test]
  fn promoted_manifest_keeps_source_fields() {
    let source = r#"{"website":"futurelab","environment":"staging","resources":{"pages":[]}}"#;
    let out = promoted_manifest_json(source, "staging", "prod", "01ARZ3NDEKTSV4RRFFQ69G5FAA", at()).unwrap();
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["website"], "futurelab");
    assert_eq!(value["environment"], "prod");
    assert_eq!(value["sourceEnv"], "staging");
    assert_eq!(value["sourceReleaseId"], "01ARZ3NDEKTSV4RRFFQ69G5FAA");
    assert_eq!(value["generatedAt"], "2023-11-14T22:13:20.000000000Z");
    assert!(value["resources"]["pages"].is_array());
  }

  #[test]
  fn blank_and_null_source_start_empty() {
    for source in ["", "  ", "null"] {
      let out = promoted_manifest_json(source, "staging", "prod", "R", at()).unwrap();
      let value: Value = serde_json::from_str(&out).unwrap();
      assert_eq!(value.as_object().unwrap().len(), 4);
    }
  }

  #[test]
  fn malformed_source_is_rejected() {
    assert!(matches!(
      promoted_manifest_json("{oops", "staging", "prod", "R", at()),
      Err(MetadataError::Parse(_))
    ));
    assert!(matches!(
      promoted_manifest_json("[1]", "staging", "prod", "R", at()),
      Err(MetadataError::NotAnObject)
    ));
  }

  #[test]
  fn build_log_line() {
    assert_eq!(
      promoted_build_log("R1", "staging", "prod", at()),
      "2023-11-14T22:13:20.000000000Z promoted release R1 from staging to prod\n"
    );
  }
}
