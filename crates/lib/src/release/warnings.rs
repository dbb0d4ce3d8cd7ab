//! Promotion advisories about page metadata URLs.
//!
//! A page whose canonical or social URLs point at a host served by the source
//! environment (or, when promoting to `prod`, at a staging-looking host) keeps
//! working after promotion but advertises the wrong site. Such URLs are
//! reported as warnings; they never block a promotion.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::{Host, Url};

use crate::consts::MAX_PROMOTE_WARNINGS;
use crate::ctx::OpContext;
use crate::db::{DbError, MetadataStore};

#[derive(Debug, Error)]
pub enum WarningsError {
  #[error("parse release manifest json: {0}")]
  Manifest(#[source] serde_json::Error),

  #[error("parse head metadata for page {page:?}: {source}")]
  PageHead {
    page: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("list domain bindings: {0}")]
  Bindings(#[from] DbError),
}

#[derive(Debug, Default, Deserialize)]
struct ManifestSnapshot {
  #[serde(default)]
  resources: ManifestResources,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestResources {
  #[serde(default)]
  pages: Vec<ManifestPage>,
}

#[derive(Debug, Deserialize)]
struct ManifestPage {
  #[serde(default)]
  name: String,
  #[serde(default)]
  head: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageHead {
  #[serde(default, rename = "canonicalURL")]
  canonical_url: String,
  #[serde(default)]
  open_graph: Option<SocialMeta>,
  #[serde(default)]
  twitter: Option<SocialMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct SocialMeta {
  #[serde(default)]
  url: String,
  #[serde(default)]
  image: String,
}

/// Warnings for a promotion of `manifest_json` from `source_env` to `target_env`.
pub fn collect_promote_warnings(
  ctx: &OpContext,
  db: &dyn MetadataStore,
  website: &str,
  source_env: &str,
  target_env: &str,
  manifest_json: &str,
) -> Result<Vec<String>, WarningsError> {
  let source_hosts = db.list_domain_bindings(ctx, website, source_env)?;
  let target_hosts = db.list_domain_bindings(ctx, website, target_env)?;
  metadata_host_warnings(manifest_json, &source_hosts, &target_hosts, target_env)
}

/// Warnings for page metadata URLs that do not belong to `target_env`.
///
/// At most [`MAX_PROMOTE_WARNINGS`] entries are returned; the last one then
/// reports how many were omitted.
pub fn metadata_host_warnings(
  manifest_json: &str,
  source_hosts: &[String],
  target_hosts: &[String],
  target_env: &str,
) -> Result<Vec<String>, WarningsError> {
  let manifest: ManifestSnapshot = if manifest_json.trim().is_empty() {
    ManifestSnapshot::default()
  } else {
    serde_json::from_str(manifest_json).map_err(WarningsError::Manifest)?
  };

  let source_hosts = host_set(source_hosts);
  let target_hosts = host_set(target_hosts);
  let target_is_prod = target_env.trim().eq_ignore_ascii_case("prod");

  let mut warnings = Vec::new();
  for page in &manifest.resources.pages {
    let head = parse_head(page)?;
    for (field, value) in url_fields(&head) {
      let Some(host) = url_host(value) else {
        continue;
      };
      if target_hosts.contains(&host) {
        continue;
      }
      if !source_hosts.contains(&host) && !(target_is_prod && looks_like_staging_host(&host)) {
        continue;
      }
      warnings.push(format!(
        "page={} field={} host={} does not match target environment {} domains",
        page.name, field, host, target_env
      ));
    }
  }

  if warnings.len() > MAX_PROMOTE_WARNINGS {
    let omitted = warnings.len() - (MAX_PROMOTE_WARNINGS - 1);
    warnings.truncate(MAX_PROMOTE_WARNINGS - 1);
    warnings.push(format!("additional metadata host warnings omitted: {}", omitted));
  }
  Ok(warnings)
}

fn parse_head(page: &ManifestPage) -> Result<PageHead, WarningsError> {
  if page.head.is_null() {
    return Ok(PageHead::default());
  }
  PageHead::deserialize(&page.head).map_err(|source| WarningsError::PageHead {
    page: page.name.clone(),
    source,
  })
}

fn url_fields(head: &PageHead) -> Vec<(&'static str, &str)> {
  let mut fields = vec![("canonicalURL", head.canonical_url.trim())];
  if let Some(og) = &head.open_graph {
    fields.push(("openGraph.url", og.url.trim()));
    fields.push(("openGraph.image", og.image.trim()));
  }
  if let Some(twitter) = &head.twitter {
    fields.push(("twitter.url", twitter.url.trim()));
    fields.push(("twitter.image", twitter.image.trim()));
  }
  fields.retain(|(_, value)| !value.is_empty());
  fields
}

/// Lowercased host of an absolute http(s) URL.
fn url_host(raw: &str) -> Option<String> {
  let url = Url::parse(raw.trim()).ok()?;
  if url.scheme() != "http" && url.scheme() != "https" {
    return None;
  }
  let host = match url.host()? {
    Host::Domain(domain) => domain.to_ascii_lowercase(),
    Host::Ipv4(addr) => addr.to_string(),
    Host::Ipv6(addr) => addr.to_string(),
  };
  (!host.is_empty()).then_some(host)
}

fn host_set(hosts: &[String]) -> HashSet<String> {
  hosts
    .iter()
    .map(|h| h.trim().to_ascii_lowercase())
    .filter(|h| !h.is_empty())
    .collect()
}

/// Whether any alphanumeric label of `host` is exactly `staging`.
fn looks_like_staging_host(host: &str) -> bool {
  host
    .to_ascii_lowercase()
    .split(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit())
    .any(|part| part == "staging")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn manifest(pages: Value) -> String {
    json!({ "website": "futurelab", "resources": { "pages": pages } }).to_string()
  }

  fn hosts(list: &[&str]) -> Vec<String> {
    list.iter().map(|h| h.to_string()).collect()
  }

  #[test]
  fn source_hosts_are_reported_target_hosts_are_not() {
    let json = manifest(json!([
      {
        "name": "index",
        "head": {
          "canonicalURL": "https://Staging.Example.com/",
          "openGraph": { "url": "https://example.com/", "image": "https://staging.example.com/og.png" },
          "twitter": { "url": "/relative", "image": "mailto:someone@example.com" }
        }
      },
      { "name": "about", "head": null },
      { "name": "blog" }
    ]));

    let warnings =
      metadata_host_warnings(&json, &hosts(&["staging.example.com"]), &hosts(&["example.com"]), "prod").unwrap();
    assert_eq!(
      warnings,
      vec![
        "page=index field=canonicalURL host=staging.example.com does not match target environment prod domains",
        "page=index field=openGraph.image host=staging.example.com does not match target environment prod domains",
      ]
    );
  }

  #[test]
  fn staging_looking_hosts_only_flagged_for_prod() {
    let json = manifest(json!([
      { "name": "index", "head": { "canonicalURL": "https://preview-staging.cdn.net/" } },
      { "name": "docs", "head": { "canonicalURL": "https://stagingarea.cdn.net/" } }
    ]));

    let prod = metadata_host_warnings(&json, &[], &[], "PROD").unwrap();
    assert_eq!(prod.len(), 1);
    assert!(prod[0].contains("host=preview-staging.cdn.net"));

    assert!(metadata_host_warnings(&json, &[], &[], "qa").unwrap().is_empty());
  }

  #[test]
  fn warnings_are_capped() {
    let pages: Vec<Value> = (0..25)
      .map(|i| json!({ "name": format!("p{i}"), "head": { "canonicalURL": "https://staging.example.com/" } }))
      .collect();
    let json = manifest(Value::Array(pages));

    let warnings = metadata_host_warnings(&json, &hosts(&["staging.example.com"]), &[], "prod").unwrap();
    assert_eq!(warnings.len(), MAX_PROMOTE_WARNINGS);
    assert!(warnings[MAX_PROMOTE_WARNINGS - 2].starts_with("page=p18 "));
    assert_eq!(warnings.last().unwrap(), "additional metadata host warnings omitted: 6");
  }

  #[test]
  fn manifests_without_pages_have_no_warnings() {
    assert!(metadata_host_warnings("", &[], &[], "prod").unwrap().is_empty());
    assert!(
      metadata_host_warnings(r#"{"website":"futurelab"}"#, &[], &[], "prod")
        .unwrap()
        .is_empty()
    );
  }

  #[test]
  fn malformed_metadata_is_an_error() {
    assert!(matches!(
      metadata_host_warnings("{oops", &[], &[], "prod"),
      Err(WarningsError::Manifest(_))
    ));
    let json = manifest(json!([{ "name": "index", "head": { "canonicalURL": 7 } }]));
    let err = metadata_host_warnings(&json, &[], &[], "prod").unwrap_err();
    assert!(err.to_string().starts_with("parse head metadata for page \"index\""));
  }

  #[test]
  fn staging_label_detection() {
    assert!(looks_like_staging_host("staging.example.com"));
    assert!(looks_like_staging_host("www-staging.example.com"));
    assert!(!looks_like_staging_host("stagingexample.com"));
    assert!(!looks_like_staging_host(""));
  }
}
