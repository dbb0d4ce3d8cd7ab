use std::collections::BTreeMap;
use std::path::PathBuf;

use predicates::prelude::*;
use sitevault_lib::bundle::build_tar;
use sitevault_lib::manifest::{ApplyMode, Manifest, Resource, ResourceKind};
use sitevault_lib::util::hash::hash_bytes;

use super::common::TestEnv;

fn write_bundle(env: &TestEnv, name: &str, tamper: bool) -> PathBuf {
  let mut files = BTreeMap::new();
  files.insert("website.yaml".to_string(), b"name: futurelab\n".to_vec());
  files.insert("assets/logo.svg".to_string(), b"<svg/>\n".to_vec());
  let hash = |path: &str| hash_bytes(&files[path]).hex().to_string();
  let manifest = Manifest::new(
    ApplyMode::Full,
    "futurelab",
    vec![
      Resource::single(ResourceKind::Website, "futurelab", "website.yaml", hash("website.yaml")),
      Resource::single(ResourceKind::Asset, "assets/logo.svg", "assets/logo.svg", hash("assets/logo.svg")),
    ],
  );
  if tamper {
    files.insert("assets/logo.svg".to_string(), b"<svg onload=x/>\n".to_vec());
  }
  let archive = build_tar(&manifest, &files).unwrap();
  let path = env.temp.path().join(name);
  std::fs::write(&path, archive).unwrap();
  path
}

#[test]
fn verify_reports_bundle_summary() {
  let env = TestEnv::empty();
  let bundle = write_bundle(&env, "site.tar", false);

  let summary = env.run_json(&["bundle", "verify", bundle.to_str().unwrap()]);
  assert_eq!(summary["website"], "futurelab");
  assert_eq!(summary["mode"], "full");
  assert_eq!(summary["resources"], 2);
  assert_eq!(summary["files"], 2);
}

#[test]
fn verify_rejects_tampered_bundle() {
  let env = TestEnv::empty();
  let bundle = write_bundle(&env, "bad.tar", true);

  env
    .cmd()
    .args(["bundle", "verify"])
    .arg(&bundle)
    .assert()
    .failure()
    .stderr(predicate::str::contains("hash mismatches: assets/logo.svg"));
}

#[test]
fn ingest_deduplicates_on_second_run() {
  let env = TestEnv::empty();
  let bundle = write_bundle(&env, "site.tar", false);
  let path = bundle.to_str().unwrap();

  let first = env.run_json(&["bundle", "ingest", path]);
  assert_eq!(first["created"], 2);
  assert_eq!(first["deduplicated"], 0);

  let second = env.run_json(&["bundle", "ingest", path]);
  assert_eq!(second["created"], 0);
  assert_eq!(second["deduplicated"], 2);

  let logo = hash_bytes(b"<svg/>\n");
  let blob = env.data_path().join("blobs").join(logo.hex());
  assert_eq!(std::fs::read(blob).unwrap(), b"<svg/>\n");
}
