use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn gc_with_no_websites_succeeds() {
  let env = TestEnv::empty();

  env
    .cmd()
    .arg("gc")
    .assert()
    .success()
    .stdout(predicate::str::contains("Garbage collection complete"));
}

#[test]
fn gc_dry_run_keeps_staging() {
  let env = TestEnv::with_site();
  env.import("staging", &env.site_output("out", "v1"));
  let staging = env.env_dir("staging").join("releases").join("01ARZ3NDEKTSV4RRFFQ69G5FAV.tmp");
  std::fs::create_dir_all(&staging).unwrap();

  env
    .cmd()
    .args(["gc", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));
  assert!(staging.exists());
}

#[test]
fn gc_removes_orphaned_staging_only() {
  let env = TestEnv::with_site();
  let id = env.import("staging", &env.site_output("out", "v1"));
  let releases = env.env_dir("staging").join("releases");
  std::fs::create_dir_all(releases.join("01ARZ3NDEKTSV4RRFFQ69G5FAV.tmp")).unwrap();

  let result = env.run_json(&["gc"]);
  assert_eq!(result["stats"]["staging_deleted"], 1);
  assert_eq!(result["deleted_paths"].as_array().unwrap().len(), 1);
  assert!(!releases.join("01ARZ3NDEKTSV4RRFFQ69G5FAV.tmp").exists());
  assert!(releases.join(&id).join("index.html").exists());
}

#[test]
fn gc_older_than_keeps_fresh_staging() {
  let env = TestEnv::with_site();
  env.import("staging", &env.site_output("out", "v1"));
  let staging = env.env_dir("staging").join("releases").join("01ARZ3NDEKTSV4RRFFQ69G5FAV.tmp");
  std::fs::create_dir_all(&staging).unwrap();

  let result = env.run_json(&["gc", "--older-than", "1h"]);
  assert_eq!(result["stats"]["staging_kept"], 1);
  assert_eq!(result["stats"]["staging_deleted"], 0);
  assert!(staging.exists());
}
