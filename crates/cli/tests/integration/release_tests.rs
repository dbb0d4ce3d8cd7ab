use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn import_then_promote_to_prod() {
  let env = TestEnv::with_site();
  let out = env.site_output("out", "v1");
  let staging_id = env.import("staging", &out);
  assert_eq!(env.current_target("staging"), format!("releases/{}", staging_id));

  let result = env.run_json(&["promote", "futurelab", "staging", "prod"]);
  let prod_id = result["release_id"].as_str().unwrap();
  assert_eq!(result["source_release_id"], staging_id.as_str());
  assert_eq!(result["file_count"], 2);
  assert!(result["hash"].as_str().unwrap().starts_with("sha256:"));
  assert_ne!(prod_id, staging_id);

  assert_eq!(env.current_target("prod"), format!("releases/{}", prod_id));
  let served = std::fs::read_to_string(env.env_dir("prod").join("current").join("index.html")).unwrap();
  assert_eq!(served, "<h1>v1</h1>");
}

#[test]
fn promote_text_output_reports_strategy() {
  let env = TestEnv::with_site();
  let out = env.site_output("out", "v1");
  env.import("staging", &out);

  env
    .cmd()
    .args(["promote", "futurelab", "staging", "prod"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Strategy"))
    .stdout(predicate::str::contains("Files"));
}

#[test]
fn promote_to_same_environment_fails() {
  let env = TestEnv::with_site();
  env
    .cmd()
    .args(["promote", "futurelab", "staging", "staging"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("source and target environments must be different"));
}

#[test]
fn promote_without_active_release_fails() {
  let env = TestEnv::with_site();
  env
    .cmd()
    .args(["promote", "futurelab", "staging", "prod"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no active release"));
  assert!(!env.env_dir("prod").join("current").exists());
}

#[test]
fn rollback_and_activate() {
  let env = TestEnv::with_site();
  let first = env.import("staging", &env.site_output("v1", "v1"));
  let second = env.import("staging", &env.site_output("v2", "v2"));
  assert_eq!(env.current_target("staging"), format!("releases/{}", second));

  let result = env.run_json(&["rollback", "futurelab", "staging"]);
  assert_eq!(result["from_release_id"], second.as_str());
  assert_eq!(result["to_release_id"], first.as_str());
  assert_eq!(env.current_target("staging"), format!("releases/{}", first));

  env
    .cmd()
    .args(["rollback", "futurelab", "staging"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no previous release"));

  env.run(&["activate", "futurelab", "staging", &second]);
  assert_eq!(env.current_target("staging"), format!("releases/{}", second));
}

#[test]
fn status_lists_environments_and_history() {
  let env = TestEnv::with_site();
  env.run(&["domain", "bind", "futurelab", "prod", "FutureLab.example"]);
  let id = env.import("staging", &env.site_output("out", "v1"));

  let envs = env.run_json(&["status", "futurelab"]);
  let envs = envs.as_array().unwrap();
  assert_eq!(envs.len(), 2);
  let staging = envs.iter().find(|e| e["name"] == "staging").unwrap();
  assert_eq!(staging["active_release_id"], id.as_str());
  assert_eq!(staging["current_target"], format!("releases/{}", id).as_str());
  let prod = envs.iter().find(|e| e["name"] == "prod").unwrap();
  assert_eq!(prod["domains"][0], "futurelab.example");
  assert!(prod["active_release_id"].is_null());

  let history = env.run_json(&["status", "futurelab", "staging"]);
  assert_eq!(history[0]["id"], id.as_str());
  assert_eq!(history[0]["active"], true);
  assert_eq!(history[0]["status"], "active");
}

#[test]
fn unknown_website_fails() {
  let env = TestEnv::with_site();
  env
    .cmd()
    .args(["status", "nosuchsite"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}

#[test]
fn import_missing_directory_fails() {
  let env = TestEnv::with_site();
  let missing = env.temp.path().join("missing");
  env
    .cmd()
    .args(["import", "futurelab", "staging"])
    .arg(&missing)
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not exist"));
}
