//! Integration tests for the offline CLI commands.
//!
//! - `qadeck config show` - resolved configuration and value sources
//! - `qadeck repair ids` - friendly ID renumbering
//! - `qadeck repair links` - link symmetry restoration

mod common;

use common::TestEnv;
use predicates::prelude::*;
use qadeck::auth::{DEMO_QA_USER, Identity};
use qadeck::commands::auth::ensure_demo_users;
use qadeck::commands::bugs::{NewBug, create_bug};
use qadeck::commands::projects::{NewProject, create_project};
use qadeck::commands::test_cases::{NewTestCase, create_test_case};
use qadeck::models::{Role, TestCase};
use qadeck::storage::{Storage, load, replace};
use serde_json::Value;

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

/// Seed two test cases sharing a friendly ID and a bug with one one-sided
/// link and one dangling link.
fn seed_damaged(env: &TestEnv) {
    let mut storage = Storage::open(env.data_path()).unwrap();
    ensure_demo_users(&mut storage).unwrap();
    let qa = Identity::new(DEMO_QA_USER.to_string(), Role::Qa);

    let project = create_project(
        &mut storage,
        &qa,
        NewProject {
            name: "Repair".to_string(),
            description: None,
        },
    )
    .unwrap();
    let case = |title: &str| NewTestCase {
        project_id: project.id.clone(),
        title: title.to_string(),
        ..Default::default()
    };
    let first = create_test_case(&mut storage, &qa, case("first")).unwrap();
    let second = create_test_case(&mut storage, &qa, case("second")).unwrap();

    let bug = create_bug(
        &mut storage,
        &qa,
        NewBug {
            project_id: project.id.clone(),
            title: "Crash".to_string(),
            ..Default::default()
        },
    )
    .unwrap();

    storage
        .write(|tx| {
            let mut dup: TestCase = load(tx, &second.id)?;
            dup.friendly_id = first.friendly_id.clone();
            replace(tx, &dup)?;

            let mut bug = load::<qadeck::models::Bug>(tx, &bug.id)?;
            bug.linked_test_case_ids = vec![first.id.clone(), "ghost".to_string()];
            replace(tx, &bug)
        })
        .unwrap();
}

// === Config ===

#[test]
fn test_config_show_defaults() {
    let env = TestEnv::new();
    let output = env.qadeck().args(["config", "show"]).output().unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["port"]["source"], "default");
    assert_eq!(json["dataDir"]["source"], "env:QADECK_DATA_DIR");
    assert_eq!(json["tokenSecret"]["source"], "default");
    assert!(json["tokenSecret"]["value"].as_str().unwrap().ends_with("..."));
}

#[test]
fn test_config_show_file_and_env() {
    let env = TestEnv::new();
    std::fs::write(
        env.data_path().join("config.kdl"),
        "port 9100\ntoken-secret \"s3cret-value\"\n",
    )
    .unwrap();

    let output = env
        .qadeck()
        .env("QADECK_HOST", "0.0.0.0")
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["port"]["value"], 9100);
    assert_eq!(json["port"]["source"], "config");
    assert_eq!(json["host"]["value"], "0.0.0.0");
    assert_eq!(json["host"]["source"], "env:QADECK_HOST");
    assert_eq!(json["tokenSecret"]["value"], "s3cr...");
}

#[test]
fn test_config_show_human() {
    let env = TestEnv::new();
    env.qadeck()
        .args(["-H", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port:"))
        .stdout(predicate::str::contains("(default)"));
}

#[test]
fn test_invalid_config_fails_with_json_error() {
    let env = TestEnv::new();
    std::fs::write(env.data_path().join("config.kdl"), "port {{{").unwrap();

    env.qadeck()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}

// === Repair ===

#[test]
fn test_repair_ids_clean_store() {
    let env = TestEnv::new();
    env.qadeck()
        .args(["-H", "repair", "ids"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No duplicate friendly IDs found."));
}

#[test]
fn test_repair_ids_dry_run_then_apply() {
    let env = TestEnv::new();
    seed_damaged(&env);

    for _ in 0..2 {
        let output = env
            .qadeck()
            .args(["repair", "ids", "--dry-run"])
            .output()
            .unwrap();
        let json = stdout_json(&output);
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["renumbered"].as_array().unwrap().len(), 1);
        assert_eq!(json["renumbered"][0]["from"], "TC-1");
        assert_eq!(json["renumbered"][0]["to"], "TC-2");
    }

    env.qadeck()
        .args(["-H", "repair", "ids"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renumbered 1 item(s):"));

    env.qadeck()
        .args(["-H", "repair", "ids"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No duplicate friendly IDs found."));
}

#[test]
fn test_repair_links() {
    let env = TestEnv::new();
    seed_damaged(&env);

    env.qadeck()
        .args(["-H", "repair", "links", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would add 1 reverse link(s):"))
        .stdout(predicate::str::contains("Would drop 1 dangling link(s):"));

    let output = env.qadeck().args(["repair", "links"]).output().unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["dryRun"], false);
    assert_eq!(json["added"].as_array().unwrap().len(), 1);
    assert_eq!(json["dropped"][0]["peerId"], "ghost");

    env.qadeck()
        .args(["-H", "repair", "links"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All links are symmetric."));
}

// === Help ===

#[test]
fn test_help_and_version() {
    let env = TestEnv::new();
    env.qadeck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("repair"));

    env.qadeck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
