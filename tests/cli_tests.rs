//! CLI tests for syncstack
//!
//! Runs the binary against an app file in a temporary directory and checks
//! what it prints and writes.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const NETWORK: &str = "acme-sync-VpcMainStack";
const BASTION: &str = "acme-sync-BastionHostStack";
const PRIVATE: &str = "acme-sync-PrivateHostStack";

// Helper to get a command for testing, isolated from the caller's
// environment and config files
fn syncstack_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("syncstack").unwrap();
    cmd.current_dir(dir)
        .env_remove("CDK_DEFAULT_ACCOUNT")
        .env_remove("CDK_DEFAULT_REGION")
        .env_remove("SYNCSTACK_CONFIG")
        .env_remove("SYNCSTACK_APP")
        .env_remove("SYNCSTACK_OUTPUT")
        .env_remove("RUST_LOG")
        .arg("--no-color")
        .arg("--config")
        .arg(dir.join("absent.toml"));
    cmd
}

// Helper to create a project directory with a cdk.json
fn create_project(context: Value) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let app = dir.path().join("cdk.json");
    let content = serde_json::json!({
        "app": "syncstack synth",
        "context": context,
    });
    fs::write(&app, serde_json::to_string_pretty(&content).unwrap()).unwrap();
    (dir, app)
}

fn full_context() -> Value {
    serde_json::json!({
        "project_prefix": "acme",
        "project_name": "sync",
        "use_existing_vpc": false,
        "existing_vpc_name": "",
        "ec2_bastion_key_pair_name": "bastion-key",
        "ec2_private_key_pair_name": "private-key",
        "bucket_name": "acme-sync-data"
    })
}

// ============================================================================
// synth
// ============================================================================

#[test]
fn test_synth_writes_assembly() {
    let (dir, app) = create_project(full_context());
    let out = dir.path().join("cdk.out");

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("synth")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("SYNTH RECAP"))
        .stdout(predicate::str::contains(PRIVATE));

    for stack in [NETWORK, BASTION, PRIVATE] {
        assert!(out.join(format!("{}.template.json", stack)).exists());
    }

    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(
        manifest["artifacts"][PRIVATE]["dependencies"],
        serde_json::json!([NETWORK, BASTION])
    );
    assert_eq!(
        manifest["artifacts"][NETWORK]["environment"],
        serde_json::json!("aws://unknown-account/unknown-region")
    );
}

#[test]
fn test_synth_defaults_to_cdk_out_next_to_cwd() {
    let (dir, _) = create_project(full_context());

    syncstack_cmd(dir.path()).arg("synth").assert().success();

    assert!(dir.path().join("cdk.out").join("manifest.json").exists());
}

#[test]
fn test_synth_stdout_prints_one_template() {
    let (dir, app) = create_project(full_context());

    let output = syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("synth")
        .arg("--stdout")
        .arg(NETWORK)
        .output()
        .unwrap();
    assert!(output.status.success());

    let template: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        template["Resources"]["Vpc"]["Type"],
        serde_json::json!("AWS::EC2::VPC")
    );
    assert!(!dir.path().join("cdk.out").exists());
}

#[test]
fn test_synth_unknown_stack() {
    let (dir, app) = create_project(full_context());

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("synth")
        .arg("--stdout")
        .arg("NoSuchStack")
        .assert()
        .failure()
        .stderr(predicate::str::contains("NoSuchStack"));
}

// ============================================================================
// Context errors
// ============================================================================

#[test]
fn test_missing_bucket_name_exits_with_config_error() {
    let mut context = full_context();
    context.as_object_mut().unwrap().remove("bucket_name");
    let (dir, app) = create_project(context);

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("synth")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bucket_name"));
}

#[test]
fn test_context_override_supplies_missing_key() {
    let mut context = full_context();
    context.as_object_mut().unwrap().remove("bucket_name");
    let (dir, app) = create_project(context);

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("-c")
        .arg("bucket_name=override-bucket")
        .arg("list")
        .assert()
        .success();
}

#[test]
fn test_existing_vpc_without_environment_fails() {
    let (dir, app) = create_project(full_context());

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("-c")
        .arg("use_existing_vpc=true")
        .arg("-c")
        .arg("existing_vpc_name=shared")
        .arg("synth")
        .assert()
        .code(2);
}

#[test]
fn test_existing_vpc_records_missing_lookup() {
    let (dir, app) = create_project(full_context());
    let out = dir.path().join("cdk.out");

    syncstack_cmd(dir.path())
        .env("CDK_DEFAULT_ACCOUNT", "123456789012")
        .env("CDK_DEFAULT_REGION", "us-east-1")
        .arg("--app")
        .arg(&app)
        .arg("-c")
        .arg("use_existing_vpc=true")
        .arg("-c")
        .arg("existing_vpc_name=shared")
        .arg("synth")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("vpc-provider:account=123456789012"));

    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["missing"][0]["provider"], serde_json::json!("vpc-provider"));
}

// ============================================================================
// list / graph / user-data
// ============================================================================

#[test]
fn test_list_in_deployment_order() {
    let (dir, app) = create_project(full_context());

    let output = syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("list")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let network = stdout.find(NETWORK).unwrap();
    let bastion = stdout.find(BASTION).unwrap();
    let private = stdout.find(PRIVATE).unwrap();
    assert!(network < bastion && bastion < private);
}

#[test]
fn test_list_json() {
    let (dir, app) = create_project(full_context());

    let output = syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("--output-format")
        .arg("json")
        .arg("list")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stacks: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stacks[2]["name"], serde_json::json!(PRIVATE));
    assert_eq!(
        stacks[2]["dependencies"],
        serde_json::json!([NETWORK, BASTION])
    );
}

#[test]
fn test_graph_prints_dot() {
    let (dir, app) = create_project(full_context());

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph stacks {"))
        .stdout(predicate::str::contains(format!(
            "\"{}\" -> \"{}\"",
            BASTION, PRIVATE
        )));
}

#[test]
fn test_user_data_prints_boot_script() {
    let (dir, app) = create_project(full_context());

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("user-data")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#!/bin/bash"))
        .stdout(predicate::str::contains("yum install -y libxcrypt-compat"));
}

#[test]
fn test_user_data_multipart_rendering() {
    let (dir, app) = create_project(full_context());

    syncstack_cmd(dir.path())
        .arg("--app")
        .arg(&app)
        .arg("-c")
        .arg("user_data_format=multipart")
        .arg("user-data")
        .arg("--rendered")
        .assert()
        .success()
        .stdout(predicate::str::contains("Content-Type: multipart/mixed"));
}

// ============================================================================
// Misc
// ============================================================================

#[test]
fn test_version_flag() {
    let dir = tempdir().unwrap();
    syncstack_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("syncstack"));
}

#[test]
fn test_unknown_subcommand() {
    let dir = tempdir().unwrap();
    syncstack_cmd(dir.path()).arg("deploy").assert().failure();
}
