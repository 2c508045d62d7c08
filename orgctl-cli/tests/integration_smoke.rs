//! Smoke tests to verify command module wiring

use assert_cmd::Command;
use predicates::prelude::*;

// === Apex Command Tests ===

#[test]
fn test_apex_execute_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("apex").arg("execute").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Path to a single Apex code file"));
}

#[test]
fn test_apex_execute_rejects_file_and_dir_together() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args([
        "apex", "execute", "-u", "MyOrg", "-f", "a.apex", "-d", "scripts/",
    ]);

    cmd.assert().failure().stderr(predicate::str::contains(
        "only either the path to an apex file or a directory",
    ));
}

// === Communities Command Tests ===

#[test]
fn test_communities_describe_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("communities").arg("describe").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("communities.json"));
}

#[test]
fn test_communities_publish_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("communities").arg("publish").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("case-insensitive"));
}

// === Data Command Tests ===

#[test]
fn test_data_tree_import_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("data").arg("tree").arg("import").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Plan file"));
}

#[test]
fn test_data_tree_import_requires_input() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args(["data", "tree", "import", "-u", "MyOrg"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--files or --plan"));
}

// === Org Command Tests ===

#[test]
fn test_org_create_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("org").arg("create").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Duration of the scratch org"));
}

#[test]
fn test_org_create_rejects_out_of_range_duration() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args(["org", "create", "-v", "DevHub", "-d", "45"]);

    cmd.assert().failure();
}

#[test]
fn test_org_share_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("org").arg("share").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Recipient email addresses"));
}

#[test]
fn test_org_share_rejects_invalid_email() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args([
        "org",
        "share",
        "-u",
        "MyOrg",
        "-v",
        "DevHub",
        "-e",
        "not-an-email",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid Email Address"));
}

// === Package Command Tests ===

#[test]
fn test_package_install_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("package").arg("install").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Package version id"));
}

#[test]
fn test_package_dependency_install_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args(["package", "dependency", "install", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sfdx-project.json"));
}

// === User Command Tests ===

#[test]
fn test_user_email_set_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args(["user", "email", "set", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("New email address"));
}

#[test]
fn test_user_password_reset_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args(["user", "password", "reset", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Username of the user to reset"));
}

#[test]
fn test_user_permset_assign_help() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args(["user", "permset", "assign", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Permission set name or label"));
}

#[test]
fn test_user_email_set_rejects_invalid_email() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.args([
        "user",
        "email",
        "set",
        "-u",
        "MyOrg",
        "-s",
        "user@example.com",
        "-e",
        "nope",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid Email Address"));
}

// === Completions Command Test ===

#[test]
fn test_completions_bash() {
    let mut cmd = Command::cargo_bin("orgctl").unwrap();
    cmd.arg("completions").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("orgctl"));
}
