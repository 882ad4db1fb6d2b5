//! Tests for `skiff check`.

use crate::support::*;
use predicates::prelude::*;

#[test]
fn test_check_shows_resolved_plan() {
    let t = Test::ready();

    let output = t.check();
    assert_success(&output);
    assert_stdout_contains(&output, "configuration is valid");
    assert_stdout_contains(&output, "oci:bling");
    assert_stdout_contains(&output, "s3:cost-archive/oci");
    assert_stdout_contains(&output, "copy");
    assert_stdout_contains(&output, "AWS_ACCESS_KEY_ID ← key-id (instance_principal)");
    assert_stdout_contains(&output, "*/30 * * * * root /usr/local/bin/skiff");
    assert_stdout_contains(&output, "mirror-test");
}

#[test]
fn test_check_never_fetches_secrets() {
    let t = Test::ready();
    let output = t.check();
    assert_success(&output);
    assert_output_excludes(&output, "AKIAEXAMPLE");
    assert!(t.rclone_calls().is_empty());
}

#[test]
fn test_check_rejects_duplicate_credentials() {
    let t = Test::ready();
    t.write_raw_config(
        &t.base_config()
            .replace("AWS_SECRET_ACCESS_KEY", "AWS_ACCESS_KEY_ID"),
    );

    t.cmd()
        .arg("check")
        .assert()
        .code(78)
        .stderr(predicate::str::contains("duplicate credential env"))
        .stderr(predicate::str::contains("skiff check"));
}

#[test]
fn test_check_rejects_malformed_toml() {
    let t = Test::new();
    t.write_raw_config("[sync\nsource = ");

    t.cmd()
        .arg("check")
        .assert()
        .code(78)
        .stderr(predicate::str::contains("failed to parse config"));
}

#[test]
fn test_check_rejects_bad_interval() {
    let t = Test::ready();
    t.write_config("[bootstrap]\ninterval_minutes = 90\n");

    let output = t.check();
    assert_exit_code(&output, 78);
    assert_stderr_contains(&output, "interval_minutes");
}

#[test]
fn test_prune_mode_is_shown() {
    let t = Test::ready();
    t.write_raw_config(
        &t.base_config()
            .replace("[sync]\n", "[sync]\nprune = true\n"),
    );

    let output = t.check();
    assert_success(&output);
    assert_stdout_contains(&output, "sync (prune)");
}

#[test]
fn test_check_shows_install_steps() {
    let t = Test::ready();
    let output = t.check();
    assert_success(&output);
    assert_stdout_contains(&output, "install");
    assert_stdout_contains(&output, "rclone.org/install.sh");
}
