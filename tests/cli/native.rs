//! Tests for the in-process mirror engine.

use std::fs;

use crate::support::*;

fn native_config(t: &Test, extra: &str) {
    let config = t
        .base_config()
        .replace("[sync]\n", &format!("[sync]\nengine = \"native\"\n{}", extra));
    t.write_raw_config(&format!(
        "{}\n[remotes.oci]\nroot = \"{}\"\n\n[remotes.s3]\nroot = \"{}\"\n",
        config,
        t.path("src").display(),
        t.path("dst").display()
    ));
}

fn seed(t: &Test, files: &[(&str, &str)]) {
    for (name, body) in files {
        let path = t.path("src/bling").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
}

#[test]
fn test_native_mirrors_tree() {
    let t = Test::ready();
    native_config(&t, "");
    seed(&t, &[("a.csv", "alpha"), ("reports/2024/b.csv", "beta")]);

    let output = t.run();
    assert_success(&output);
    assert_stdout_contains(&output, "2 transferred, 0 unchanged");

    let dst = t.path("dst/cost-archive/oci");
    assert_eq!(fs::read_to_string(dst.join("a.csv")).unwrap(), "alpha");
    assert_eq!(
        fs::read_to_string(dst.join("reports/2024/b.csv")).unwrap(),
        "beta"
    );
    assert!(t.rclone_calls().is_empty());
}

#[test]
fn test_native_second_run_transfers_nothing() {
    let t = Test::ready();
    native_config(&t, "");
    seed(&t, &[("a.csv", "alpha"), ("b.csv", "beta")]);

    assert_success(&t.run());
    let output = t.run();
    assert_success(&output);
    assert_stdout_contains(&output, "0 transferred, 2 unchanged");
}

#[test]
fn test_native_copy_keeps_extra_objects() {
    let t = Test::ready();
    native_config(&t, "");
    seed(&t, &[("a.csv", "alpha")]);
    let stale = t.path("dst/cost-archive/oci/old.csv");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old").unwrap();

    assert_success(&t.run());
    assert!(stale.exists());
}

#[test]
fn test_native_prune_removes_extra_objects() {
    let t = Test::ready();
    native_config(&t, "prune = true\n");
    seed(&t, &[("a.csv", "alpha")]);
    let stale = t.path("dst/cost-archive/oci/old.csv");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old").unwrap();

    assert_success(&t.run());
    assert!(!stale.exists());
    assert!(t.path("dst/cost-archive/oci/a.csv").exists());
}

#[test]
fn test_native_rejects_unknown_remote() {
    let t = Test::ready();
    let config = t
        .base_config()
        .replace("[sync]\n", "[sync]\nengine = \"native\"\n");
    t.write_raw_config(&config);

    let output = t.check();
    assert_exit_code(&output, 78);
    assert_stderr_contains(&output, "remotes");
}
