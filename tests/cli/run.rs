//! Tests for `skiff run`.

use crate::support::*;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_run_success_does_not_alert() {
    let t = Test::ready();

    let output = t.run();
    assert_exit_code(&output, 0);
    assert_stdout_contains(&output, "sync completed");
    assert!(t.publishes().is_empty());

    let calls = t.rclone_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("copy oci:bling s3:cost-archive/oci --checksum"));
    assert!(calls[0].contains("--s3-chunk-size 64M --s3-upload-concurrency 4"));
    assert!(calls[0].ends_with("key=AKIAEXAMPLE"));
}

#[test]
fn test_run_never_prints_credentials() {
    let t = Test::ready();
    let output = t.cmd().args(["-v", "run"]).output().unwrap();
    assert_success(&output);
    assert_output_excludes(&output, "AKIAEXAMPLE");
    assert_output_excludes(&output, "wJalrXUtnFEMI");
    assert!(!t.read("skiff.log").contains("wJalrXUtnFEMI"));
}

#[test]
fn test_transfer_exit_code_propagates_with_one_alert() {
    let t = Test::ready();
    t.rclone_exits_with(7);

    let output = t.run();
    assert_exit_code(&output, 7);
    assert_stderr_contains(&output, "sync failed");

    let publishes = t.publishes();
    assert_eq!(publishes.len(), 1);
    assert_eq!(
        publishes[0],
        "ocid1.onstopic.oc1..test|skiff sync failed on mirror-test"
    );
    assert!(t.read("ons.body").contains("exit code: 7"));
}

#[test]
fn test_missing_secret_stops_before_sync() {
    let t = Test::new();
    t.secret("key-id", "AKIAEXAMPLE");
    t.write_config("");

    let output = t.run();
    assert_exit_code(&output, 4);
    assert_stderr_contains(&output, "NotAuthorizedOrNotFound");
    assert!(t.rclone_calls().is_empty());
    assert_eq!(t.publishes().len(), 1);
}

#[test]
fn test_malformed_secret_is_data_error() {
    let t = Test::new();
    t.secret("key-id", "AKIAEXAMPLE");
    t.raw_secret("secret-key", "%%%not-base64%%%");
    t.write_config("");

    let output = t.run();
    assert_exit_code(&output, 65);
    assert!(t.rclone_calls().is_empty());
    assert_eq!(t.publishes().len(), 1);
}

#[test]
fn test_publish_failure_keeps_exit_code() {
    let t = Test::ready();
    t.rclone_exits_with(3);
    t.fail_publishing();

    let output = t.run();
    assert_exit_code(&output, 3);
    assert_stderr_contains(&output, "failed to publish failure alert");
}

#[test]
fn test_no_topic_means_no_alert() {
    let t = Test::ready();
    t.write_raw_config(
        &t.base_config()
            .replace("[notify]\ntopic_id = \"ocid1.onstopic.oc1..test\"\n", ""),
    );
    t.rclone_exits_with(7);

    assert_exit_code(&t.run(), 7);
    assert!(t.publishes().is_empty());
}

#[test]
fn test_missing_rclone_exits_127() {
    let t = Test::ready();
    let dir = t.dir.path().display().to_string();
    t.write_raw_config(&t.base_config().replace(
        &format!("{}/bin/rclone", dir),
        &format!("{}/bin/no-such-rclone", dir),
    ));

    let output = t.run();
    assert_exit_code(&output, 127);
    assert_eq!(t.publishes().len(), 1);
}

#[test]
fn test_missing_config_exits_78() {
    let t = Test::new();
    let output = t.run();
    assert_exit_code(&output, 78);
    assert_stderr_contains(&output, "config file not found");
    assert_stderr_contains(&output, "SKIFF_CONFIG");
}

#[test]
fn test_log_file_is_appended() {
    let t = Test::ready();
    assert_success(&t.run());
    assert_success(&t.run());

    let log = t.read("skiff.log");
    assert_eq!(log.matches("run started").count(), 2);
}

#[test]
fn test_json_log_format() {
    let t = Test::ready();
    t.write_raw_config(&format!("log_format = \"json\"\n{}", t.base_config()));
    assert_success(&t.run());

    let log = t.read("skiff.log");
    assert!(!log.is_empty());
    for line in log.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("fields").is_some());
    }
}

#[test]
fn test_overlapping_run_is_rejected() {
    let t = Test::ready();
    t.rclone_sleeps(3);

    #[allow(deprecated)]
    let binary = assert_cmd::cargo::cargo_bin("skiff");
    let mut first = Command::new(binary)
        .arg("run")
        .env("SKIFF_CONFIG", t.config_path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // The first run holds the lock once it reaches rclone.
    let deadline = Instant::now() + Duration::from_secs(10);
    while t.rclone_calls().is_empty() {
        assert!(Instant::now() < deadline, "first run never started rclone");
        thread::sleep(Duration::from_millis(20));
    }

    let second = t.run();
    assert_exit_code(&second, 75);
    assert_stderr_contains(&second, "another run is in progress");

    assert!(first.wait().unwrap().success());
    assert_eq!(t.rclone_calls().len(), 1);
    assert!(t.publishes().is_empty());
}

#[test]
fn test_unusable_lock_file_alerts() {
    let t = Test::ready();
    let config = t.base_config();
    let lock_line = format!("lock_file = \"{}\"", t.path("skiff.lock").display());
    assert!(config.contains(&lock_line));
    t.write_raw_config(&config.replace(
        &lock_line,
        "lock_file = \"/proc/skiff-test/skiff.lock\"",
    ));

    let output = t.run();
    assert_exit_code(&output, 74);
    assert_stderr_contains(&output, "acquiring run lock failed");
    assert!(t.rclone_calls().is_empty());
    assert_eq!(
        t.publishes(),
        vec!["ocid1.onstopic.oc1..test|skiff sync failed on mirror-test"]
    );
}
