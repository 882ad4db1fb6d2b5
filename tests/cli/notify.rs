//! Tests for `skiff notify`.

use crate::support::*;

#[test]
fn test_zero_does_not_alert() {
    let t = Test::ready();
    assert_exit_code(&t.notify("0"), 0);
    assert!(t.publishes().is_empty());
}

#[test]
fn test_failure_code_alerts_once() {
    let t = Test::ready();

    let output = t.notify("7");
    assert_exit_code(&output, 0);
    assert_stdout_contains(&output, "failure alert published");

    assert_eq!(
        t.publishes(),
        vec!["ocid1.onstopic.oc1..test|skiff sync failed on mirror-test"]
    );
    let body = t.read("ons.body");
    assert!(body.contains("run exited with code 7"));
    assert!(body.contains("host: mirror-test"));
}

#[test]
fn test_custom_message() {
    let t = Test::ready();
    let output = t
        .cmd()
        .args(["notify", "--exit-code", "2", "--message", "disk full on staging"])
        .output()
        .unwrap();
    assert_success(&output);
    assert!(t.read("ons.body").contains("disk full on staging"));
}

#[test]
fn test_malformed_code_is_ignored() {
    let t = Test::ready();
    for raw in ["abc", "-1", "", "12x"] {
        let output = t.notify(raw);
        assert_exit_code(&output, 0);
        assert_stderr_contains(&output, "malformed exit code");
    }
    assert!(t.publishes().is_empty());
}

#[test]
fn test_publish_failure_still_exits_zero() {
    let t = Test::ready();
    t.fail_publishing();

    let output = t.notify("5");
    assert_exit_code(&output, 0);
    assert_stderr_contains(&output, "failed to publish failure alert");
}
