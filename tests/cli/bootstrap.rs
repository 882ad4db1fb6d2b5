//! Tests for `skiff bootstrap`.

use crate::support::*;
use std::net::TcpListener;

fn cron_line(t: &Test) -> String {
    format!(
        "*/30 * * * * root /usr/local/bin/skiff --config {} run\n",
        t.config_path().display()
    )
}

#[test]
fn test_bootstrap_twice_registers_once() {
    let t = Test::ready();

    let first = t.bootstrap();
    assert_exit_code(&first, 0);
    assert_stdout_contains(&first, "scheduled every 30 minutes");

    let second = t.bootstrap();
    assert_exit_code(&second, 0);
    assert_stdout_contains(&second, "schedule already registered");

    assert_eq!(t.read("cron.d/skiff"), cron_line(&t));
    // Each bootstrap ends with one eager run.
    assert_eq!(t.rclone_calls().len(), 2);
}

#[test]
fn test_bootstrap_installs_missing_tool_once() {
    let t = Test::ready();
    let dir = t.dir.path().display().to_string();
    t.write_config(&format!(
        r##"
[[bootstrap.install]]
binary = "{dir}/bin/extra-tool"
command = ["/bin/sh", "-c", 'echo run >> {dir}/install.log; printf "#!/bin/sh\n" > {dir}/bin/extra-tool; chmod +x {dir}/bin/extra-tool']
"##
    ));

    let first = t.bootstrap();
    assert_success(&first);
    assert_stdout_contains(&first, "installed");

    let second = t.bootstrap();
    assert_success(&second);

    assert_eq!(t.read("install.log").lines().count(), 1);
}

#[test]
fn test_already_installed_tool_is_not_reinstalled() {
    let t = Test::ready();
    let dir = t.dir.path().display().to_string();
    t.write_config(&format!(
        r#"
[[bootstrap.install]]
binary = "{dir}/bin/rclone"
command = ["/bin/sh", "-c", "echo run >> {dir}/install.log"]
"#
    ));

    assert_success(&t.bootstrap());
    assert_eq!(t.read("install.log"), "");
}

#[test]
fn test_install_failure_stops_and_alerts() {
    let t = Test::ready();
    let dir = t.dir.path().display().to_string();
    t.write_config(&format!(
        r#"
[[bootstrap.install]]
binary = "{dir}/bin/never"
command = ["/bin/sh", "-c", "echo 'No match for argument: never' >&2; exit 3"]
"#
    ));

    let output = t.bootstrap();
    assert_exit_code(&output, 3);
    assert_stderr_contains(&output, "No match for argument");
    assert_eq!(t.read("cron.d/skiff"), "");
    assert!(t.rclone_calls().is_empty());

    let publishes = t.publishes();
    assert_eq!(publishes.len(), 1);
    assert!(t.read("ons.body").contains("bootstrap failed"));
}

#[test]
fn test_first_run_failure_is_exit_code() {
    let t = Test::ready();
    t.rclone_exits_with(9);

    let output = t.bootstrap();
    assert_exit_code(&output, 9);
    assert_eq!(t.read("cron.d/skiff"), cron_line(&t));
    assert_eq!(t.publishes().len(), 1);
}

#[test]
fn test_first_run_can_be_disabled() {
    let t = Test::ready();
    t.write_config("[bootstrap]\nfirst_run = false\n");

    assert_success(&t.bootstrap());
    assert!(t.rclone_calls().is_empty());
}

#[test]
fn test_systemd_timer_scheduler() {
    let t = Test::ready();
    t.write_config(
        "[bootstrap]\nscheduler = \"systemd_timer\"\ninterval_minutes = 60\nfirst_run = false\n",
    );

    assert_success(&t.bootstrap());
    assert_success(&t.bootstrap());

    let timer = t.read("systemd/skiff-sync.timer");
    assert!(timer.contains("OnCalendar=0/1:00"));
    let service = t.read("systemd/skiff-sync.service");
    assert!(service.contains(&format!(
        "ExecStart=/usr/local/bin/skiff --config {} run",
        t.config_path().display()
    )));

    assert_eq!(
        t.systemctl_calls(),
        vec![
            "daemon-reload",
            "enable --now skiff-sync.timer",
            "is-enabled skiff-sync.timer",
        ]
    );
    assert!(t.is_enabled("skiff-sync.timer"));
    assert_eq!(t.read("cron.d/skiff"), "");
}

#[test]
fn test_systemd_timer_enabled_on_retry_after_failure() {
    let t = Test::ready();
    t.write_config("[bootstrap]\nscheduler = \"systemd_timer\"\nfirst_run = false\n");

    t.systemctl_fails(true);
    let failed = t.bootstrap();
    assert_exit_code(&failed, 1);
    assert!(t.read("ons.body").contains("bootstrap failed"));
    assert!(!t.is_enabled("skiff-sync.timer"));

    t.systemctl_fails(false);
    let retried = t.bootstrap();
    assert_success(&retried);
    assert_stdout_contains(&retried, "scheduled every 30 minutes");
    assert!(t.is_enabled("skiff-sync.timer"));
}

#[test]
fn test_relative_config_path_is_scheduled_absolute() {
    let t = Test::ready();

    let output = t
        .cmd()
        .args(["--config", "skiff.toml", "bootstrap"])
        .output()
        .unwrap();
    assert_success(&output);

    let cron = t.read("cron.d/skiff");
    assert_eq!(cron, cron_line(&t));
    assert!(!cron.contains("--config skiff.toml"));
}

#[test]
fn test_waits_for_reachable_probe() {
    let t = Test::ready();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    t.write_config(&format!(
        "[bootstrap]\nprobe = \"{}\"\nmax_wait_secs = 5\nfirst_run = false\n",
        addr
    ));

    let output = t.bootstrap();
    assert_success(&output);
    assert!(!stderr(&output).contains("timed out"));
}

#[test]
fn test_unreachable_probe_times_out_and_proceeds() {
    let t = Test::ready();
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    t.write_config(&format!(
        "[bootstrap]\nprobe = \"{}\"\npoll_interval_secs = 1\nmax_wait_secs = 1\nfirst_run = false\n",
        addr
    ));

    let output = t.bootstrap();
    assert_success(&output);
    assert_stderr_contains(&output, "timed out");
    assert_eq!(t.read("cron.d/skiff"), cron_line(&t));
}
