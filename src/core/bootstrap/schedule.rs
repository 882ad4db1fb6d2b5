//! Periodic trigger registration.
//!
//! Registration is a guarded write: the current state is queried first and
//! nothing is written when the entry is already present, so bootstrapping
//! any number of times leaves exactly one trigger behind.

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing::{debug, info};

use super::systemd::{self, Systemctl};
use crate::core::types::Interval;
use crate::error::BootstrapError;

/// Which facility fires periodic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    #[default]
    Cron,
    SystemdTimer,
}

/// The periodic trigger to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub interval: Interval,
    /// Account the command runs as.
    pub user: String,
    /// Full command line, e.g. `/usr/local/bin/skiff --config /etc/skiff/skiff.toml run`.
    pub command: String,
}

impl ScheduleEntry {
    /// `/etc/cron.d` line: schedule, user, command.
    pub fn cron_line(&self) -> String {
        format!(
            "{} {} {}",
            self.interval.cron_expr(),
            self.user,
            self.cron_command()
        )
    }

    /// The command with `%` escaped; cron turns a bare `%` into a newline.
    fn cron_command(&self) -> String {
        self.command.replace('%', "\\%")
    }
}

pub trait Scheduler {
    fn name(&self) -> &'static str;
    fn is_registered(&self, entry: &ScheduleEntry) -> Result<bool, BootstrapError>;
    fn register(&self, entry: &ScheduleEntry) -> Result<(), BootstrapError>;
}

/// Register `entry` unless it already is. Returns whether anything was written.
pub fn ensure_registered(
    scheduler: &dyn Scheduler,
    entry: &ScheduleEntry,
) -> Result<bool, BootstrapError> {
    if scheduler.is_registered(entry)? {
        debug!(scheduler = scheduler.name(), "schedule already registered");
        return Ok(false);
    }
    scheduler.register(entry)?;
    info!(
        scheduler = scheduler.name(),
        every_minutes = entry.interval.minutes(),
        "schedule registered"
    );
    Ok(true)
}

fn schedule_err(context: &str, e: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Schedule(format!("{}: {}", context, e))
}

/// A file under `/etc/cron.d`.
#[derive(Debug, Clone)]
pub struct CronFile {
    path: PathBuf,
}

impl CronFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<String, BootstrapError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(schedule_err(&format!("failed to read {}", self.path.display()), e)),
        }
    }
}

impl Scheduler for CronFile {
    fn name(&self) -> &'static str {
        "cron"
    }

    fn is_registered(&self, entry: &ScheduleEntry) -> Result<bool, BootstrapError> {
        let line = entry.cron_line();
        Ok(self.read()?.lines().any(|l| l.trim() == line))
    }

    /// Append the entry, replacing any line that runs the same command on a
    /// different schedule. Unrelated lines are kept as they are.
    fn register(&self, entry: &ScheduleEntry) -> Result<(), BootstrapError> {
        let existing = self.read()?;
        let suffix = format!(" {} {}", entry.user, entry.cron_command());

        let mut contents: String = existing
            .lines()
            .filter(|l| {
                let l = l.trim_end();
                l.starts_with('#') || !l.ends_with(&suffix)
            })
            .map(|l| format!("{}\n", l))
            .collect();
        contents.push_str(&entry.cron_line());
        contents.push('\n');

        let write_err = |e: std::io::Error| {
            schedule_err(&format!("failed to write {}", self.path.display()), e)
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.path, contents).map_err(write_err)?;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o644)).map_err(write_err)?;
        Ok(())
    }
}

/// A `.service` + `.timer` pair.
#[derive(Debug, Clone)]
pub struct SystemdTimer {
    dir: PathBuf,
    name: String,
    systemctl: Systemctl,
}

impl SystemdTimer {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, systemctl: Systemctl) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            systemctl,
        }
    }

    fn service_path(&self) -> PathBuf {
        self.dir.join(format!("{}.service", self.name))
    }

    fn timer_path(&self) -> PathBuf {
        self.dir.join(format!("{}.timer", self.name))
    }

    fn timer_unit(&self) -> String {
        format!("{}.timer", self.name)
    }

    pub fn render_service(&self, entry: &ScheduleEntry) -> String {
        format!(
            r#"[Unit]
Description=skiff periodic sync
Wants=network-online.target
After=network-online.target

[Service]
Type=oneshot
User={user}
ExecStart={command}
"#,
            user = entry.user,
            command = systemd::escape_specifiers(&entry.command)
        )
    }

    pub fn render_timer(&self, entry: &ScheduleEntry) -> String {
        format!(
            r#"[Unit]
Description=skiff sync every {minutes} minutes

[Timer]
OnCalendar={calendar}
Persistent=true

[Install]
WantedBy=timers.target
"#,
            minutes = entry.interval.minutes(),
            calendar = entry.interval.on_calendar()
        )
    }
}

impl Scheduler for SystemdTimer {
    fn name(&self) -> &'static str {
        "systemd-timer"
    }

    /// Both unit files match and the timer is enabled. Files left behind by
    /// a registration whose `enable` failed do not count.
    fn is_registered(&self, entry: &ScheduleEntry) -> Result<bool, BootstrapError> {
        let matches = |path: PathBuf, expected: String| {
            fs::read_to_string(path).is_ok_and(|current| current == expected)
        };
        if !(matches(self.service_path(), self.render_service(entry))
            && matches(self.timer_path(), self.render_timer(entry)))
        {
            return Ok(false);
        }
        self.systemctl
            .is_enabled(&self.timer_unit())
            .map_err(BootstrapError::Schedule)
    }

    fn register(&self, entry: &ScheduleEntry) -> Result<(), BootstrapError> {
        for (path, content) in [
            (self.service_path(), self.render_service(entry)),
            (self.timer_path(), self.render_timer(entry)),
        ] {
            systemd::write_unit(&path, &content)
                .map_err(|e| schedule_err(&format!("failed to write {}", path.display()), e))?;
        }

        self.systemctl
            .daemon_reload()
            .map_err(BootstrapError::Schedule)?;
        self.systemctl
            .enable_now(&self.timer_unit(), false)
            .map_err(BootstrapError::Schedule)?;
        Ok(())
    }
}
