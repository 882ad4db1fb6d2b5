//! Bootstrap launcher.
//!
//! Runs once per machine, in the background, after first boot:
//!
//! ```text
//! Created ─▶ Deferred ─▶ Installing ─▶ Scheduling ─▶ FirstRun ─▶ Done
//! (enable)   (readiness)  (tools)       (trigger)     (one run)
//! ```
//!
//! Every phase is safe to repeat. Re-running the launcher on a bootstrapped
//! machine installs nothing, registers nothing, and performs one more run.

pub mod install;
pub mod readiness;
pub mod schedule;
pub mod systemd;
pub mod unit;

use std::fmt;
use tracing::{info, warn};

use crate::core::run::{RunOutcome, RunPlan, Runner};
use crate::error::BootstrapError;
use install::{InstallOutcome, InstallStep, Installer};
use readiness::{Probe, ReadinessPolicy};
use schedule::{ScheduleEntry, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Deferred,
    Installing,
    Scheduling,
    FirstRun,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Created => "created",
            Phase::Deferred => "deferred",
            Phase::Installing => "installing",
            Phase::Scheduling => "scheduling",
            Phase::FirstRun => "first-run",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the launcher should do.
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    pub readiness: Option<ReadinessPolicy>,
    pub install: Vec<InstallStep>,
    pub schedule: ScheduleEntry,
    pub first_run: bool,
}

/// What the launcher found and changed.
#[derive(Debug)]
pub struct BootstrapReport {
    pub phase: Phase,
    /// `None` when no readiness probe is configured.
    pub ready: Option<bool>,
    pub installed: Vec<String>,
    pub already_present: Vec<String>,
    pub schedule_written: bool,
    pub first_run: Option<RunOutcome>,
}

impl BootstrapReport {
    /// Exit code of the launcher: the first run's, or success when skipped.
    pub fn exit_code(&self) -> i32 {
        self.first_run
            .as_ref()
            .map_or(crate::core::constants::EXIT_SUCCESS, |o| o.exit_code)
    }
}

pub struct Launcher<'a> {
    probe: Option<&'a dyn Probe>,
    installer: &'a dyn Installer,
    scheduler: &'a dyn Scheduler,
    runner: &'a Runner<'a>,
}

impl<'a> Launcher<'a> {
    pub fn new(
        probe: Option<&'a dyn Probe>,
        installer: &'a dyn Installer,
        scheduler: &'a dyn Scheduler,
        runner: &'a Runner<'a>,
    ) -> Self {
        Self {
            probe,
            installer,
            scheduler,
            runner,
        }
    }

    /// Walk every phase in order.
    ///
    /// # Errors
    ///
    /// Install and schedule failures stop the launcher. A failed first run
    /// does not: it is reported through [`BootstrapReport::exit_code`] and
    /// has already been alerted by the runner.
    pub fn launch(
        &self,
        plan: &BootstrapPlan,
        run: &RunPlan,
    ) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport {
            phase: Phase::Created,
            ready: None,
            installed: Vec::new(),
            already_present: Vec::new(),
            schedule_written: false,
            first_run: None,
        };

        report.phase = Phase::Deferred;
        info!(phase = %report.phase, "bootstrap");
        if let (Some(probe), Some(policy)) = (self.probe, plan.readiness.as_ref()) {
            report.ready = Some(readiness::wait_until_ready(probe, policy));
        }

        report.phase = Phase::Installing;
        info!(phase = %report.phase, steps = plan.install.len(), "bootstrap");
        for step in &plan.install {
            match self.installer.ensure(step)? {
                InstallOutcome::Installed(_) => report.installed.push(step.binary.clone()),
                InstallOutcome::AlreadyPresent(_) => {
                    report.already_present.push(step.binary.clone())
                }
            }
        }

        report.phase = Phase::Scheduling;
        info!(phase = %report.phase, scheduler = self.scheduler.name(), "bootstrap");
        report.schedule_written = schedule::ensure_registered(self.scheduler, &plan.schedule)?;

        if plan.first_run {
            report.phase = Phase::FirstRun;
            info!(phase = %report.phase, "bootstrap");
            let outcome = self.runner.execute(run);
            if !outcome.success() {
                warn!(exit_code = outcome.exit_code, "first run failed");
            }
            report.first_run = Some(outcome);
        }

        report.phase = Phase::Done;
        info!(
            installed = report.installed.len(),
            schedule_written = report.schedule_written,
            exit_code = report.exit_code(),
            "bootstrap finished"
        );
        Ok(report)
    }
}
