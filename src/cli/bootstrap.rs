//! `skiff bootstrap`: the deferred launcher.

use std::path::Path;

use crate::cli::{output, Services};
use crate::core::bootstrap::install::CommandInstaller;
use crate::core::bootstrap::readiness::{Probe, TcpProbe};
use crate::core::bootstrap::schedule::{CronFile, Scheduler, SchedulerKind, SystemdTimer};
use crate::core::bootstrap::systemd::Systemctl;
use crate::core::bootstrap::Launcher;
use crate::core::config::Config;
use crate::core::constants;
use crate::core::notify::Notifier;
use crate::core::run::Runner;
use crate::error::{Error, Result};

pub fn execute(config: &Config, config_path: &Path) -> Result<i32> {
    let plan = config.bootstrap_plan(config_path)?;
    let run_plan = config.run_plan()?;

    let services = Services::from_config(config);
    let runner = Runner::new(&services.store, services.mirror.as_ref(), &services.publisher);
    let probe = config.bootstrap.probe.as_deref().map(TcpProbe::new);
    let installer = CommandInstaller::new();
    let scheduler: Box<dyn Scheduler> = match config.bootstrap.scheduler {
        SchedulerKind::Cron => Box::new(CronFile::new(&config.paths.cron_file)),
        SchedulerKind::SystemdTimer => Box::new(SystemdTimer::new(
            &config.paths.systemd_dir,
            constants::TIMER_UNIT,
            Systemctl::new(&config.tools.systemctl),
        )),
    };

    let launcher = Launcher::new(
        probe.as_ref().map(|p| p as &dyn Probe),
        &installer,
        scheduler.as_ref(),
        &runner,
    );

    let report = match launcher.launch(&plan, &run_plan) {
        Ok(report) => report,
        Err(e) => {
            // Nothing else reports a machine that never got its schedule.
            let err = Error::from(e);
            Notifier::new(&services.publisher).notify_if_failed(
                err.exit_code(),
                &run_plan.host,
                run_plan.topic.as_ref(),
                &format!("bootstrap failed: {}", err),
            );
            return Err(err);
        }
    };

    if report.ready == Some(false) {
        output::warn("readiness probe timed out, continued anyway");
    }
    for binary in &report.installed {
        output::success(&format!("installed {}", binary));
    }
    if report.schedule_written {
        output::success(&format!(
            "scheduled every {} minutes",
            plan.schedule.interval.minutes()
        ));
    } else {
        output::success("schedule already registered");
    }
    if let Some(outcome) = &report.first_run {
        super::run::print_outcome(outcome);
    }

    Ok(report.exit_code())
}
