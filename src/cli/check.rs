//! `skiff check`: validate configuration and show the resolved plan.
//!
//! Prints secret identifiers but never fetches or prints secret values.

use std::path::Path;

use crate::cli::output;
use crate::core::bootstrap::schedule::SchedulerKind;
use crate::core::config::Config;
use crate::core::constants;
use crate::error::Result;

pub fn execute(config: &Config, config_path: &Path) -> Result<i32> {
    let plan = config.run_plan()?;
    let job = &plan.job;
    let opts = &job.options;

    output::section("Sync");
    output::kv("engine", format!("{:?}", config.sync.engine).to_lowercase());
    output::kv("source", &job.source);
    output::kv("destination", &job.destination);
    output::kv("mode", if opts.prune { "sync (prune)" } else { "copy" });
    output::kv("checksum", opts.checksum);
    output::kv("chunk size", opts.chunk_size);
    output::kv("concurrency", opts.upload_concurrency);

    output::section("Credentials");
    for spec in &plan.credentials {
        output::list_item(&format!("{} ← {} ({})", spec.env, spec.secret.id, spec.secret.auth));
    }

    output::section("Alerts");
    output::kv("host", &plan.host);
    match &plan.topic {
        Some(topic) => output::kv("topic", &topic.id),
        None => output::kv("topic", "disabled"),
    }

    let schedule = config.schedule_entry(config_path)?;
    output::section("Schedule");
    match config.bootstrap.scheduler {
        SchedulerKind::Cron => {
            output::kv("cron", output::path(config.paths.cron_file.display()));
            output::kv("entry", schedule.cron_line());
        }
        SchedulerKind::SystemdTimer => {
            output::kv("timer", format!("{}.timer", constants::TIMER_UNIT));
            output::kv("calendar", schedule.interval.on_calendar());
            output::kv("command", &schedule.command);
        }
    }
    for step in config.install_steps() {
        output::kv(&format!("install {}", step.binary), step.command.join(" "));
    }
    output::kv("lock", output::path(config.paths.lock_file.display()));
    output::kv("log", output::path(config.paths.log_file.display()));

    println!();
    output::success("configuration is valid");
    Ok(constants::EXIT_SUCCESS)
}
