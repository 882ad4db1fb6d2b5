//! `skiff run`: one credentialed mirror pass.

use crate::cli::{output, Services};
use crate::core::config::Config;
use crate::core::constants;
use crate::core::run::{RunOutcome, Runner};
use crate::error::Result;

pub fn execute(config: &Config) -> Result<i32> {
    let plan = config.run_plan()?;
    let services = Services::from_config(config);
    let runner = Runner::new(&services.store, services.mirror.as_ref(), &services.publisher);

    let outcome = runner.execute(&plan);
    print_outcome(&outcome);
    Ok(outcome.exit_code)
}

pub(crate) fn print_outcome(outcome: &RunOutcome) {
    match &outcome.failure {
        None if outcome.success() => {
            let detail = outcome
                .report
                .as_ref()
                .and_then(|r| r.transferred.zip(r.skipped))
                .map(|(transferred, skipped)| {
                    format!(" ({} transferred, {} unchanged)", transferred, skipped)
                })
                .unwrap_or_default();
            output::success(&format!("sync completed{}", detail));
        }
        None if outcome.exit_code == constants::EXIT_ALREADY_RUNNING => {
            output::warn("another run is in progress, skipping");
        }
        None => output::error(&format!("run failed with exit code {}", outcome.exit_code)),
        Some((step, err)) => {
            output::error(&format!("{} failed: {}", step, err));
            if outcome.alerted {
                output::hint("failure alert published");
            }
        }
    }
}
