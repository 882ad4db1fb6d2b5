//! `skiff enable`: hand bootstrap off to a background unit.
//!
//! Meant for the first-boot hook. Returns as soon as the unit is queued.

use std::path::Path;

use crate::cli::output;
use crate::core::bootstrap::systemd::Systemctl;
use crate::core::bootstrap::unit::DeferredUnit;
use crate::core::config::Config;
use crate::core::constants;
use crate::error::Result;

pub fn execute(config: &Config, config_path: &Path) -> Result<i32> {
    let unit = DeferredUnit::new(
        &config.paths.systemd_dir,
        constants::BOOTSTRAP_UNIT,
        config.skiff_command(config_path, "bootstrap")?,
        Systemctl::new(&config.tools.systemctl),
    );

    if unit.install()? {
        output::success(&format!("wrote {}", output::path(unit.path().display())));
    } else {
        output::success(&format!("{} already up to date", unit.unit_name()));
    }
    output::success(&format!("started {}", unit.unit_name()));
    Ok(constants::EXIT_SUCCESS)
}
