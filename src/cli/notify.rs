//! `skiff notify`: alert entry point for shell exit traps.
//!
//! ```sh
//! trap 'skiff notify --exit-code $?' EXIT
//! ```
//!
//! Always exits 0 once the configuration loads: a trap must not turn a
//! reporting problem into a second failure.

use tracing::warn;

use crate::cli::output;
use crate::core::config::Config;
use crate::core::constants;
use crate::core::notify::{parse_exit_code, Notifier, OciCliPublisher};
use crate::error::Result;

pub fn execute(config: &Config, raw_code: &str, message: Option<&str>) -> Result<i32> {
    let Some(exit_code) = parse_exit_code(raw_code) else {
        warn!(raw = raw_code, "malformed exit code, not alerting");
        output::warn(&format!("ignoring malformed exit code {:?}", raw_code));
        return Ok(constants::EXIT_SUCCESS);
    };

    let publisher = OciCliPublisher::new(&config.tools.oci);
    let message = message
        .map(str::to_string)
        .unwrap_or_else(|| format!("run exited with code {}", exit_code));
    let sent = Notifier::new(&publisher).notify_if_failed(
        exit_code,
        &config.host_id(),
        config.topic().as_ref(),
        &message,
    );

    if sent {
        output::success("failure alert published");
    }
    Ok(constants::EXIT_SUCCESS)
}
