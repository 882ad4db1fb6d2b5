//! systemd plumbing shared by the deferred unit and the periodic timer.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, trace};

use crate::core::exec;

/// Thin wrapper over the `systemctl` binary.
#[derive(Debug, Clone)]
pub struct Systemctl {
    binary: PathBuf,
}

impl Systemctl {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn daemon_reload(&self) -> Result<(), String> {
        self.call(&["daemon-reload"])
    }

    /// `enable --now`, optionally without waiting for the start job.
    pub fn enable_now(&self, unit: &str, no_block: bool) -> Result<(), String> {
        if no_block {
            self.call(&["enable", "--no-block", "--now", unit])
        } else {
            self.call(&["enable", "--now", unit])
        }
    }

    /// Whether `unit` is enabled. `is-enabled` exits non-zero for every
    /// other state, including units systemd has never loaded.
    pub fn is_enabled(&self, unit: &str) -> Result<bool, String> {
        Ok(self.output(&["is-enabled", unit])?.status.success())
    }

    fn output(&self, args: &[&str]) -> Result<Output, String> {
        trace!(binary = %self.binary.display(), ?args, "calling systemctl");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to execute {}: {}", self.binary.display(), e))
    }

    fn call(&self, args: &[&str]) -> Result<(), String> {
        let output = self.output(args)?;

        if !output.status.success() {
            return Err(format!(
                "systemctl {} exited with code {}: {}",
                args.join(" "),
                exec::exit_code(output.status),
                exec::last_line(&output.stderr)
            ));
        }
        Ok(())
    }
}

/// Escape `%` so systemd does not read it as a specifier.
pub fn escape_specifiers(value: &str) -> String {
    value.replace('%', "%%")
}

/// Write a unit file only when its content differs, with mode 0644.
///
/// Returns whether the file was (re)written.
pub fn write_unit(path: &Path, content: &str) -> io::Result<bool> {
    if fs::read_to_string(path).is_ok_and(|current| current == content) {
        debug!(path = %path.display(), "unit file up to date");
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    debug!(path = %path.display(), "unit file written");
    Ok(true)
}
