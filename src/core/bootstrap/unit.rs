//! The deferred bootstrap unit.
//!
//! First-boot hooks have a short execution budget, too short for package
//! downloads. `skiff enable` only writes and starts this one-shot unit;
//! the unit runs `skiff bootstrap` in the background, and
//! `RemainAfterExit=yes` keeps it recorded as done afterwards.

use std::path::PathBuf;
use tracing::info;

use super::systemd::{self, Systemctl};
use crate::error::BootstrapError;

#[derive(Debug, Clone)]
pub struct DeferredUnit {
    dir: PathBuf,
    name: String,
    exec_start: String,
    systemctl: Systemctl,
}

impl DeferredUnit {
    pub fn new(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        exec_start: impl Into<String>,
        systemctl: Systemctl,
    ) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            exec_start: exec_start.into(),
            systemctl,
        }
    }

    pub fn unit_name(&self) -> String {
        format!("{}.service", self.name)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.unit_name())
    }

    pub fn render(&self) -> String {
        format!(
            r#"[Unit]
Description=skiff deferred bootstrap
Wants=network-online.target
After=network-online.target

[Service]
Type=oneshot
RemainAfterExit=yes
TimeoutStartSec=infinity
ExecStart={exec}

[Install]
WantedBy=multi-user.target
"#,
            exec = systemd::escape_specifiers(&self.exec_start)
        )
    }

    /// Write the unit if it changed, then reload, enable and start it
    /// without waiting. Returns whether the unit file was written.
    ///
    /// The reload runs even when the file is unchanged: an earlier attempt
    /// may have written it and failed before systemd loaded it.
    pub fn install(&self) -> Result<bool, BootstrapError> {
        let unit = self.unit_name();
        let unit_err = |reason: String| BootstrapError::Unit {
            unit: unit.clone(),
            reason,
        };

        let path = self.path();
        let written = systemd::write_unit(&path, &self.render())
            .map_err(|e| unit_err(format!("failed to write {}: {}", path.display(), e)))?;
        self.systemctl.daemon_reload().map_err(unit_err)?;
        self.systemctl.enable_now(&unit, true).map_err(unit_err)?;

        info!(unit = %unit, written, "deferred bootstrap enabled");
        Ok(written)
    }
}
