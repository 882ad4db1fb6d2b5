//! Idempotent tool installation.
//!
//! A step names the binary it provides and the command that installs it.
//! The command only runs when the binary cannot be found, and the binary
//! must be resolvable afterwards.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::core::exec;
use crate::error::BootstrapError;

/// One `[[bootstrap.install]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstallStep {
    /// Binary name (looked up on `PATH`) or absolute path.
    pub binary: String,
    /// argv of the install command.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyPresent(PathBuf),
    Installed(PathBuf),
}

impl InstallOutcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::AlreadyPresent(p) | Self::Installed(p) => p,
        }
    }
}

pub trait Installer {
    fn ensure(&self, step: &InstallStep) -> Result<InstallOutcome, BootstrapError>;
}

/// Runs install commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct CommandInstaller {
    /// Search path override; the process `PATH` when `None`.
    search_path: Option<OsString>,
}

impl CommandInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    fn locate(&self, binary: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(binary, Some(paths), cwd).ok()
            }
            None => which::which(binary).ok(),
        }
    }
}

impl Installer for CommandInstaller {
    fn ensure(&self, step: &InstallStep) -> Result<InstallOutcome, BootstrapError> {
        if let Some(path) = self.locate(&step.binary) {
            debug!(binary = %step.binary, path = %path.display(), "already installed");
            return Ok(InstallOutcome::AlreadyPresent(path));
        }

        let install_err = |code, reason| BootstrapError::Install {
            binary: step.binary.clone(),
            code,
            reason,
        };

        let (program, args) = step
            .command
            .split_first()
            .ok_or_else(|| install_err(None, "no install command configured".into()))?;

        info!(binary = %step.binary, command = ?step.command, "installing");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| install_err(None, format!("failed to execute {}: {}", program, e)))?;

        if !output.status.success() {
            let code = exec::exit_code(output.status);
            return Err(install_err(Some(code), exec::last_line(&output.stderr)));
        }

        let path = self.locate(&step.binary).ok_or_else(|| {
            install_err(None, "install command succeeded but binary is still missing".into())
        })?;
        info!(binary = %step.binary, path = %path.display(), "installed");
        Ok(InstallOutcome::Installed(path))
    }
}
