//! rclone mirror engine.
//!
//! Runs `rclone copy` (or `rclone sync` when pruning) with checksum
//! comparison and bounded multipart concurrency. Credentials are injected
//! into the child's environment only; the parent environment is untouched.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use super::{Mirror, SyncJob, SyncReport};
use crate::core::constants;
use crate::core::credential::CredentialSet;
use crate::core::exec;
use crate::error::SyncError;

/// Mirror engine backed by the rclone binary.
#[derive(Debug, Clone)]
pub struct RcloneMirror {
    binary: PathBuf,
    /// Remote definitions file, exported as `RCLONE_CONFIG`.
    config: Option<PathBuf>,
    /// Backend whose chunking flags are set (`s3` → `--s3-chunk-size`).
    upload_backend: String,
}

impl RcloneMirror {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config: None,
            upload_backend: "s3".to_string(),
        }
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    pub fn with_upload_backend(mut self, backend: impl Into<String>) -> Self {
        self.upload_backend = backend.into();
        self
    }

    /// Command-line arguments for `job`.
    pub fn args(&self, job: &SyncJob) -> Vec<String> {
        let opts = &job.options;
        let mut args = vec![
            if opts.prune { "sync" } else { "copy" }.to_string(),
            job.source.to_string(),
            job.destination.to_string(),
        ];

        if opts.checksum {
            args.push("--checksum".to_string());
        }
        args.push(format!("--{}-chunk-size", self.upload_backend));
        args.push(opts.chunk_size.to_string());
        args.push(format!("--{}-upload-concurrency", self.upload_backend));
        args.push(opts.upload_concurrency.to_string());

        if let Some(log_file) = &opts.log_file {
            args.push("--log-file".to_string());
            args.push(log_file.display().to_string());
        }
        if opts.verbose {
            args.push("-v".to_string());
        }
        args
    }
}

impl Mirror for RcloneMirror {
    fn name(&self) -> &'static str {
        "rclone"
    }

    fn sync(&self, job: &SyncJob, credentials: &CredentialSet) -> Result<SyncReport, SyncError> {
        let args = self.args(job);
        debug!(binary = %self.binary.display(), args = ?args, "starting rclone");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args).stdin(Stdio::null());
        if let Some(config) = &self.config {
            cmd.env(constants::RCLONE_CONFIG_ENV, config);
        }
        for (key, value) in credentials.env_pairs() {
            cmd.env(key, value);
        }

        let status = cmd.status().map_err(|e| SyncError::Spawn {
            tool: self.binary.display().to_string(),
            source: e,
        })?;

        if !status.success() {
            let code = exec::exit_code(status);
            return Err(SyncError::Transfer {
                code,
                reason: format!("rclone exited with code {}", code),
            });
        }

        info!(source = %job.source, destination = %job.destination, "rclone finished");
        Ok(SyncReport::default())
    }
}
