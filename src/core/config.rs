//! Configuration file management.
//!
//! Reads and validates `skiff.toml`, and turns it into the plans the runner
//! and launcher execute.
//!
//! ```toml
//! [[credentials]]
//! env = "AWS_ACCESS_KEY_ID"
//! secret_id = "ocid1.vaultsecret.oc1..aaaa"
//!
//! [[credentials]]
//! env = "AWS_SECRET_ACCESS_KEY"
//! secret_id = "ocid1.vaultsecret.oc1..bbbb"
//!
//! [sync]
//! source = "oci:bling"
//! destination = "s3:cost-archive/oci"
//!
//! [notify]
//! topic_id = "ocid1.onstopic.oc1..cccc"
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::core::bootstrap::install::InstallStep;
use crate::core::bootstrap::readiness::ReadinessPolicy;
use crate::core::bootstrap::schedule::{ScheduleEntry, SchedulerKind};
use crate::core::bootstrap::BootstrapPlan;
use crate::core::constants;
use crate::core::mirror::{Engine, SyncJob, TransferOptions};
use crate::core::run::{CredentialSpec, RunPlan};
use crate::core::types::{AuthMode, ByteSize, Interval, RemotePath, SecretRef, TopicRef};
use crate::error::{ConfigError, Result};

/// Log file encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Contents of `skiff.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name used in alerts. Defaults to the machine hostname.
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    pub sync: SyncConfig,
    /// Filesystem roots for the native engine, keyed by remote name.
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
}

/// One secret exported to the transfer as an environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    pub env: String,
    pub secret_id: String,
    /// Overrides `[auth] mode` for this secret.
    #[serde(default)]
    pub auth: Option<AuthMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub engine: Engine,
    pub source: String,
    pub destination: String,
    #[serde(default = "default_true")]
    pub checksum: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
    #[serde(default)]
    pub prune: bool,
    #[serde(default = "default_true")]
    pub verbose: bool,
    /// rclone backend whose chunking flags are set.
    #[serde(default = "default_upload_backend")]
    pub upload_backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Alerts are disabled when unset.
    #[serde(default)]
    pub topic_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
    /// Separate transfer log. Transfer output goes to `log_file` when unset.
    #[serde(default)]
    pub transfer_log: Option<PathBuf>,
    #[serde(default)]
    pub rclone_config: Option<PathBuf>,
    #[serde(default = "default_cron_file")]
    pub cron_file: PathBuf,
    #[serde(default = "default_systemd_dir")]
    pub systemd_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            lock_file: default_lock_file(),
            transfer_log: None,
            rclone_config: None,
            cron_file: default_cron_file(),
            systemd_dir: default_systemd_dir(),
        }
    }
}

/// External binaries. Bare names are looked up on `PATH`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_oci")]
    pub oci: PathBuf,
    #[serde(default = "default_rclone")]
    pub rclone: PathBuf,
    #[serde(default = "default_systemctl")]
    pub systemctl: PathBuf,
    /// skiff itself, as written into the schedule and the deferred unit.
    /// Defaults to the running executable.
    #[serde(default)]
    pub skiff: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            oci: default_oci(),
            rclone: default_rclone(),
            systemctl: default_systemctl(),
            skiff: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub scheduler: SchedulerKind,
    #[serde(default = "default_interval")]
    pub interval_minutes: u32,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_true")]
    pub first_run: bool,
    /// `host:port` polled until it accepts a TCP connection.
    #[serde(default)]
    pub probe: Option<String>,
    #[serde(default)]
    pub min_delay_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default)]
    pub install: Vec<InstallStep>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::default(),
            interval_minutes: default_interval(),
            user: default_user(),
            first_run: true,
            probe: None,
            min_delay_secs: 0,
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
            install: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_chunk_size() -> ByteSize {
    ByteSize(constants::DEFAULT_CHUNK_SIZE)
}
fn default_upload_concurrency() -> usize {
    constants::DEFAULT_UPLOAD_CONCURRENCY
}
fn default_upload_backend() -> String {
    "s3".to_string()
}
fn default_log_file() -> PathBuf {
    PathBuf::from(constants::DEFAULT_LOG_FILE)
}
fn default_lock_file() -> PathBuf {
    PathBuf::from(constants::DEFAULT_LOCK_FILE)
}
fn default_cron_file() -> PathBuf {
    PathBuf::from(constants::DEFAULT_CRON_FILE)
}
fn default_systemd_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_SYSTEMD_DIR)
}
fn default_oci() -> PathBuf {
    PathBuf::from("oci")
}
fn default_rclone() -> PathBuf {
    PathBuf::from("rclone")
}
fn default_systemctl() -> PathBuf {
    PathBuf::from("systemctl")
}
fn default_interval() -> u32 {
    constants::DEFAULT_INTERVAL_MINUTES
}
fn default_user() -> String {
    "root".to_string()
}
fn default_poll_interval() -> u64 {
    5
}
fn default_max_wait() -> u64 {
    300
}

impl Config {
    /// Load and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// `ConfigError::NotFound` if the file doesn't exist, `ConfigError::Parse`
    /// if the TOML is malformed, `ConfigError::Invalid` if validation fails.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config = Self::parse(&contents)?;

        debug!(
            credentials = config.credentials.len(),
            engine = ?config.sync.engine,
            "config loaded"
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> crate::error::Error { ConfigError::Invalid(msg).into() };

        if self.credentials.is_empty() {
            return Err(invalid("at least one [[credentials]] entry is required".into()));
        }
        let mut seen = BTreeSet::new();
        for cred in &self.credentials {
            if !is_env_name(&cred.env) {
                return Err(invalid(format!("invalid environment variable name: {:?}", cred.env)));
            }
            if !seen.insert(cred.env.as_str()) {
                return Err(invalid(format!("duplicate credential env: {}", cred.env)));
            }
            if cred.secret_id.trim().is_empty() {
                return Err(invalid(format!("credential {} has an empty secret_id", cred.env)));
            }
        }

        let job = self.sync_job()?;
        if job.source == job.destination {
            return Err(invalid("sync source and destination are the same".into()));
        }
        if self.sync.upload_concurrency == 0 {
            return Err(invalid("sync.upload_concurrency must be at least 1".into()));
        }
        if self.sync.engine == Engine::Native {
            for remote in [&job.source.remote, &job.destination.remote] {
                if !self.remotes.contains_key(remote) {
                    return Err(invalid(format!(
                        "remote {:?} has no [remotes.{}] root for the native engine",
                        remote, remote
                    )));
                }
            }
        }

        if self.notify.topic_id.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(invalid("notify.topic_id is empty".into()));
        }

        Interval::from_minutes(self.bootstrap.interval_minutes)?;
        if self.bootstrap.user.trim().is_empty() {
            return Err(invalid("bootstrap.user is empty".into()));
        }
        if self.bootstrap.poll_interval_secs == 0 {
            return Err(invalid("bootstrap.poll_interval_secs must be at least 1".into()));
        }
        for step in &self.bootstrap.install {
            if step.binary.trim().is_empty() || step.command.is_empty() {
                return Err(invalid(
                    "each [[bootstrap.install]] needs a binary and a command".into(),
                ));
            }
        }

        Ok(())
    }

    /// Host name reported in alerts.
    pub fn host_id(&self) -> String {
        self.host_id
            .clone()
            .or_else(|| whoami::fallible::hostname().ok())
            .unwrap_or_else(|| "unknown-host".to_string())
    }

    pub fn sync_job(&self) -> std::result::Result<SyncJob, ConfigError> {
        let parse = |s: &str| {
            s.parse::<RemotePath>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))
        };
        Ok(SyncJob {
            source: parse(&self.sync.source)?,
            destination: parse(&self.sync.destination)?,
            options: TransferOptions {
                checksum: self.sync.checksum,
                chunk_size: self.sync.chunk_size,
                upload_concurrency: self.sync.upload_concurrency,
                prune: self.sync.prune,
                log_file: Some(
                    self.paths
                        .transfer_log
                        .clone()
                        .unwrap_or_else(|| self.paths.log_file.clone()),
                ),
                verbose: self.sync.verbose,
            },
        })
    }

    /// Credentials in configuration order.
    pub fn credential_specs(&self) -> Vec<CredentialSpec> {
        self.credentials
            .iter()
            .map(|c| CredentialSpec {
                env: c.env.clone(),
                secret: SecretRef::new(&c.secret_id, c.auth.unwrap_or(self.auth.mode)),
            })
            .collect()
    }

    pub fn topic(&self) -> Option<TopicRef> {
        self.notify.topic_id.as_ref().map(|id| TopicRef {
            id: id.clone(),
            auth: self.auth.mode,
        })
    }

    pub fn run_plan(&self) -> std::result::Result<RunPlan, ConfigError> {
        Ok(RunPlan {
            credentials: self.credential_specs(),
            job: self.sync_job()?,
            host: self.host_id(),
            topic: self.topic(),
            lock_file: Some(self.paths.lock_file.clone()),
        })
    }

    pub fn interval(&self) -> std::result::Result<Interval, ConfigError> {
        Interval::from_minutes(self.bootstrap.interval_minutes)
    }

    /// Command line that runs skiff against this configuration.
    ///
    /// Scheduled commands run from `/`, so a relative `config_path` is
    /// resolved against the current directory first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if no skiff path is configured and the
    /// running executable cannot be determined, or if a path cannot be
    /// quoted for the command line.
    pub fn skiff_command(
        &self,
        config_path: &Path,
        subcommand: &str,
    ) -> std::result::Result<String, ConfigError> {
        let binary = match &self.tools.skiff {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| {
                ConfigError::Invalid(format!("cannot determine skiff executable: {}", e))
            })?,
        };
        let config_path = if config_path.is_absolute() {
            config_path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| {
                    ConfigError::Invalid(format!(
                        "cannot resolve config path {}: {}",
                        config_path.display(),
                        e
                    ))
                })?
                .join(config_path)
        };
        Ok(format!(
            "{} --config {} {}",
            quote_arg(&binary)?,
            quote_arg(&config_path)?,
            subcommand
        ))
    }

    pub fn schedule_entry(
        &self,
        config_path: &Path,
    ) -> std::result::Result<ScheduleEntry, ConfigError> {
        Ok(ScheduleEntry {
            interval: self.interval()?,
            user: self.bootstrap.user.clone(),
            command: self.skiff_command(config_path, "run")?,
        })
    }

    pub fn readiness(&self) -> Option<ReadinessPolicy> {
        self.bootstrap.probe.as_ref().map(|_| ReadinessPolicy {
            min_delay: Duration::from_secs(self.bootstrap.min_delay_secs),
            poll_interval: Duration::from_secs(self.bootstrap.poll_interval_secs),
            max_wait: Duration::from_secs(self.bootstrap.max_wait_secs),
        })
    }

    /// Configured install steps, or an rclone install when none are given
    /// and the rclone engine needs one.
    pub fn install_steps(&self) -> Vec<InstallStep> {
        if !self.bootstrap.install.is_empty() || self.sync.engine != Engine::Rclone {
            return self.bootstrap.install.clone();
        }
        vec![InstallStep {
            binary: self.tools.rclone.display().to_string(),
            command: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                constants::RCLONE_INSTALL_SCRIPT.to_string(),
            ],
        }]
    }

    pub fn bootstrap_plan(
        &self,
        config_path: &Path,
    ) -> std::result::Result<BootstrapPlan, ConfigError> {
        Ok(BootstrapPlan {
            readiness: self.readiness(),
            install: self.install_steps(),
            schedule: self.schedule_entry(config_path)?,
            first_run: self.bootstrap.first_run,
        })
    }
}

/// Single-quote `path` when it holds anything beyond plain path characters.
/// Both cron's shell and systemd's `ExecStart` accept the quoted form.
fn quote_arg(path: &Path) -> std::result::Result<String, ConfigError> {
    let text = path.to_str().ok_or_else(|| {
        ConfigError::Invalid(format!("path is not valid UTF-8: {}", path.display()))
    })?;
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=@,%".contains(c));
    if plain {
        return Ok(text.to_string());
    }
    if text.contains(['\'', '\n', '\\']) {
        return Err(ConfigError::Invalid(format!(
            "path cannot be used in a scheduled command: {}",
            text
        )));
    }
    Ok(format!("'{}'", text))
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
