//! Error types.
//!
//! Each concern has its own enum; [`Error`] composes them. Every variant maps
//! to a non-zero process exit code through [`Error::exit_code`].
//!
//! Notification failures have their own type ([`NotificationError`]) with no
//! conversion into [`Error`]: an alert that cannot be delivered must never
//! change the outcome of the run that raised it.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::constants;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Secret retrieval errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The secret store could not be reached, refused us, or the client tool failed.
    #[error("failed to fetch secret {secret}: {reason}")]
    Fetch {
        secret: String,
        code: Option<i32>,
        reason: String,
    },

    /// The secret bundle came back but its content is unusable.
    #[error("malformed secret {secret}: {reason}")]
    Format { secret: String, reason: String },
}

/// Mirror errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("transfer failed with exit code {code}: {reason}")]
    Transfer { code: i32, reason: String },

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid remote address: {0}")]
    InvalidRemote(String),

    #[error("remote not supported by the {engine} engine: {remote}")]
    UnsupportedRemote { engine: &'static str, remote: String },
}

/// Object store errors raised by [`crate::core::mirror::store::ObjectStore`] backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("unknown upload: {0}")]
    UnknownUpload(u64),

    #[error("upload {id} is missing part {index}")]
    MissingPart { id: u64, index: usize },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bootstrap launcher errors.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("failed to install {binary}: {reason}")]
    Install {
        binary: String,
        code: Option<i32>,
        reason: String,
    },

    #[error("failed to register schedule: {0}")]
    Schedule(String),

    #[error("failed to install unit {unit}: {reason}")]
    Unit { unit: String, reason: String },
}

/// Run lock errors.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("another run is in progress (lock held on {})", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("failed to open lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to deliver an alert. Logged by the notifier, never propagated.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to start publisher: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("publish rejected with exit code {code}: {reason}")]
    Rejected { code: i32, reason: String },
}

impl Error {
    /// Process exit code for this error. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => constants::EXIT_CONFIG,
            Error::Credential(CredentialError::Fetch { code, .. }) => {
                code.filter(|c| *c != 0).unwrap_or(constants::EXIT_FAILURE)
            }
            Error::Credential(CredentialError::Format { .. }) => constants::EXIT_DATA,
            Error::Sync(SyncError::Transfer { code, .. }) if *code != 0 => *code,
            Error::Sync(SyncError::Spawn { .. }) => constants::EXIT_TOOL_MISSING,
            Error::Sync(SyncError::InvalidRemote(_) | SyncError::UnsupportedRemote { .. }) => {
                constants::EXIT_CONFIG
            }
            Error::Sync(_) => constants::EXIT_FAILURE,
            Error::Bootstrap(BootstrapError::Install { code, .. }) => {
                code.filter(|c| *c != 0).unwrap_or(constants::EXIT_FAILURE)
            }
            Error::Bootstrap(_) => constants::EXIT_FAILURE,
            Error::Lock(LockError::AlreadyRunning(_)) => constants::EXIT_ALREADY_RUNNING,
            Error::Lock(LockError::Io { .. }) | Error::Io(_) => constants::EXIT_IO,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
