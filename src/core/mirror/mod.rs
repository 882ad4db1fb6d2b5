//! One-way mirror.
//!
//! Makes a destination match a source. Changes flow source → destination
//! only; nothing is ever read back from the destination into the source.
//!
//! ## Engines
//!
//! - **rclone** (default): drives the external transfer tool. Handles any
//!   provider rclone knows about.
//! - **native**: in-process checksum engine over [`store::ObjectStore`].
//!   Supports filesystem-backed remotes declared in `[remotes]`.
//!
//! ## Adding a New Engine
//!
//! 1. Implement the `Mirror` trait
//! 2. Add a variant to `Engine` and wire it in `cli::run`

pub mod native;
pub mod rclone;
pub mod store;

use serde::Deserialize;
use std::path::PathBuf;

use crate::core::credential::CredentialSet;
use crate::core::types::{ByteSize, RemotePath};
use crate::error::SyncError;

pub use native::NativeMirror;
pub use rclone::RcloneMirror;

/// Which mirror engine performs the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    #[default]
    Rclone,
    Native,
}

/// Transfer tuning and behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Compare content checksums instead of size/modification time.
    pub checksum: bool,
    /// Part size for multipart uploads.
    pub chunk_size: ByteSize,
    /// Parts uploaded in parallel per object.
    pub upload_concurrency: usize,
    /// Delete destination objects that are absent from the source.
    pub prune: bool,
    /// Append-only transfer log.
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

/// What to mirror and how. Built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub source: RemotePath,
    pub destination: RemotePath,
    pub options: TransferOptions,
}

/// Outcome of a successful sync.
///
/// Engines that delegate to an external tool may not know the counts; they
/// report `None` and leave the details to the tool's log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub transferred: Option<usize>,
    pub skipped: Option<usize>,
    pub deleted: Option<usize>,
    pub bytes: Option<u64>,
}

/// A one-way mirror engine.
pub trait Mirror {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Make `job.destination` match `job.source`.
    ///
    /// # Errors
    ///
    /// Stops at the first unrecoverable error. Partially completed work is
    /// not resumed; the next run re-evaluates every object.
    fn sync(&self, job: &SyncJob, credentials: &CredentialSet) -> Result<SyncReport, SyncError>;
}
