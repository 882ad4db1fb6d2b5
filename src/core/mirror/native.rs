//! Native checksum mirror engine.
//!
//! Lists both sides, compares each source object against the destination
//! object with the same relative key, and uploads only what differs. Uploads
//! are multipart: each object is cut into `chunk_size` parts and at most
//! `upload_concurrency` parts are in flight at once, each read from the
//! source on demand so memory stays bounded by `chunk_size × concurrency`.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info};

use super::store::{FsStore, ObjectMeta, ObjectStore};
use super::{Mirror, SyncJob, SyncReport, TransferOptions};
use crate::core::constants;
use crate::core::credential::CredentialSet;
use crate::core::types::RemotePath;
use crate::error::{StoreError, SyncError};

/// In-process mirror over [`ObjectStore`]s.
///
/// Remotes resolve either to a registered store for a specific
/// `(remote, container)` pair or to a filesystem root under which each
/// container is a directory.
#[derive(Default)]
pub struct NativeMirror {
    stores: HashMap<(String, String), Arc<dyn ObjectStore>>,
    local_roots: BTreeMap<String, PathBuf>,
}

impl NativeMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `remote:container` from `store`.
    pub fn with_store(
        mut self,
        remote: impl Into<String>,
        container: impl Into<String>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        self.stores.insert((remote.into(), container.into()), store);
        self
    }

    /// Serve every container of `remote` from directories under `root`.
    pub fn with_local_root(mut self, remote: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.local_roots.insert(remote.into(), root.into());
        self
    }

    fn resolve(&self, path: &RemotePath) -> Result<Arc<dyn ObjectStore>, SyncError> {
        if let Some(store) = self
            .stores
            .get(&(path.remote.clone(), path.container.clone()))
        {
            return Ok(Arc::clone(store));
        }
        if let Some(root) = self.local_roots.get(&path.remote) {
            return Ok(Arc::new(FsStore::new(root.join(&path.container))));
        }
        Err(SyncError::UnsupportedRemote {
            engine: "native",
            remote: path.to_string(),
        })
    }
}

fn key_prefix(path: &RemotePath) -> String {
    path.prefix
        .as_ref()
        .map(|p| format!("{}/", p))
        .unwrap_or_default()
}

fn transfer_error(key: &str, err: StoreError) -> SyncError {
    SyncError::Transfer {
        code: constants::EXIT_FAILURE,
        reason: format!("{}: {}", key, err),
    }
}

/// Whether `dst` already holds the content of `src`.
fn up_to_date(src: &ObjectMeta, dst: Option<&ObjectMeta>, checksum: bool) -> bool {
    match dst {
        Some(dst) if checksum => dst.size == src.size && dst.checksum == src.checksum,
        Some(dst) => dst.size == src.size,
        None => false,
    }
}

/// Copy one object as a multipart upload with bounded part concurrency.
fn copy_object(
    source: &dyn ObjectStore,
    src: &ObjectMeta,
    destination: &dyn ObjectStore,
    dest_key: &str,
    options: &TransferOptions,
) -> Result<ObjectMeta, StoreError> {
    let chunk = usize::try_from(options.chunk_size.bytes()).unwrap_or(usize::MAX);
    let parts = usize::try_from(src.size.div_ceil(chunk as u64))
        .unwrap_or(usize::MAX)
        .max(1);
    let workers = options.upload_concurrency.clamp(1, parts);

    let upload = destination.begin_upload(dest_key)?;
    let next = AtomicUsize::new(0);
    let failure: Mutex<Option<StoreError>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if failure.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
                    break;
                }
                let index = next.fetch_add(1, Ordering::Relaxed);
                if index >= parts {
                    break;
                }
                let result = source
                    .read_range(&src.key, index as u64 * chunk as u64, chunk)
                    .and_then(|data| destination.upload_part(upload, index, &data));
                if let Err(err) = result {
                    failure
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .get_or_insert(err);
                    break;
                }
            });
        }
    });

    if let Some(err) = failure.into_inner().unwrap_or_else(|e| e.into_inner()) {
        destination.abort_upload(upload);
        return Err(err);
    }

    let written = destination.complete_upload(upload, parts)?;
    if written.checksum != src.checksum {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "checksum mismatch after upload (source changed during transfer?)",
        )));
    }
    debug!(key = %dest_key, size = written.size, parts, "object uploaded");
    Ok(written)
}

/// Mirror `source_prefix` of `source` onto `dest_prefix` of `destination`.
pub fn mirror_stores(
    source: &dyn ObjectStore,
    source_prefix: &str,
    destination: &dyn ObjectStore,
    dest_prefix: &str,
    options: &TransferOptions,
) -> Result<SyncReport, SyncError> {
    let listed = source
        .list(source_prefix)
        .map_err(|e| transfer_error(source_prefix, e))?;
    let existing: BTreeMap<String, ObjectMeta> = destination
        .list(dest_prefix)
        .map_err(|e| transfer_error(dest_prefix, e))?
        .into_iter()
        .filter_map(|meta| {
            let rel = meta.key.strip_prefix(dest_prefix)?.to_string();
            Some((rel, meta))
        })
        .collect();

    let mut transferred = 0;
    let mut skipped = 0;
    let mut bytes = 0u64;
    let mut seen = Vec::with_capacity(listed.len());

    for src in &listed {
        let Some(rel) = src.key.strip_prefix(source_prefix) else {
            continue;
        };
        seen.push(rel.to_string());

        if up_to_date(src, existing.get(rel), options.checksum) {
            skipped += 1;
            continue;
        }

        let dest_key = format!("{}{}", dest_prefix, rel);
        copy_object(source, src, destination, &dest_key, options)
            .map_err(|e| transfer_error(&src.key, e))?;
        transferred += 1;
        bytes += src.size;
    }

    let mut deleted = 0;
    if options.prune {
        for (rel, meta) in &existing {
            if seen.binary_search(rel).is_err() {
                destination
                    .delete(&meta.key)
                    .map_err(|e| transfer_error(&meta.key, e))?;
                debug!(key = %meta.key, "pruned extraneous object");
                deleted += 1;
            }
        }
    }

    Ok(SyncReport {
        transferred: Some(transferred),
        skipped: Some(skipped),
        deleted: Some(deleted),
        bytes: Some(bytes),
    })
}

impl Mirror for NativeMirror {
    fn name(&self) -> &'static str {
        "native"
    }

    fn sync(&self, job: &SyncJob, _credentials: &CredentialSet) -> Result<SyncReport, SyncError> {
        let source = self.resolve(&job.source)?;
        let destination = self.resolve(&job.destination)?;

        let report = mirror_stores(
            source.as_ref(),
            &key_prefix(&job.source),
            destination.as_ref(),
            &key_prefix(&job.destination),
            &job.options,
        )?;

        info!(
            source = %job.source,
            destination = %job.destination,
            transferred = report.transferred.unwrap_or(0),
            skipped = report.skipped.unwrap_or(0),
            deleted = report.deleted.unwrap_or(0),
            "native mirror finished"
        );
        Ok(report)
    }
}
