//! Object store backends for the native mirror engine.
//!
//! Stores expose flat keys (`reports/2026/10/usage.csv.gz`) with SHA-256
//! content checksums and multipart uploads: an upload is opened, parts are
//! written independently (possibly from several threads), and the object
//! only becomes visible when the upload completes.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::trace;

use crate::core::constants;
use crate::error::StoreError;

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the content.
    pub checksum: String,
}

/// Handle for an in-progress multipart upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(pub u64);

/// Minimal object store surface needed for a one-way mirror.
pub trait ObjectStore: Send + Sync {
    /// All objects whose key starts with `prefix`, sorted by key.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Read up to `len` bytes starting at `offset`.
    fn read_range(&self, key: &str, offset: u64, len: usize) -> Result<Vec<u8>, StoreError>;

    fn begin_upload(&self, key: &str) -> Result<UploadId, StoreError>;

    /// Store part `index` of an upload. Parts may arrive in any order.
    fn upload_part(&self, upload: UploadId, index: usize, data: &[u8]) -> Result<(), StoreError>;

    /// Assemble parts `0..parts` into the final object.
    fn complete_upload(&self, upload: UploadId, parts: usize) -> Result<ObjectMeta, StoreError>;

    /// Discard an upload. Best effort.
    fn abort_upload(&self, upload: UploadId);

    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

pub fn checksum(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Reject keys that could escape a filesystem root or collide with staging.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && !key.starts_with(constants::STAGING_DIR)
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store. Used for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    uploads: Mutex<HashMap<UploadId, (String, BTreeMap<usize, Vec<u8>>)>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an object directly, bypassing multipart.
    pub fn put(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectMeta {
                key: k.clone(),
                size: v.len() as u64,
                checksum: checksum(v),
            })
            .collect())
    }

    fn read_range(&self, key: &str, offset: u64, len: usize) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let data = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn begin_upload(&self, key: &str) -> Result<UploadId, StoreError> {
        validate_key(key)?;
        let id = UploadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (key.to_string(), BTreeMap::new()));
        Ok(id)
    }

    fn upload_part(&self, upload: UploadId, index: usize, data: &[u8]) -> Result<(), StoreError> {
        let mut uploads = self.uploads.lock().unwrap_or_else(|e| e.into_inner());
        let (_, parts) = uploads
            .get_mut(&upload)
            .ok_or(StoreError::UnknownUpload(upload.0))?;
        parts.insert(index, data.to_vec());
        Ok(())
    }

    fn complete_upload(&self, upload: UploadId, parts: usize) -> Result<ObjectMeta, StoreError> {
        let (key, received) = self
            .uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&upload)
            .ok_or(StoreError::UnknownUpload(upload.0))?;

        let mut data = Vec::new();
        for index in 0..parts {
            let part = received.get(&index).ok_or(StoreError::MissingPart {
                id: upload.0,
                index,
            })?;
            data.extend_from_slice(part);
        }

        let meta = ObjectMeta {
            key: key.clone(),
            size: data.len() as u64,
            checksum: checksum(&data),
        };
        self.put(&key, data);
        Ok(meta)
    }

    fn abort_upload(&self, upload: UploadId) {
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&upload);
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Store rooted at a directory: keys are relative file paths.
///
/// Parts are staged under `<root>/.skiff-staging/<id>/` and concatenated
/// into a temporary file that is renamed into place on completion, so a
/// reader never observes a half-written object.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    uploads: Mutex<HashMap<UploadId, String>>,
    next_id: AtomicU64,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            uploads: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(std::process::id() as u64 * 1_000),
        }
    }

    fn staging(&self, upload: UploadId) -> PathBuf {
        self.root
            .join(constants::STAGING_DIR)
            .join(upload.0.to_string())
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_name() == constants::STAGING_DIR {
                continue;
            }
            if entry.file_type()?.is_dir() {
                self.walk(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }

    fn key_of(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

fn file_checksum(path: &Path) -> io::Result<(u64, String)> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, format!("{:x}", hasher.finalize())))
}

impl ObjectStore for FsStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let mut files = Vec::new();
        self.walk(&self.root, &mut files)?;

        let mut objects = Vec::new();
        for path in files {
            let Some(key) = self.key_of(&path) else {
                trace!(path = %path.display(), "skipping non-UTF-8 path");
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let (size, checksum) = file_checksum(&path)?;
            objects.push(ObjectMeta {
                key,
                size,
                checksum,
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn read_range(&self, key: &str, offset: u64, len: usize) -> Result<Vec<u8>, StoreError> {
        validate_key(key)?;
        let mut file = fs::File::open(self.root.join(key)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Io(e),
        })?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn begin_upload(&self, key: &str) -> Result<UploadId, StoreError> {
        validate_key(key)?;
        let id = UploadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        fs::create_dir_all(self.staging(id))?;
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, key.to_string());
        Ok(id)
    }

    fn upload_part(&self, upload: UploadId, index: usize, data: &[u8]) -> Result<(), StoreError> {
        if !self
            .uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&upload)
        {
            return Err(StoreError::UnknownUpload(upload.0));
        }
        fs::write(self.staging(upload).join(format!("{}.part", index)), data)?;
        Ok(())
    }

    fn complete_upload(&self, upload: UploadId, parts: usize) -> Result<ObjectMeta, StoreError> {
        let key = self
            .uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&upload)
            .ok_or(StoreError::UnknownUpload(upload.0))?;

        let staging = self.staging(upload);
        let assembled = staging.join("object");
        let result = (|| -> Result<ObjectMeta, StoreError> {
            let mut out = fs::File::create(&assembled)?;
            for index in 0..parts {
                let part = staging.join(format!("{}.part", index));
                let mut input = fs::File::open(&part).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => StoreError::MissingPart {
                        id: upload.0,
                        index,
                    },
                    _ => StoreError::Io(e),
                })?;
                io::copy(&mut input, &mut out)?;
            }
            out.flush()?;
            out.sync_all()?;

            let target = self.root.join(&key);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&assembled, &target)?;
            let (size, checksum) = file_checksum(&target)?;
            Ok(ObjectMeta {
                key: key.clone(),
                size,
                checksum,
            })
        })();

        let _ = fs::remove_dir_all(&staging);
        result
    }

    fn abort_upload(&self, upload: UploadId) {
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&upload);
        let _ = fs::remove_dir_all(self.staging(upload));
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        fs::remove_file(self.root.join(key)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Io(e),
        })
    }
}
