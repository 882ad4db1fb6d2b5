//! Run lock.
//!
//! An exclusive, non-blocking `flock` on a well-known path. Held for the
//! whole run and released when the [`RunLock`] is dropped or the process
//! exits, so a crashed run never leaves a stale lock behind.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::LockError;

/// Proof that this process is the only run in progress.
pub struct RunLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock or fail immediately.
    ///
    /// # Errors
    ///
    /// `LockError::AlreadyRunning` if another process holds it;
    /// `LockError::Io` if the lock file cannot be opened.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;

        let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(LockError::AlreadyRunning(path.to_path_buf()));
            }
            Err((_, errno)) => return Err(io_err(errno.into())),
        };

        // Owner pid for whoever finds the lock held. Informational only.
        let mut owner: &File = &lock;
        if let Err(e) = owner
            .set_len(0)
            .and_then(|_| writeln!(owner, "{}", std::process::id()))
        {
            debug!(path = %path.display(), error = %e, "could not record lock owner");
        }

        debug!(path = %path.display(), "run lock acquired");
        Ok(Self {
            _lock: lock,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for RunLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLock").field("path", &self.path).finish()
    }
}
