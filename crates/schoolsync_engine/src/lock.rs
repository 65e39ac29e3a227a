//! Single-instance lock per station database.

use crate::error::{SyncError, SyncResult};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive advisory lock held for the lifetime of an agent.
///
/// The lock file lives in `lock_dir` (the system temp directory by
/// default) and is named after a hash of the canonical database path, so
/// two agents pointed at the same database contend while agents for
/// different databases do not. The operating system releases the lock
/// when the process dies.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Returns the lock file path for `db_path`.
    pub fn lock_path(db_path: &Path, lock_dir: Option<&Path>) -> PathBuf {
        let canonical = db_path
            .canonicalize()
            .unwrap_or_else(|_| db_path.to_path_buf());
        let digest = format!(
            "{:x}",
            Sha256::digest(canonical.to_string_lossy().as_bytes())
        );
        let dir = lock_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        dir.join(format!("schoolsync_agent_{}.lock", &digest[..16]))
    }

    /// Acquires the lock without blocking.
    ///
    /// Returns [`SyncError::Lock`] when another agent holds it.
    pub fn acquire(db_path: &Path, lock_dir: Option<&Path>) -> SyncResult<Self> {
        let path = Self::lock_path(db_path, lock_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(SyncError::Lock { path });
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "instance lock acquired");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // The file stays; removing it would let a waiter lock an unlinked inode.
        let _ = FileExt::unlock(&self.file);
    }
}
