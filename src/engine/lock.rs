// src/engine/lock.rs

//! Cross-process run lock.
//!
//! Each engine guards its own runs with [`super::BackupGuard`]. Two engines
//! pointed at the same backup root (a daemon and a `now` invocation) are
//! kept apart by an exclusive lock on a file inside that root, held for as
//! long as the run permit lives.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::config::BackupConfiguration;

pub const LOCK_FILE_NAME: &str = ".world-backup.lock";

/// Where the run lock for `cfg` lives.
pub fn lock_path(cfg: &BackupConfiguration) -> PathBuf {
    cfg.backup_root().join(LOCK_FILE_NAME)
}

/// Held exclusive lock. Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

impl RunLock {
    /// Take the lock without blocking. `Ok(None)` when another process (or
    /// another handle in this one) already holds it.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_handle_is_refused_until_first_drops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backups").join(LOCK_FILE_NAME);

        let first = RunLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(RunLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(RunLock::try_acquire(&path).unwrap().is_some());
    }
}
