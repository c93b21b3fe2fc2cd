//! core::ops::lock
//!
//! Exclusive lock on a configuration directory.
//!
//! # Storage
//!
//! - `<dir>/.metadata/lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Held for the whole of a mutating operation (`init`, `apply`, `set`)
//! - Released on drop
//! - Acquisition never blocks; a second writer fails fast

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::core::paths::ConfigPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("configuration directory is locked by another process")]
    AlreadyLocked,

    /// Failed to create the lock file or its directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a configuration directory.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    file: Option<File>,
}

impl DirLock {
    /// Take the directory lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &ConfigPaths) -> Result<Self, LockError> {
        let metadata_dir = paths.metadata_dir();
        fs::create_dir_all(&metadata_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", metadata_dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired directory lock");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::AlreadyLocked)
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Take the lock, or `None` if someone else holds it.
    pub fn try_acquire(paths: &ConfigPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths() -> (TempDir, ConfigPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths::new(dir.path());
        (dir, paths)
    }

    #[test]
    fn acquire_creates_metadata_dir() {
        let (_dir, paths) = paths();
        let lock = DirLock::acquire(&paths).unwrap();
        assert!(lock.is_held());
        assert!(paths.metadata_dir().is_dir());
        assert_eq!(lock.path(), paths.lock_path());
    }

    #[test]
    fn second_acquire_fails_fast() {
        let (_dir, paths) = paths();
        let _held = DirLock::acquire(&paths).unwrap();
        assert!(matches!(
            DirLock::acquire(&paths),
            Err(LockError::AlreadyLocked)
        ));
        assert!(DirLock::try_acquire(&paths).unwrap().is_none());
    }

    #[test]
    fn drop_releases() {
        let (_dir, paths) = paths();
        {
            let _lock = DirLock::acquire(&paths).unwrap();
        }
        assert!(DirLock::acquire(&paths).is_ok());
    }

    #[test]
    fn explicit_release() {
        let (_dir, paths) = paths();
        let mut lock = DirLock::acquire(&paths).unwrap();
        lock.release().unwrap();
        assert!(!lock.is_held());
        lock.release().unwrap();
        assert!(DirLock::acquire(&paths).is_ok());
    }
}
