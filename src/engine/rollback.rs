//! engine::rollback
//!
//! Putting files back the way they were before a failed operation.
//!
//! Before the lifecycle replaces a file it takes a [`FileSnapshot`]. If the
//! commit that should follow fails, [`rollback`] writes every snapshot back
//! (atomically, in reverse order) and reports what it could and could not
//! restore.
//!
//! A snapshot of a file that did not exist restores by deleting the file.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::ops::atomic::{write_atomic, write_atomic_via};

/// Errors from rollback operations.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// The snapshot could not be taken.
    #[error("cannot snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The snapshot could not be written back.
    #[error("cannot restore {}: {source}", path.display())]
    Restore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The bytes of one file at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    path: PathBuf,
    /// `None` if the file did not exist.
    content: Option<Vec<u8>>,
    staging: Option<PathBuf>,
}

impl FileSnapshot {
    /// Read `path` now.
    pub fn capture(path: impl Into<PathBuf>) -> Result<Self, RollbackError> {
        let path = path.into();
        let content = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(RollbackError::Snapshot { path, source }),
        };
        Ok(Self {
            path,
            content,
            staging: None,
        })
    }

    /// Stage the restore's temp file in `dir`.
    pub fn staged_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Write the captured state back.
    pub fn restore(&self) -> Result<(), RollbackError> {
        #[cfg(any(test, feature = "fault_injection"))]
        crate::engine::failpoints::check(crate::engine::failpoints::RESTORE_DOCUMENT).map_err(
            |message| RollbackError::Restore {
                path: self.path.clone(),
                source: io::Error::other(message),
            },
        )?;

        let result = match &self.content {
            Some(bytes) => match &self.staging {
                Some(staging) => write_atomic_via(&self.path, bytes, staging),
                None => write_atomic(&self.path, bytes),
            },
            None => match fs::remove_file(&self.path) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        result.map_err(|source| RollbackError::Restore {
            path: self.path.clone(),
            source,
        })
    }
}

/// Result of a rollback attempt.
#[derive(Debug, Default)]
pub struct RollbackResult {
    /// Files put back.
    pub restored: Vec<PathBuf>,
    /// Files that could not be put back.
    pub failed: Vec<RollbackError>,
}

impl RollbackResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, path: PathBuf) {
        self.restored.push(path);
    }

    pub fn record_failure(&mut self, error: RollbackError) {
        self.failed.push(error);
    }

    /// Whether every snapshot was restored.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        if self.is_complete() {
            format!("restored {} file(s)", self.restored.len())
        } else {
            format!(
                "partial rollback: {} restored, {} failed",
                self.restored.len(),
                self.failed.len()
            )
        }
    }
}

/// Restore `snapshots` in reverse order.
///
/// Keeps going after a failure so as much as possible is put back.
pub fn rollback(snapshots: &[FileSnapshot]) -> RollbackResult {
    let mut result = RollbackResult::new();
    for snapshot in snapshots.iter().rev() {
        match snapshot.restore() {
            Ok(()) => {
                debug!(path = %snapshot.path.display(), "restored");
                result.record_success(snapshot.path.clone());
            }
            Err(e) => {
                warn!(error = %e, "rollback step failed");
                result.record_failure(e);
            }
        }
    }
    result
}
