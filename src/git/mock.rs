//! git::mock
//!
//! In-memory [`VersionControl`] for deterministic lifecycle tests.
//!
//! # Design
//!
//! The mock keeps a history per directory. A "commit" snapshots the
//! fingerprints of the directory's visible top-level files, which is enough
//! to answer `is_dirty` the way a real repository with the standard
//! `.gitignore` would. Operations are recorded and any of them can be
//! configured to fail.
//!
//! # Example
//!
//! ```
//! use confkit::git::mock::{FailOn, MockVcs};
//! use confkit::git::VersionControl;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let vcs = MockVcs::new();
//! std::fs::write(dir.path().join("settings.yml"), "a: 1\n").unwrap();
//!
//! vcs.initialise(dir.path(), "init").unwrap();
//! assert_eq!(vcs.history(dir.path()), ["init"]);
//!
//! let vcs = vcs.fail_on(FailOn::Commit);
//! assert!(vcs.commit(dir.path(), "forced", true).is_err());
//! assert_eq!(vcs.history(dir.path()), ["init"]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::VersionControl;
use super::interface::GitError;
use crate::core::types::{CommitId, Fingerprint};

/// Mock version control.
///
/// Thread-safe via internal `Arc<Mutex<...>>`; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockVcs {
    inner: Arc<Mutex<MockVcsInner>>,
}

#[derive(Debug, Default)]
struct MockVcsInner {
    repos: HashMap<PathBuf, MockRepo>,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

#[derive(Debug, Default)]
struct MockRepo {
    commits: Vec<String>,
    snapshot: BTreeMap<String, Fingerprint>,
}

/// Which operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Initialise,
    Commit,
    IsDirty,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Initialise {
        dir: PathBuf,
        message: String,
    },
    IsDirty {
        dir: PathBuf,
    },
    Commit {
        dir: PathBuf,
        message: String,
        allow_empty: bool,
    },
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// All recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Recorded commits for `dir`, oldest first.
    pub fn history(&self, dir: &Path) -> Vec<String> {
        self.lock()
            .repos
            .get(dir)
            .map(|r| r.commits.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MockVcsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_fail(inner: &MockVcsInner, op: FailOn) -> Result<(), GitError> {
        if inner.fail_on == Some(op) {
            return Err(GitError::CommitFailed {
                message: format!("mock failure on {:?}", op),
            });
        }
        Ok(())
    }
}

/// Fingerprints of the visible top-level files in `dir`.
fn snapshot(dir: &Path) -> Result<BTreeMap<String, Fingerprint>, GitError> {
    let access = |e: std::io::Error| GitError::AccessError {
        message: e.to_string(),
    };
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(access)? {
        let entry = entry.map_err(access)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type().map_err(access)?.is_file() {
            continue;
        }
        let content = fs::read(entry.path()).map_err(access)?;
        files.insert(name, Fingerprint::of(&content));
    }
    Ok(files)
}

fn fake_commit_id(dir: &Path, n: usize) -> Result<CommitId, GitError> {
    let seed = format!("{}#{}", dir.display(), n);
    let hash = Fingerprint::of(seed.as_bytes());
    Ok(CommitId::new(&hash.as_str()[..40])?)
}

impl VersionControl for MockVcs {
    fn exists(&self, dir: &Path) -> bool {
        self.lock().repos.contains_key(dir)
    }

    fn initialise(&self, dir: &Path, message: &str) -> Result<Option<CommitId>, GitError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::Initialise {
            dir: dir.to_path_buf(),
            message: message.to_string(),
        });
        Self::check_fail(&inner, FailOn::Initialise)?;

        let snapshot = snapshot(dir)?;
        let repo = inner.repos.entry(dir.to_path_buf()).or_default();
        if snapshot.is_empty() {
            return Ok(None);
        }
        repo.snapshot = snapshot;
        repo.commits.push(message.to_string());
        fake_commit_id(dir, repo.commits.len()).map(Some)
    }

    fn is_dirty(&self, dir: &Path) -> Result<bool, GitError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::IsDirty {
            dir: dir.to_path_buf(),
        });
        Self::check_fail(&inner, FailOn::IsDirty)?;

        let repo = inner.repos.get(dir).ok_or_else(|| GitError::NotARepo {
            path: dir.to_path_buf(),
        })?;
        Ok(snapshot(dir)? != repo.snapshot)
    }

    fn commit(
        &self,
        dir: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<Option<CommitId>, GitError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::Commit {
            dir: dir.to_path_buf(),
            message: message.to_string(),
            allow_empty,
        });
        Self::check_fail(&inner, FailOn::Commit)?;

        let snapshot = snapshot(dir)?;
        let repo = inner.repos.get_mut(dir).ok_or_else(|| GitError::NotARepo {
            path: dir.to_path_buf(),
        })?;
        if !allow_empty && snapshot == repo.snapshot {
            return Ok(None);
        }
        repo.snapshot = snapshot;
        repo.commits.push(message.to_string());
        fake_commit_id(dir, repo.commits.len()).map(Some)
    }

    fn commit_count(&self, dir: &Path) -> Result<usize, GitError> {
        self.lock()
            .repos
            .get(dir)
            .map(|r| r.commits.len())
            .ok_or_else(|| GitError::NotARepo {
                path: dir.to_path_buf(),
            })
    }
}
