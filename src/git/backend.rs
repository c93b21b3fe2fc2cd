//! git::backend
//!
//! The version-control collaborator seen by the apply lifecycle.
//!
//! The lifecycle only needs a handful of questions answered about a
//! configuration directory, so it talks to [`VersionControl`] instead of
//! [`Git`] directly. [`GitBackend`] answers them with a real repository;
//! [`MockVcs`](super::mock::MockVcs) answers them in memory.

use std::path::Path;

use tracing::info;

use super::interface::{Author, Git, GitError};
use crate::core::config::{DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME};
use crate::core::types::CommitId;

/// Version control of a configuration directory.
pub trait VersionControl {
    /// Whether `dir` is under version control.
    fn exists(&self, dir: &Path) -> bool;

    /// Put `dir` under version control and record its current content.
    fn initialise(&self, dir: &Path, message: &str) -> Result<Option<CommitId>, GitError>;

    /// Whether `dir` has changes that are not committed.
    fn is_dirty(&self, dir: &Path) -> Result<bool, GitError>;

    /// Commit every change in `dir`.
    ///
    /// Returns `Ok(None)` when there was nothing to commit and
    /// `allow_empty` is false. On error, history is unchanged.
    fn commit(
        &self,
        dir: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<Option<CommitId>, GitError>;

    /// Number of commits in the directory's history.
    fn commit_count(&self, dir: &Path) -> Result<usize, GitError>;
}

/// [`VersionControl`] backed by a git repository in the directory itself.
#[derive(Debug, Clone)]
pub struct GitBackend {
    author: Author,
}

impl Default for GitBackend {
    fn default() -> Self {
        Self::new(Author::new(DEFAULT_AUTHOR_NAME, DEFAULT_AUTHOR_EMAIL))
    }
}

impl GitBackend {
    pub fn new(author: Author) -> Self {
        Self { author }
    }

    pub fn author(&self) -> &Author {
        &self.author
    }
}

impl VersionControl for GitBackend {
    fn exists(&self, dir: &Path) -> bool {
        Git::open(dir).is_ok()
    }

    fn initialise(&self, dir: &Path, message: &str) -> Result<Option<CommitId>, GitError> {
        let git = Git::init(dir)?;
        let id = git.commit_all(message, &self.author, false)?;
        info!(path = %dir.display(), "configuration directory under version control");
        Ok(id)
    }

    fn is_dirty(&self, dir: &Path) -> Result<bool, GitError> {
        Git::open(dir)?.is_dirty()
    }

    fn commit(
        &self,
        dir: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<Option<CommitId>, GitError> {
        Git::open(dir)?.commit_all(message, &self.author, allow_empty)
    }

    fn commit_count(&self, dir: &Path) -> Result<usize, GitError> {
        Git::open(dir)?.commit_count()
    }
}
