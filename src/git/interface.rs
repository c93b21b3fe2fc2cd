//! git::interface
//!
//! The [`Git`] wrapper around a configuration directory's repository.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::types::{CommitId, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The directory is not the root of a Git repository.
    #[error("not a git repository: {}", path.display())]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Creating the repository failed.
    #[error("failed to initialise repository at {}: {message}", path.display())]
    InitFailed { path: PathBuf, message: String },

    /// Recording a commit failed.
    #[error("commit failed: {message}")]
    CommitFailed { message: String },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError { message: String },

    /// Invalid commit id.
    #[error("invalid commit id: {oid}")]
    InvalidOid { oid: String },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl GitError {
    /// Create a GitError from a git2::Error with context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidOid {
            oid: err.to_string(),
        }
    }
}

/// Commit identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Summary of one commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub summary: String,
    pub author_name: String,
    pub author_email: String,
    pub time: DateTime<Utc>,
}

/// A repository whose working directory is a configuration directory.
///
/// This is the only type in the crate that touches `git2`.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Create a repository at `dir`.
    pub fn init(dir: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init(dir).map_err(|e| GitError::InitFailed {
            path: dir.to_path_buf(),
            message: e.message().to_string(),
        })?;
        debug!(path = %dir.display(), "initialised repository");
        Ok(Self { repo })
    }

    /// Open the repository rooted exactly at `dir`.
    ///
    /// Parent directories are not searched: a configuration directory that
    /// sits inside some other checkout is not a repository of its own.
    pub fn open(dir: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open_ext(
            dir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(|_| GitError::NotARepo {
            path: dir.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }
        Ok(Self { repo })
    }

    /// Working directory of the repository.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    /// Whether any non-ignored file differs from HEAD, untracked included.
    pub fn is_dirty(&self) -> Result<bool, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, "status"))?;
        Ok(!statuses.is_empty())
    }

    /// The commit HEAD points at, or `None` on an unborn branch.
    pub fn head(&self) -> Result<Option<CommitId>, GitError> {
        self.head_commit()?
            .map(|commit| oid_to_commit_id(commit.id()))
            .transpose()
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(
                head.peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?,
            )),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    /// Stage every non-ignored change and commit it on HEAD.
    ///
    /// Returns `Ok(None)` without committing when nothing changed and
    /// `allow_empty` is false. The index file is written only after the
    /// commit object and HEAD update succeeded, so a failure leaves both
    /// history and index as they were.
    ///
    /// Once HEAD has moved the commit is reported even if the index file
    /// cannot be written; the stale index is logged and rewritten by the
    /// next call.
    pub fn commit_all(
        &self,
        message: &str,
        author: &Author,
        allow_empty: bool,
    ) -> Result<Option<CommitId>, GitError> {
        let mut index = self
            .repo
            .index()
            .map_err(|e| GitError::from_git2(e, "index"))?;

        let result = self.commit_index(&mut index, message, author, allow_empty);
        match &result {
            Ok(id) => {
                if let Err(e) = write_index(&mut index) {
                    warn!(
                        commit = ?id.as_ref().map(|id| id.short(7)),
                        error = %e,
                        "index file not updated"
                    );
                }
            }
            Err(_) => {
                // Drop the in-memory staging.
                let _ = index.read(true);
            }
        }
        result
    }

    fn commit_index(
        &self,
        index: &mut git2::Index,
        message: &str,
        author: &Author,
        allow_empty: bool,
    ) -> Result<Option<CommitId>, GitError> {
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| GitError::from_git2(e, "stage"))?;
        index
            .update_all(["*"].iter(), None)
            .map_err(|e| GitError::from_git2(e, "stage"))?;
        let tree_id = index
            .write_tree()
            .map_err(|e| GitError::from_git2(e, "write tree"))?;

        let parent = self.head_commit()?;
        if !allow_empty {
            let unchanged = match &parent {
                Some(parent) => parent.tree_id() == tree_id,
                None => index.is_empty(),
            };
            if unchanged {
                debug!("nothing to commit");
                return Ok(None);
            }
        }

        #[cfg(any(test, feature = "fault_injection"))]
        crate::engine::failpoints::check(crate::engine::failpoints::GIT_COMMIT).map_err(
            |message| GitError::CommitFailed { message },
        )?;

        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(|e| GitError::from_git2(e, "find tree"))?;
        let signature = git2::Signature::now(&author.name, &author.email).map_err(|e| {
            GitError::CommitFailed {
                message: format!("invalid author: {}", e.message()),
            }
        })?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| GitError::CommitFailed {
                message: e.message().to_string(),
            })?;

        let id = oid_to_commit_id(oid)?;
        debug!(commit = %id.short(7), "recorded commit");
        Ok(Some(id))
    }

    /// Number of commits reachable from HEAD.
    pub fn commit_count(&self) -> Result<usize, GitError> {
        let Some(head) = self.head_commit()? else {
            return Ok(0);
        };
        let mut walk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        walk.push(head.id())
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        let mut count = 0;
        for oid in walk {
            oid.map_err(|e| GitError::from_git2(e, "revwalk"))?;
            count += 1;
        }
        Ok(count)
    }

    /// Information about HEAD, or `None` on an unborn branch.
    pub fn head_info(&self) -> Result<Option<CommitInfo>, GitError> {
        let Some(commit) = self.head_commit()? else {
            return Ok(None);
        };
        let author = commit.author();
        let time = DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(DateTime::UNIX_EPOCH);

        Ok(Some(CommitInfo {
            id: oid_to_commit_id(commit.id())?,
            summary: commit.summary().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            time,
        }))
    }
}

fn write_index(index: &mut git2::Index) -> Result<(), GitError> {
    #[cfg(any(test, feature = "fault_injection"))]
    crate::engine::failpoints::check(crate::engine::failpoints::WRITE_INDEX)
        .map_err(|message| GitError::AccessError { message })?;

    index
        .write()
        .map_err(|e| GitError::from_git2(e, "write index"))
}

fn oid_to_commit_id(oid: git2::Oid) -> Result<CommitId, GitError> {
    Ok(CommitId::new(oid.to_string())?)
}
