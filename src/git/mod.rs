//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. No other module imports
//! `git2`. The lifecycle reaches version control through the
//! [`VersionControl`] trait so it can run against a real repository
//! ([`GitBackend`]) or an in-memory one ([`mock::MockVcs`]).
//!
//! # Responsibilities
//!
//! - Repository creation and opening (never searching parent directories)
//! - Dirty-state detection
//! - Staging and committing the whole working tree
//! - History queries (commit count, HEAD summary)
//!
//! # Invariants
//!
//! - A failed commit leaves HEAD and the on-disk index untouched
//! - All operations return strong types ([`CommitId`](crate::core::types::CommitId))

mod backend;
mod interface;
pub mod mock;

pub use backend::{GitBackend, VersionControl};
pub use interface::{Author, CommitInfo, Git, GitError};
