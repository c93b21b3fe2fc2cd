//! core::state
//!
//! Lifecycle state of a configuration directory, and which operations each
//! state permits.
//!
//! # States
//!
//! | state           | meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `NoDirectory`   | the directory does not exist                         |
//! | `Uninitialised` | no current document                                  |
//! | `Unversioned`   | a current document but no version control            |
//! | `Unmodified`    | everything committed                                 |
//! | `Modified`      | uncommitted changes                                  |
//! | `Applying`      | an apply marker is present (interrupted apply)       |
//! | `Failed`        | an apply failed and could not restore the document   |
//!
//! # Gating
//!
//! | state                       | init            | apply / set         | get / diff          |
//! |-----------------------------|-----------------|---------------------|---------------------|
//! | `NoDirectory`               | yes             | `ConfigDirMissing`  | `ConfigDirMissing`  |
//! | `Uninitialised`             | yes             | `NotInitialised`    | `NotInitialised`    |
//! | `Unversioned`               | only with reset | `NotInitialised`    | `NotInitialised`    |
//! | `Unmodified` / `Modified`   | only with reset | yes                 | yes                 |
//! | `Applying` / `Failed`       | no              | only when forced    | yes                 |

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::ops::{ApplyMarker, ApplyPhase};
use crate::core::paths::ConfigPaths;
use crate::git::{GitError, VersionControl};

/// An operation subject to gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Apply,
    Get,
    Set,
    Diff,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Init => "init",
            Operation::Apply => "apply",
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Diff => "diff",
        };
        f.write_str(name)
    }
}

/// Why an operation may not run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("configuration directory {} does not exist", dir.display())]
    ConfigDirMissing { dir: PathBuf },

    #[error("configuration directory {} is not initialised (run init first)", dir.display())]
    NotInitialised { dir: PathBuf },

    #[error("configuration directory {} is already initialised (use reset to start over)", dir.display())]
    AlreadyInitialised { dir: PathBuf },

    #[error("a previous apply in {} did not finish ({state}); rerun with force", dir.display())]
    ApplyInterrupted { dir: PathBuf, state: LifecycleState },
}

/// Detected lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NoDirectory,
    Uninitialised,
    /// A current document exists that init did not create.
    Unversioned,
    Unmodified,
    Modified,
    Applying,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::NoDirectory => "no directory",
            LifecycleState::Uninitialised => "uninitialised",
            LifecycleState::Unversioned => "unversioned",
            LifecycleState::Unmodified => "unmodified",
            LifecycleState::Modified => "modified",
            LifecycleState::Applying => "applying",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl LifecycleState {
    /// Inspect the directory.
    pub fn detect(paths: &ConfigPaths, vcs: &dyn VersionControl) -> Result<Self, GitError> {
        let dir = paths.dir();
        if !dir.is_dir() {
            return Ok(LifecycleState::NoDirectory);
        }

        match ApplyMarker::read(paths) {
            Ok(Some(marker)) if marker.phase == ApplyPhase::Failed => {
                return Ok(LifecycleState::Failed)
            }
            Ok(Some(_)) => return Ok(LifecycleState::Applying),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "unreadable apply marker");
                return Ok(LifecycleState::Applying);
            }
        }

        if !paths.current_document().is_file() {
            return Ok(LifecycleState::Uninitialised);
        }
        if !vcs.exists(dir) {
            return Ok(LifecycleState::Unversioned);
        }

        Ok(if vcs.is_dirty(dir)? {
            LifecycleState::Modified
        } else {
            LifecycleState::Unmodified
        })
    }

    /// Whether a current document exists and is under version control.
    pub fn is_initialised(self) -> bool {
        !matches!(
            self,
            LifecycleState::NoDirectory
                | LifecycleState::Uninitialised
                | LifecycleState::Unversioned
        )
    }

    /// Check that `op` may run in this state.
    ///
    /// `force` is the reset flag for [`Operation::Init`] and the force flag
    /// for everything else.
    pub fn verify_allowed(
        self,
        op: Operation,
        force: bool,
        paths: &ConfigPaths,
    ) -> Result<(), GateError> {
        let dir = paths.dir().to_path_buf();
        let verdict = match (self, op) {
            (LifecycleState::NoDirectory, Operation::Init) => Ok(()),
            (LifecycleState::NoDirectory, _) => Err(GateError::ConfigDirMissing { dir }),

            (LifecycleState::Uninitialised, Operation::Init) => Ok(()),
            (LifecycleState::Uninitialised, _) => Err(GateError::NotInitialised { dir }),

            // Never overwrite an existing document without an explicit reset.
            (LifecycleState::Unversioned, Operation::Init) => {
                if force {
                    Ok(())
                } else {
                    Err(GateError::AlreadyInitialised { dir })
                }
            }
            (LifecycleState::Unversioned, _) => Err(GateError::NotInitialised { dir }),

            (LifecycleState::Unmodified | LifecycleState::Modified, Operation::Init) => {
                if force {
                    Ok(())
                } else {
                    Err(GateError::AlreadyInitialised { dir })
                }
            }
            (LifecycleState::Unmodified | LifecycleState::Modified, _) => Ok(()),

            (LifecycleState::Applying | LifecycleState::Failed, Operation::Init) => {
                Err(GateError::AlreadyInitialised { dir })
            }
            (LifecycleState::Applying | LifecycleState::Failed, Operation::Apply | Operation::Set) => {
                if force {
                    Ok(())
                } else {
                    Err(GateError::ApplyInterrupted { dir, state: self })
                }
            }
            (LifecycleState::Applying | LifecycleState::Failed, _) => Ok(()),
        };

        if let Err(e) = &verdict {
            debug!(state = %self, operation = %op, error = %e, "operation rejected");
        }
        verdict
    }
}
