//! engine::hooks
//!
//! Extension points around `init` and `apply`.
//!
//! An embedding application implements [`LifecycleHooks`] to run its own
//! work before or after the lifecycle mutates the configuration directory
//! (render templates, restart a service). Every method defaults to a no-op,
//! so implementors override only what they need.
//!
//! # Failure semantics
//!
//! - A failing pre-hook aborts the operation before anything is written.
//! - A failing post-hook does not undo the operation; it is reported next to
//!   the successful result as a [`HookFailure`].

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::core::paths::ConfigPaths;

/// Error raised by a hook implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Before or after the primary action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Pre,
    Post,
}

/// Which lifecycle call the hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Init,
    Apply,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookStage::Pre => "pre",
            HookStage::Post => "post",
        })
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookPhase::Init => "init",
            HookPhase::Apply => "apply",
        })
    }
}

/// A hook failed; says which one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage}-configure-{phase} hook failed: {source}")]
pub struct HookFailure {
    pub stage: HookStage,
    pub phase: HookPhase,
    #[source]
    pub source: HookError,
}

/// What a hook gets to see.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub paths: &'a ConfigPaths,
    pub seed: &'a Path,
    /// Commit message, for apply.
    pub message: Option<&'a str>,
    /// `--reset` for init, `--force` for apply.
    pub force: bool,
}

/// Capability interface injected into the lifecycle at construction.
///
/// Each method is called exactly once per corresponding lifecycle call.
pub trait LifecycleHooks {
    fn pre_configure_init(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn post_configure_init(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn pre_configure_apply(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn post_configure_apply(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl LifecycleHooks for NoHooks {}

/// Call the hook for `stage`/`phase`, tagging a failure with where it came from.
pub(crate) fn run(
    hooks: &dyn LifecycleHooks,
    stage: HookStage,
    phase: HookPhase,
    ctx: &HookContext<'_>,
) -> Result<(), HookFailure> {
    let result = match (stage, phase) {
        (HookStage::Pre, HookPhase::Init) => hooks.pre_configure_init(ctx),
        (HookStage::Post, HookPhase::Init) => hooks.post_configure_init(ctx),
        (HookStage::Pre, HookPhase::Apply) => hooks.pre_configure_apply(ctx),
        (HookStage::Post, HookPhase::Apply) => hooks.post_configure_apply(ctx),
    };
    result.map_err(|source| HookFailure {
        stage,
        phase,
        source,
    })
}
