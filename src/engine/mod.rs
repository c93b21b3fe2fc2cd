//! engine
//!
//! Drives the configuration lifecycle: Gate -> Hook -> Persist -> Commit.
//!
//! # Architecture
//!
//! [`ConfigurationManager`] is the only component that mutates a
//! configuration directory. Every operation follows the same shape:
//!
//! ```text
//! Detect state -> Gate -> Lock -> [pre hook] -> Mutate -> Commit -> [post hook]
//! ```
//!
//! If gating fails the operation is refused with the state that blocked it.
//! The engine never repairs on its own; an interrupted apply is recovered
//! by an explicit forced apply.
//!
//! # Invariants
//!
//! - A pre-hook failure aborts before anything is written
//! - A failed commit leaves the current document as it was before the call
//! - A failed restore is reported, never swallowed, and leaves a marker
//!   that blocks further applies until forced

pub mod hooks;
pub mod lifecycle;
pub mod rollback;

// Fault injection points, for unit tests and for integration tests built
// with the `fault_injection` feature.
#[cfg(any(test, feature = "fault_injection"))]
pub mod failpoints;

pub use hooks::{HookContext, HookError, HookFailure, HookPhase, HookStage, LifecycleHooks, NoHooks};
pub use lifecycle::{
    ApplyOutcome, ApplyRecord, ConfigurationManager, InitRecord, LifecycleError, INIT_MESSAGE,
    RESET_MESSAGE,
};
pub use rollback::{rollback, FileSnapshot, RollbackError, RollbackResult};

use std::path::PathBuf;

use crate::core::coerce::TypeRegistry;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Configuration directory override.
    pub dir: Option<PathBuf>,
    /// Seed document override.
    pub seed: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Value types accepted by `set`.
    pub registry: TypeRegistry,
}
