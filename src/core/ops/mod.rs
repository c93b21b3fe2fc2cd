//! core::ops
//!
//! Low-level file operations shared by mutating commands.
//!
//! # Modules
//!
//! - [`atomic`] - Whole-file replacement via temp file and rename
//! - [`lock`] - Exclusive configuration directory lock
//! - [`opstate`] - Marker for an apply in flight
//!
//! Every mutating command acquires the directory lock first and replaces
//! files only through [`atomic::write_atomic`].

pub mod atomic;
pub mod lock;
pub mod opstate;

pub use atomic::{write_atomic, write_atomic_via};
pub use lock::{DirLock, LockError};
pub use opstate::{ApplyMarker, ApplyPhase, MarkerError, OpId};
