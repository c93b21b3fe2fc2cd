//! confkit - Versioned, hierarchical application configuration
//!
//! confkit keeps an application's configuration in a directory under git.
//! A read-only seed document supplies the defaults; the current document
//! (`settings.yml`) starts as a copy of it and is edited through dot-path
//! addressed `get`/`set`. `apply` persists and commits the result, and
//! `diff` shows how far the configuration has drifted from the seed.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - The init/apply lifecycle, hooks and rollback
//! - [`core`] - Domain types, documents, coercion, drift and operations
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! confkit maintains the following invariants:
//!
//! 1. Editing a value leaves every comment and key order of the document intact
//! 2. A failed apply leaves the current document as it was before the call
//! 3. Pre hooks run before any write; post hook failures never undo a commit
//! 4. One writer per configuration directory at a time

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
