//! core
//!
//! Core domain types, documents, and operations for confkit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: VariablePath, CommitId, Fingerprint
//! - [`coerce`] - Raw text to typed values via a named type registry
//! - [`document`] - YAML documents with path-addressed get/set
//! - [`drift`] - Line diff between seed and current documents
//! - [`state`] - Lifecycle state detection and operation gating
//! - [`ops`] - Atomic writes, locking, and the apply marker
//! - [`config`] - Tool configuration schema and loading
//! - [`paths`] - Centralized path routing inside a configuration directory
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Reads never mutate; writes are atomic
//! - Document text survives round trips byte for byte

pub mod coerce;
pub mod config;
pub mod document;
pub mod drift;
pub mod ops;
pub mod paths;
pub mod state;
pub mod types;
