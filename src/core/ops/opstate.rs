//! core::ops::opstate
//!
//! Marker recording an apply in flight.
//!
//! The marker is written before the current document is replaced and
//! removed once the commit landed (or the document was restored). A marker
//! found on disk therefore means a previous apply was interrupted, or that
//! it failed and could not put the document back.
//!
//! # Storage
//!
//! - `<dir>/.metadata/apply.json`

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::atomic::write_atomic;
use crate::core::paths::ConfigPaths;
use crate::core::types::Fingerprint;

/// Errors reading or writing the marker.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("apply marker i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("apply marker json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Unique identifier for one apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(String);

impl OpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How far an apply got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPhase {
    /// Replacing the current document.
    Persisting,
    /// Document replaced, commit in progress.
    Committing,
    /// Commit failed and the previous document could not be restored.
    Failed,
}

/// The on-disk apply marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyMarker {
    pub op_id: OpId,
    pub message: String,
    pub started_at: DateTime<Utc>,
    /// Fingerprint of the document before the apply.
    pub previous: Fingerprint,
    /// Fingerprint of the document being persisted.
    pub target: Fingerprint,
    pub phase: ApplyPhase,
}

impl ApplyMarker {
    pub fn new(message: impl Into<String>, previous: Fingerprint, target: Fingerprint) -> Self {
        Self {
            op_id: OpId::new(),
            message: message.into(),
            started_at: Utc::now(),
            previous,
            target,
            phase: ApplyPhase::Persisting,
        }
    }

    pub fn path(paths: &ConfigPaths) -> PathBuf {
        paths.apply_marker_path()
    }

    /// Write the marker, replacing any previous one.
    pub fn write(&self, paths: &ConfigPaths) -> Result<(), MarkerError> {
        fs::create_dir_all(paths.metadata_dir())?;
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(&Self::path(paths), content.as_bytes())?;
        Ok(())
    }

    /// Read the marker, if there is one.
    pub fn read(paths: &ConfigPaths) -> Result<Option<Self>, MarkerError> {
        let path = Self::path(paths);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn remove(paths: &ConfigPaths) -> Result<(), MarkerError> {
        let path = Self::path(paths);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn exists(paths: &ConfigPaths) -> bool {
        Self::path(paths).exists()
    }

    /// Move to `phase` and write to disk.
    pub fn update_phase(&mut self, phase: ApplyPhase, paths: &ConfigPaths) -> Result<(), MarkerError> {
        self.phase = phase;
        self.write(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn marker() -> ApplyMarker {
        ApplyMarker::new("msg", Fingerprint::of(b"old"), Fingerprint::of(b"new"))
    }

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths::new(dir.path());
        assert!(ApplyMarker::read(&paths).unwrap().is_none());

        let m = marker();
        m.write(&paths).unwrap();
        assert!(ApplyMarker::exists(&paths));
        assert_eq!(ApplyMarker::read(&paths).unwrap(), Some(m));

        ApplyMarker::remove(&paths).unwrap();
        assert!(!ApplyMarker::exists(&paths));
        ApplyMarker::remove(&paths).unwrap();
    }

    #[test]
    fn phase_is_persisted_in_snake_case() {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths::new(dir.path());
        let mut m = marker();
        m.update_phase(ApplyPhase::Failed, &paths).unwrap();

        let raw = fs::read_to_string(paths.apply_marker_path()).unwrap();
        assert!(raw.contains("\"phase\": \"failed\""));
        assert_eq!(
            ApplyMarker::read(&paths).unwrap().unwrap().phase,
            ApplyPhase::Failed
        );
    }

    #[test]
    fn corrupt_marker_is_an_error() {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths::new(dir.path());
        fs::create_dir_all(paths.metadata_dir()).unwrap();
        fs::write(paths.apply_marker_path(), "not json").unwrap();
        assert!(matches!(
            ApplyMarker::read(&paths),
            Err(MarkerError::Json(_))
        ));
    }

    #[test]
    fn op_ids_are_unique() {
        assert_ne!(OpId::new(), OpId::new());
    }
}
