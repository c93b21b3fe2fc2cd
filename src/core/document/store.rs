//! core::document::store
//!
//! A [`Document`] bound to the file it was loaded from.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use super::{Document, DocumentError, ResolveError};
use crate::core::ops::atomic::{write_atomic, write_atomic_via};
use crate::core::types::VariablePath;

/// The in-memory working copy of one configuration file.
///
/// Nothing touches the disk between [`VariableStore::load`] and
/// [`VariableStore::save`]. The store keeps a list of the paths assigned
/// since loading so callers can report what an apply changed.
#[derive(Debug)]
pub struct VariableStore {
    path: PathBuf,
    document: Document,
    modified: Vec<VariablePath>,
    dirty: bool,
    staging: Option<PathBuf>,
}

impl VariableStore {
    /// Load the document at `path`.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::NotFound`] if the file does not exist
    /// - [`DocumentError::Read`] for other I/O failures
    /// - [`DocumentError::Parse`] if the content is not valid YAML
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DocumentError::NotFound { path: path.clone() },
            _ => DocumentError::Read {
                path: path.clone(),
                source: e,
            },
        })?;
        let document = Document::parse(text, &path.display().to_string())?;
        debug!(path = %path.display(), "loaded document");
        Ok(Self::with_document(path, document))
    }

    /// Bind an already-parsed document to `path` without reading it.
    pub fn with_document(path: impl Into<PathBuf>, document: Document) -> Self {
        Self {
            path: path.into(),
            document,
            modified: Vec::new(),
            dirty: false,
            staging: None,
        }
    }

    /// Stage temp files of [`save`](Self::save) in `dir` instead of next
    /// to the document.
    pub fn with_staging(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging = Some(dir.into());
        self
    }

    /// The file this store saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The value at `path`, or `None` when anything along it is missing.
    pub fn get(&self, path: &VariablePath) -> Option<&Value> {
        self.document.get(path)
    }

    /// Like [`get`](Self::get) but says why the path did not resolve.
    pub fn resolve(&self, path: &VariablePath) -> Result<&Value, ResolveError> {
        self.document.resolve(path)
    }

    /// Existence check, for telling an empty value apart from a missing one.
    pub fn contains(&self, path: &VariablePath) -> bool {
        self.document.contains(path)
    }

    /// Assign `value` at `path` in memory.
    pub fn set(&mut self, path: &VariablePath, value: impl Into<Value>) -> Result<(), DocumentError> {
        self.document.set(path, value.into())?;
        if !self.modified.contains(path) {
            self.modified.push(path.clone());
        }
        self.dirty = true;
        debug!(%path, "set variable");
        Ok(())
    }

    /// Read-only view of the whole tree.
    pub fn as_tree(&self) -> &Value {
        self.document.as_tree()
    }

    /// The document text as it would be saved.
    pub fn text(&self) -> &str {
        self.document.text()
    }

    /// Paths assigned since load, in first-assignment order.
    pub fn modified_paths(&self) -> &[VariablePath] {
        &self.modified
    }

    /// Whether there are assignments not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the document back to its source path.
    ///
    /// The write is atomic: on failure the file keeps its previous content
    /// and the in-memory document is unchanged.
    pub fn save(&mut self) -> Result<(), DocumentError> {
        let bytes = self.document.text().as_bytes();
        let written = match &self.staging {
            Some(staging) => write_atomic_via(&self.path, bytes, staging),
            None => write_atomic(&self.path, bytes),
        };
        written.map_err(|source| DocumentError::Persist {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        debug!(path = %self.path.display(), "saved document");
        Ok(())
    }

    /// Serialize to `sink` without touching the source path.
    pub fn dump<W: Write>(&self, sink: &mut W) -> Result<(), DocumentError> {
        self.document
            .render_to(sink)
            .map_err(|source| DocumentError::Persist {
                path: PathBuf::from("<sink>"),
                source,
            })
    }
}
