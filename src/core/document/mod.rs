//! core::document
//!
//! Hierarchical YAML document with path-addressed access.
//!
//! # Model
//!
//! A [`Document`] holds the parsed tree (a `serde_yaml::Value`, whose
//! mappings keep insertion order) together with the text it was parsed
//! from. Reads walk the tree. Writes update the tree and then patch the
//! text, so comments and key order survive a round trip.
//!
//! # Invariants
//!
//! - The retained text always parses to the retained tree
//! - An unmodified document renders byte-identical to its source
//! - A failed `set` leaves both tree and text untouched
//!
//! Text patching is best-effort: when the source uses a layout the patcher
//! does not index, or the patch does not reproduce the tree, the document
//! falls back to canonical `serde_yaml` output for that write.

mod layout;
mod store;

use std::io::Write;
use std::path::PathBuf;

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use crate::core::types::VariablePath;

pub use store::VariableStore;

/// Errors from loading, editing and persisting documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The backing file does not exist.
    #[error("document not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The backing file exists but could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid YAML.
    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },

    /// Writing the document back failed.
    #[error("failed to persist '{}': {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An intermediate node on the path is not a mapping.
    #[error("cannot set '{path}': {} is {found}, not a mapping", describe_prefix(.at))]
    NotAMapping {
        path: String,
        at: String,
        found: &'static str,
    },

    /// The tree could not be serialized.
    #[error("failed to render document: {message}")]
    Render { message: String },
}

/// Why a path did not resolve.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A parent segment does not exist.
    #[error("'{at}' does not exist")]
    ParentMissing { at: String },

    /// A parent segment exists but holds a scalar or sequence.
    #[error("{} is {found}, not a mapping", describe_prefix(.at))]
    NotAMapping { at: String, found: &'static str },

    /// All parents exist but the final key does not.
    #[error("'{path}' does not exist")]
    LeafMissing { path: String },
}

fn describe_prefix(at: &str) -> String {
    if at.is_empty() {
        "the document root".to_string()
    } else {
        format!("'{}'", at)
    }
}

/// Short name of a node's kind, for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// A parsed document and its source text.
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    text: String,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
            text: String::new(),
        }
    }
}

impl Document {
    /// Parse YAML text. An empty (or comment-only) text is an empty mapping.
    ///
    /// `origin` names the source in error messages.
    pub fn parse(text: impl Into<String>, origin: &str) -> Result<Self, DocumentError> {
        let text = text.into();
        let root = if is_blank(&text) {
            Value::Mapping(Mapping::new())
        } else {
            match serde_yaml::from_str::<Value>(&text) {
                Ok(Value::Null) => Value::Mapping(Mapping::new()),
                Ok(root) => root,
                Err(e) => {
                    return Err(DocumentError::Parse {
                        origin: origin.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        };
        Ok(Self { root, text })
    }

    /// The whole tree.
    pub fn as_tree(&self) -> &Value {
        &self.root
    }

    /// The current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Write the current text to `sink`.
    pub fn render_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        sink.write_all(self.text.as_bytes())
    }

    /// Walk `path`, reporting where it stopped if it did not resolve.
    pub fn resolve(&self, path: &VariablePath) -> Result<&Value, ResolveError> {
        let segments = path.segments();
        let mut node = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            let map = node.as_mapping().ok_or_else(|| ResolveError::NotAMapping {
                at: segments[..depth].join("."),
                found: kind_name(node),
            })?;
            node = match map.get(segment.as_str()) {
                Some(child) => child,
                None if depth + 1 == segments.len() => {
                    return Err(ResolveError::LeafMissing {
                        path: path.to_string(),
                    })
                }
                None => {
                    return Err(ResolveError::ParentMissing {
                        at: segments[..=depth].join("."),
                    })
                }
            };
        }
        Ok(node)
    }

    /// The node at `path`, or `None` if any segment is missing.
    pub fn get(&self, path: &VariablePath) -> Option<&Value> {
        self.resolve(path).ok()
    }

    /// Check whether `path` resolves.
    pub fn contains(&self, path: &VariablePath) -> bool {
        self.resolve(path).is_ok()
    }

    /// Assign `value` at `path`, creating missing intermediate mappings.
    ///
    /// Existing keys keep their position; new keys are appended to their
    /// parent mapping.
    ///
    /// # Errors
    ///
    /// [`DocumentError::NotAMapping`] if an existing node on the way is not
    /// a mapping. Nothing is changed in that case.
    pub fn set(&mut self, path: &VariablePath, value: Value) -> Result<(), DocumentError> {
        let existing = self.existing_depth(path)?;
        let previous = self.assign(path, value.clone())?;
        let replaced = existing == path.parent().len() && previous.is_some();

        let patched = layout::Layout::scan(&self.text).and_then(|layout| {
            let segments = path.segments();
            if replaced {
                layout.replace(segments, &value)
            } else {
                layout.insert(&segments[..existing], &segments[existing..], &value)
            }
        });

        let text = match patched {
            Some(text) if reparses_to(&text, &self.root) => text,
            _ => {
                debug!(%path, "falling back to canonical rendering");
                match serde_yaml::to_string(&self.root) {
                    Ok(text) => text,
                    Err(e) => {
                        self.undo(path, existing, previous);
                        return Err(DocumentError::Render {
                            message: e.to_string(),
                        });
                    }
                }
            }
        };

        self.text = text;
        Ok(())
    }

    /// Number of parent segments that already exist as mappings.
    fn existing_depth(&self, path: &VariablePath) -> Result<usize, DocumentError> {
        let parent = path.parent();
        let mut node = &self.root;
        let mut depth = 0;
        loop {
            let map = node.as_mapping().ok_or_else(|| DocumentError::NotAMapping {
                path: path.to_string(),
                at: parent[..depth].join("."),
                found: kind_name(node),
            })?;
            if depth == parent.len() {
                return Ok(depth);
            }
            match map.get(parent[depth].as_str()) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => return Ok(depth),
            }
        }
    }

    /// Mutate the tree, returning the value previously at `path`.
    fn assign(&mut self, path: &VariablePath, value: Value) -> Result<Option<Value>, DocumentError> {
        let not_a_mapping = |at: &[String], node: &Value| DocumentError::NotAMapping {
            path: path.to_string(),
            at: at.join("."),
            found: kind_name(node),
        };

        let parent = path.parent();
        let mut node = &mut self.root;
        for (depth, segment) in parent.iter().enumerate() {
            node = match node {
                Value::Mapping(map) => map
                    .entry(Value::String(segment.clone()))
                    .or_insert_with(|| Value::Mapping(Mapping::new())),
                other => return Err(not_a_mapping(&parent[..depth], other)),
            };
        }

        match node {
            Value::Mapping(map) => Ok(map.insert(Value::String(path.leaf().to_string()), value)),
            other => Err(not_a_mapping(parent, other)),
        }
    }

    /// Reverse an `assign` whose text could not be produced.
    fn undo(&mut self, path: &VariablePath, existing: usize, previous: Option<Value>) {
        let segments = path.segments();
        let mut node = &mut self.root;
        for segment in &segments[..existing] {
            match node
                .as_mapping_mut()
                .and_then(|map| map.get_mut(segment.as_str()))
            {
                Some(child) => node = child,
                None => return,
            }
        }
        let Some(map) = node.as_mapping_mut() else {
            return;
        };
        let key = segments[existing].as_str();
        match previous {
            Some(old) if existing == path.parent().len() => {
                map.insert(Value::String(key.to_string()), old);
            }
            _ => {
                map.remove(key);
            }
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

fn reparses_to(text: &str, expected: &Value) -> bool {
    matches!(serde_yaml::from_str::<Value>(text), Ok(ref v) if v == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> VariablePath {
        VariablePath::parse(s).unwrap()
    }

    const SETTINGS: &str = "\
# service settings
db:
  host: localhost  # change per site
  port: 5432
log:
  level: info
";

    #[test]
    fn empty_text_is_empty_mapping() {
        let doc = Document::parse("", "test").unwrap();
        assert_eq!(doc.as_tree(), &Value::Mapping(Mapping::new()));
        let doc = Document::parse("# only a comment\n", "test").unwrap();
        assert!(doc.as_tree().is_mapping());
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = Document::parse("a: [1, 2\n", "settings.yml").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
        assert!(err.to_string().contains("settings.yml"));
    }

    #[test]
    fn get_walks_mappings() {
        let doc = Document::parse(SETTINGS, "test").unwrap();
        assert_eq!(doc.get(&path("db.port")), Some(&Value::from(5432)));
        assert!(doc.get(&path("db")).unwrap().is_mapping());
        assert_eq!(doc.get(&path("db.user")), None);
        assert_eq!(doc.get(&path("cache.host")), None);
        assert_eq!(doc.get(&path("db.port.number")), None);
    }

    #[test]
    fn resolve_reports_where_it_stopped() {
        let doc = Document::parse(SETTINGS, "test").unwrap();
        assert_eq!(
            doc.resolve(&path("cache.redis.host")),
            Err(ResolveError::ParentMissing { at: "cache".into() })
        );
        assert_eq!(
            doc.resolve(&path("db.user")),
            Err(ResolveError::LeafMissing {
                path: "db.user".into()
            })
        );
        assert_eq!(
            doc.resolve(&path("db.port.number")),
            Err(ResolveError::NotAMapping {
                at: "db.port".into(),
                found: "a number"
            })
        );
    }

    #[test]
    fn unmodified_text_is_kept() {
        let doc = Document::parse(SETTINGS, "test").unwrap();
        let mut out = Vec::new();
        doc.render_to(&mut out).unwrap();
        assert_eq!(out, SETTINGS.as_bytes());
    }

    #[test]
    fn set_existing_scalar_keeps_comments_and_order() {
        let mut doc = Document::parse(SETTINGS, "test").unwrap();
        doc.set(&path("db.port"), Value::from(5433)).unwrap();

        assert_eq!(doc.get(&path("db.port")), Some(&Value::from(5433)));
        assert_eq!(doc.text(), SETTINGS.replace("5432", "5433"));
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut doc = Document::parse(SETTINGS, "test").unwrap();
        doc.set(&path("cache.redis.port"), Value::from(6379))
            .unwrap();

        assert_eq!(doc.get(&path("cache.redis.port")), Some(&Value::from(6379)));
        assert!(doc.text().starts_with("# service settings\n"));
        assert!(doc.text().ends_with("cache:\n  redis:\n    port: 6379\n"));
    }

    #[test]
    fn set_appends_new_key_to_parent() {
        let mut doc = Document::parse(SETTINGS, "test").unwrap();
        doc.set(&path("db.user"), Value::String("admin".into()))
            .unwrap();

        let keys: Vec<&str> = doc
            .get(&path("db"))
            .and_then(Value::as_mapping)
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, ["host", "port", "user"]);
        assert!(doc.text().contains("  host: localhost  # change per site\n"));
    }

    #[test]
    fn set_through_scalar_fails_without_change() {
        let mut doc = Document::parse(SETTINGS, "test").unwrap();
        let err = doc
            .set(&path("db.port.number"), Value::from(1))
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::NotAMapping { ref at, found: "a number", .. } if at == "db.port"
        ));
        assert_eq!(doc.text(), SETTINGS);
        assert_eq!(doc.get(&path("db.port")), Some(&Value::from(5432)));
    }

    #[test]
    fn set_on_non_mapping_root_fails() {
        let mut doc = Document::parse("- a\n- b\n", "test").unwrap();
        let err = doc.set(&path("a"), Value::from(1)).unwrap_err();
        assert!(err.to_string().contains("the document root"));
    }

    #[test]
    fn set_into_empty_document() {
        let mut doc = Document::parse("", "test").unwrap();
        doc.set(&path("a.b"), Value::Bool(true)).unwrap();
        assert_eq!(doc.text(), "a:\n  b: true\n");
    }

    #[test]
    fn unsupported_layout_falls_back_to_canonical() {
        let mut doc = Document::parse("{a: 1, b: {c: 2}}\n", "test").unwrap();
        doc.set(&path("b.c"), Value::from(3)).unwrap();
        assert_eq!(doc.text(), "a: 1\nb:\n  c: 3\n");
    }

    #[test]
    fn replacing_subtree_with_scalar() {
        let mut doc = Document::parse(SETTINGS, "test").unwrap();
        doc.set(&path("log"), Value::String("debug".into()))
            .unwrap();
        assert_eq!(doc.get(&path("log")), Some(&Value::String("debug".into())));
        assert!(doc.text().ends_with("log: debug\n"));
    }

    #[test]
    fn strings_that_look_like_numbers_stay_strings() {
        let mut doc = Document::parse(SETTINGS, "test").unwrap();
        doc.set(&path("db.port"), Value::String("5433".into()))
            .unwrap();
        let reparsed = Document::parse(doc.text(), "test").unwrap();
        assert_eq!(
            reparsed.get(&path("db.port")),
            Some(&Value::String("5433".into()))
        );
    }
}
