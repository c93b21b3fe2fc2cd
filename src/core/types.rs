//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`VariablePath`] - Validated dot-delimited variable address
//! - [`CommitId`] - Version-control commit identifier
//! - [`Fingerprint`] - Content hash used to detect torn writes
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use confkit::core::types::{CommitId, VariablePath};
//!
//! let path = VariablePath::parse("db.primary.port").unwrap();
//! assert_eq!(path.segments(), ["db", "primary", "port"]);
//!
//! assert!(VariablePath::parse("").is_err());
//! assert!(CommitId::new("not-a-sha").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid variable path: {0}")]
    InvalidVariablePath(String),

    #[error("invalid commit id: {0}")]
    InvalidCommitId(String),
}

/// A validated dot-delimited variable address.
///
/// `a.b.c` addresses key `c` inside mapping `b` inside mapping `a`.
/// Segments are opaque keys: there is no escaping, so a key that itself
/// contains a `.` cannot be addressed.
///
/// Rules:
/// - The address cannot be empty
/// - No segment can be empty (`a..b`, `.a`, `a.` are rejected)
///
/// # Example
///
/// ```
/// use confkit::core::types::VariablePath;
///
/// let path = VariablePath::parse("db.port").unwrap();
/// assert_eq!(path.leaf(), "port");
/// assert_eq!(path.parent(), ["db"]);
/// assert_eq!(path.to_string(), "db.port");
///
/// assert!(VariablePath::parse("db..port").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariablePath(Vec<String>);

impl VariablePath {
    /// Parse a dot-delimited address.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVariablePath` if the address is empty or
    /// contains an empty segment.
    pub fn parse(address: &str) -> Result<Self, TypeError> {
        if address.is_empty() {
            return Err(TypeError::InvalidVariablePath(
                "variable path cannot be empty".into(),
            ));
        }

        let segments: Vec<String> = address.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TypeError::InvalidVariablePath(format!(
                "'{}' contains an empty segment",
                address
            )));
        }

        Ok(Self(segments))
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(TypeError::InvalidVariablePath(
                "variable path cannot be empty".into(),
            ));
        }
        if let Some(bad) = segments.iter().find(|s| s.is_empty() || s.contains('.')) {
            return Err(TypeError::InvalidVariablePath(format!(
                "invalid segment '{}'",
                bad
            )));
        }
        Ok(Self(segments))
    }

    /// All segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Every segment except the last.
    pub fn parent(&self) -> &[String] {
        &self.0[..self.0.len() - 1]
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    /// Number of segments (always at least one).
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Check whether `other` is this path or lies beneath it.
    pub fn contains(&self, other: &VariablePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl std::str::FromStr for VariablePath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VariablePath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VariablePath> for String {
    fn from(path: VariablePath) -> Self {
        path.to_string()
    }
}

/// A version-control commit identifier (40 hex characters, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Create a new validated commit id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCommitId` unless the input is exactly 40
    /// hexadecimal characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into().to_ascii_lowercase();
        if id.len() != 40 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidCommitId(id));
        }
        Ok(Self(id))
    }

    /// Get the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form for display.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CommitId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

/// SHA-256 of a document's bytes.
///
/// Recorded in the apply marker so that an interrupted apply can tell
/// whether the on-disk document is the one it meant to persist.
///
/// ```
/// use confkit::core::types::Fingerprint;
///
/// let a = Fingerprint::of(b"db:\n  port: 5432\n");
/// let b = Fingerprint::of(b"db:\n  port: 5432\n");
/// assert_eq!(a, b);
/// assert_ne!(a, Fingerprint::of(b"db: {}\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the given content.
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod variable_path {
        use super::*;

        #[test]
        fn splits_on_dots() {
            let path = VariablePath::parse("a.b.c").unwrap();
            assert_eq!(path.segments(), ["a", "b", "c"]);
            assert_eq!(path.depth(), 3);
        }

        #[test]
        fn single_segment() {
            let path = VariablePath::parse("name").unwrap();
            assert_eq!(path.leaf(), "name");
            assert!(path.parent().is_empty());
        }

        #[test]
        fn empty_rejected() {
            assert!(VariablePath::parse("").is_err());
        }

        #[test]
        fn empty_segments_rejected() {
            assert!(VariablePath::parse("a..b").is_err());
            assert!(VariablePath::parse(".a").is_err());
            assert!(VariablePath::parse("a.").is_err());
        }

        #[test]
        fn segments_are_opaque() {
            let path = VariablePath::parse("a b.c-d.e_f").unwrap();
            assert_eq!(path.segments(), ["a b", "c-d", "e_f"]);
        }

        #[test]
        fn from_segments_rejects_dotted_segment() {
            assert!(VariablePath::from_segments(["a", "b.c"]).is_err());
            assert!(VariablePath::from_segments(Vec::<String>::new()).is_err());
            let path = VariablePath::from_segments(["a", "b"]).unwrap();
            assert_eq!(path.to_string(), "a.b");
        }

        #[test]
        fn contains_prefix() {
            let db = VariablePath::parse("db").unwrap();
            let port = VariablePath::parse("db.port").unwrap();
            let other = VariablePath::parse("dbx.port").unwrap();
            assert!(db.contains(&port));
            assert!(db.contains(&db));
            assert!(!port.contains(&db));
            assert!(!db.contains(&other));
        }

        #[test]
        fn serde_roundtrip() {
            let path = VariablePath::parse("app.log.level").unwrap();
            let json = serde_json::to_string(&path).unwrap();
            assert_eq!(json, "\"app.log.level\"");
            let parsed: VariablePath = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, path);
        }
    }

    mod commit_id {
        use super::*;

        #[test]
        fn valid_id() {
            let id = CommitId::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
            assert_eq!(id.as_str(), "abc123def4567890abc123def4567890abc12345");
            assert_eq!(id.short(7), "abc123d");
        }

        #[test]
        fn invalid_ids_rejected() {
            assert!(CommitId::new("").is_err());
            assert!(CommitId::new("abc123").is_err());
            assert!(CommitId::new("g".repeat(40)).is_err());
        }
    }

    mod fingerprint {
        use super::*;

        #[test]
        fn deterministic() {
            assert_eq!(Fingerprint::of(b"x"), Fingerprint::of(b"x"));
            assert_eq!(Fingerprint::of(b"").as_str().len(), 64);
        }
    }
}
