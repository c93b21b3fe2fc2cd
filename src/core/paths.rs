//! core::paths
//!
//! Centralized path routing for a configuration directory.
//!
//! # Layout
//!
//! - `settings.yml` - The current (operator-owned) document
//! - `.generated/` - Rendered artifacts, not version controlled
//! - `.metadata/config.toml` - Directory configuration
//! - `.metadata/lock` - Exclusive lock file
//! - `.metadata/apply.json` - In-flight apply marker
//! - `.metadata/` also stages temp files for atomic writes
//! - `.gitignore` - Keeps `.generated` and `.metadata` out of history
//!
//! **Hard rule:** no code outside this module joins these names onto a
//! directory by hand.
//!
//! # Example
//!
//! ```
//! use confkit::core::paths::ConfigPaths;
//! use std::path::PathBuf;
//!
//! let paths = ConfigPaths::new("/etc/myapp");
//! assert_eq!(paths.current_document(), PathBuf::from("/etc/myapp/settings.yml"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/etc/myapp/.metadata/lock"));
//! ```

use std::path::{Path, PathBuf};

/// File name of the current document.
pub const CURRENT_DOCUMENT: &str = "settings.yml";

/// Patterns written to `.gitignore` at init.
pub const IGNORE_PATTERNS: [&str; 2] = [".generated*", ".metadata*"];

const GENERATED_DIR: &str = ".generated";
const METADATA_DIR: &str = ".metadata";

/// Paths inside one configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The configuration directory itself.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The current document.
    pub fn current_document(&self) -> PathBuf {
        self.dir.join(CURRENT_DOCUMENT)
    }

    /// Directory for rendered artifacts.
    pub fn generated_dir(&self) -> PathBuf {
        self.dir.join(GENERATED_DIR)
    }

    /// Directory for tool metadata.
    pub fn metadata_dir(&self) -> PathBuf {
        self.dir.join(METADATA_DIR)
    }

    /// Directory-scoped configuration file.
    pub fn dir_config_path(&self) -> PathBuf {
        self.metadata_dir().join("config.toml")
    }

    /// Lock file for mutating operations.
    pub fn lock_path(&self) -> PathBuf {
        self.metadata_dir().join("lock")
    }

    /// Where atomic writes of versioned files stage their temp files.
    pub fn staging_dir(&self) -> PathBuf {
        self.metadata_dir()
    }

    /// Marker recording an apply in flight.
    pub fn apply_marker_path(&self) -> PathBuf {
        self.metadata_dir().join("apply.json")
    }

    pub fn gitignore_path(&self) -> PathBuf {
        self.dir.join(".gitignore")
    }

    /// Content of the `.gitignore` written at init.
    pub fn gitignore_content() -> String {
        let mut content = IGNORE_PATTERNS.join("\n");
        content.push('\n');
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_lives_under_dot_metadata() {
        let paths = ConfigPaths::new("/cfg");
        assert_eq!(paths.metadata_dir(), PathBuf::from("/cfg/.metadata"));
        assert_eq!(
            paths.dir_config_path(),
            PathBuf::from("/cfg/.metadata/config.toml")
        );
        assert_eq!(
            paths.apply_marker_path(),
            PathBuf::from("/cfg/.metadata/apply.json")
        );
    }

    #[test]
    fn ignored_directories_match_patterns() {
        let paths = ConfigPaths::new("/cfg");
        for dir in [paths.generated_dir(), paths.metadata_dir()] {
            let name = dir.file_name().unwrap().to_str().unwrap();
            assert!(IGNORE_PATTERNS
                .iter()
                .any(|p| name.starts_with(p.trim_end_matches('*'))));
        }
        assert_eq!(ConfigPaths::gitignore_content(), ".generated*\n.metadata*\n");
    }
}
