//! core::config
//!
//! Configuration of the tool itself (not the managed documents).
//!
//! # Overview
//!
//! confkit has two configuration scopes:
//! - **Global**: user-level settings (commit author, default apply message)
//! - **Directory**: per configuration directory (seed document location)
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Directory config file
//! 4. CLI flags and environment (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$CONFKIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/confkit/config.toml`
//! 3. `~/.confkit/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use confkit::core::config::Config;
//! use confkit::core::paths::ConfigPaths;
//!
//! let paths = ConfigPaths::new("/etc/myapp");
//! let config = Config::load(Some(&paths)).unwrap();
//! println!("author: {} <{}>", config.author_name(), config.author_email());
//! ```

pub mod schema;

pub use schema::{ApplyDefaults, AuthorConfig, DirConfig, GlobalConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::core::ops::write_atomic;
use crate::core::paths::ConfigPaths;

/// Commit author name when none is configured.
pub const DEFAULT_AUTHOR_NAME: &str = "confkit";

/// Commit author email when none is configured.
pub const DEFAULT_AUTHOR_EMAIL: &str = "root@localhost";

/// Apply commit message when none is given or configured.
pub const DEFAULT_APPLY_MESSAGE: &str = "[autocommit] due to 'configure apply'";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", path.display())]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{}': {source}", path.display())]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub dir: Option<DirConfig>,
    global_path: Option<PathBuf>,
    dir_root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// Missing files are not an error; defaults are used.
    pub fn load(paths: Option<&ConfigPaths>) -> Result<Self, ConfigError> {
        Self::load_from(&Self::global_candidates(), paths)
    }

    /// Load with an explicit list of global config candidates.
    pub fn load_from(
        global_candidates: &[PathBuf],
        paths: Option<&ConfigPaths>,
    ) -> Result<Self, ConfigError> {
        let (global, global_path) = match global_candidates.iter().find(|p| p.exists()) {
            Some(path) => (read_toml::<GlobalConfig>(path)?, Some(path.clone())),
            None => (GlobalConfig::default(), None),
        };
        global.validate()?;

        let dir = match paths {
            Some(paths) if paths.dir_config_path().exists() => {
                let config = read_toml::<DirConfig>(&paths.dir_config_path())?;
                config.validate()?;
                Some(config)
            }
            _ => None,
        };

        debug!(
            global = ?global_path,
            dir = dir.is_some(),
            "loaded configuration"
        );

        Ok(Config {
            global,
            dir,
            global_path,
            dir_root: paths.map(|p| p.dir().to_path_buf()),
        })
    }

    /// Global config locations in precedence order.
    pub fn global_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var("CONFKIT_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("confkit/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".confkit/config.toml"));
        }
        candidates
    }

    /// Canonical path for global config: `~/.confkit/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".confkit/config.toml"))
    }

    /// Write global config atomically to the canonical location.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        write_toml(&path, config)?;
        Ok(path)
    }

    /// Write directory config atomically.
    pub fn write_dir(paths: &ConfigPaths, config: &DirConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths.dir_config_path();
        write_toml(&path, config)?;
        Ok(path)
    }

    pub fn author_name(&self) -> &str {
        self.global
            .author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or(DEFAULT_AUTHOR_NAME)
    }

    pub fn author_email(&self) -> &str {
        self.global
            .author
            .as_ref()
            .and_then(|a| a.email.as_deref())
            .unwrap_or(DEFAULT_AUTHOR_EMAIL)
    }

    /// Message for `apply` when the caller gives none.
    pub fn apply_message(&self) -> &str {
        self.global
            .apply
            .as_ref()
            .and_then(|a| a.message.as_deref())
            .unwrap_or(DEFAULT_APPLY_MESSAGE)
    }

    /// Seed document from the directory config, resolved against the
    /// directory when relative.
    pub fn seed_file(&self) -> Option<PathBuf> {
        let seed = self.dir.as_ref()?.seed_file.as_ref()?;
        match &self.dir_root {
            Some(root) if seed.is_relative() => Some(root.join(seed)),
            _ => Some(seed.clone()),
        }
    }

    /// Path the global config was loaded from, if any.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_toml<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    write_atomic(path, contents.as_bytes()).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
