//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$CONFKIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/confkit/config.toml`
//! 3. `~/.confkit/config.toml` (canonical write location)
//!
//! # Directory Config
//!
//! Located at `<dir>/.metadata/config.toml`.
//!
//! # Validation
//!
//! Values are validated after parsing; unknown keys are rejected while
//! parsing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [author]
/// name = "Ops Team"
/// email = "ops@example.com"
///
/// [apply]
/// message = "configuration update"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Identity recorded on configuration commits
    pub author: Option<AuthorConfig>,

    /// Apply defaults
    pub apply: Option<ApplyDefaults>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(author) = &self.author {
            author.validate()?;
        }
        if let Some(apply) = &self.apply {
            if apply.message.as_deref().is_some_and(|m| m.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "apply.message cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Commit author identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("name", &self.name), ("email", &self.email)] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "author.{} cannot be empty",
                        field
                    )));
                }
                if value.contains(['<', '>', '\n']) {
                    return Err(ConfigError::InvalidValue(format!(
                        "author.{} cannot contain '<', '>' or newlines",
                        field
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Defaults for `apply`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApplyDefaults {
    /// Commit message used when none is given
    pub message: Option<String>,
}

/// Configuration of one configuration directory.
///
/// # Example
///
/// ```toml
/// seed_file = "/usr/share/myapp/defaults.yml"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DirConfig {
    /// Seed document. Relative paths are resolved against the directory.
    pub seed_file: Option<PathBuf>,
}

impl DirConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(seed) = &self.seed_file {
            if seed.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "seed_file cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
