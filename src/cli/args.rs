//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--dir <path>`: Configuration directory (env `CONFKIT_DIR`)
//! - `--seed <path>`: Seed document (env `CONFKIT_SEED`)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::builder::{PossibleValue, PossibleValuesParser};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::core::coerce::{TypeRegistry, DEFAULT_TYPE};

/// confkit - Versioned, hierarchical application configuration
#[derive(Parser, Debug)]
#[command(name = "ck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration directory (defaults to the current directory)
    #[arg(long, global = true, env = "CONFKIT_DIR")]
    pub dir: Option<PathBuf>,

    /// Seed document the configuration directory is derived from
    #[arg(long, global = true, env = "CONFKIT_SEED")]
    pub seed: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments, offering the types in `registry`
    /// as the choices for `set --type`.
    pub fn parse_args(registry: &TypeRegistry) -> Self {
        let matches = Self::command_for(registry).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    /// Like [`Cli::parse_args`], but from explicit arguments.
    pub fn try_parse_with<I, T>(registry: &TypeRegistry, args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command_for(registry).try_get_matches_from(args)?;
        Self::from_arg_matches(&matches)
    }

    /// The clap command with `set --type` restricted to `registry`.
    pub fn command_for(registry: &TypeRegistry) -> clap::Command {
        let choices: Vec<PossibleValue> = registry
            .names()
            .map(|name| PossibleValue::new(name.to_string()))
            .collect();
        Self::command().mut_subcommand("set", |set| {
            set.mut_arg("type_name", |arg| {
                arg.value_parser(PossibleValuesParser::new(choices))
            })
        })
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the configuration directory from the seed document
    #[command(
        name = "init",
        long_about = "Create the configuration directory from the seed document.\n\n\
            Copies the seed document to settings.yml, writes a .gitignore for the \
            generated and metadata directories, and puts the directory under git \
            with an initial commit. The seed path given with --seed is remembered \
            in the directory's metadata so later commands do not need it.",
        after_help = "\
WORKFLOW EXAMPLES:
    # First-time setup
    ck --dir /etc/myapp --seed /usr/share/myapp/default.yml init

    # Throw away every local change and start again from the seed
    ck init --reset"
    )]
    Init {
        /// Overwrite an initialised directory with the seed and commit the reset
        #[arg(long)]
        reset: bool,
    },

    /// Persist and commit the working configuration
    #[command(
        name = "apply",
        long_about = "Persist the current configuration and commit it.\n\n\
            Without drift from the seed document, apply does nothing unless --force \
            is given. If the commit fails, settings.yml is restored to what it was \
            before the call.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Commit local changes with the default message
    ck apply

    # Commit with a message of your own
    ck apply -m 'raise connection limit'

    # Commit even without drift, or recover an interrupted apply
    ck apply --force"
    )]
    Apply {
        /// Commit message (defaults to the configured apply message)
        #[arg(short, long)]
        message: Option<String>,

        /// Commit even without drift; recover from an interrupted apply
        #[arg(long)]
        force: bool,
    },

    /// Print the value of a setting
    #[command(
        name = "get",
        long_about = "Print the value of a setting addressed by a dot path.\n\n\
            Scalars are printed as-is, mappings and sequences as YAML. A setting \
            that does not exist prints nothing.",
        after_help = "\
WORKFLOW EXAMPLES:
    ck get db.port
    ck get db"
    )]
    Get {
        /// Dot-separated setting path, e.g. db.port
        setting: String,
    },

    /// Change the value of a setting
    #[command(
        name = "set",
        long_about = "Change the value of a setting addressed by a dot path.\n\n\
            Missing parent mappings are created. The value is converted to --type \
            first. The change is saved to settings.yml but not committed; run \
            apply to commit it.",
        after_help = "\
WORKFLOW EXAMPLES:
    ck set db.host db.internal
    ck set -t integer db.port 5433
    ck set -t list db.replicas 'a, b, c'
    ck apply -m 'move database'"
    )]
    Set {
        /// Type to convert the value to
        #[arg(
            short = 't',
            long = "type",
            value_name = "TYPE",
            default_value = DEFAULT_TYPE
        )]
        type_name: String,

        /// Allow changes while a previous apply is unfinished
        #[arg(long)]
        force: bool,

        /// Dot-separated setting path, e.g. db.port
        setting: String,

        /// New value
        value: String,
    },

    /// Show how the configuration differs from the seed document
    #[command(name = "diff")]
    Diff,

    /// Show the lifecycle state of the configuration directory
    #[command(name = "status")]
    Status,

    /// List the value types accepted by set
    #[command(name = "types")]
    Types,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
INSTALLATION:
    # Bash
    ck completion bash > /etc/bash_completion.d/ck

    # Zsh
    ck completion zsh > \"${fpath[1]}/_ck\"

    # Fish
    ck completion fish > ~/.config/fish/completions/ck.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Shells supported by `completion`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    use crate::core::coerce::TypedValue;

    fn with_port_type() -> TypeRegistry {
        let mut registry = TypeRegistry::default();
        registry.register("port", |raw| {
            let port: u16 = raw.parse().map_err(|_| "not a port".to_string())?;
            Ok(TypedValue::Integer(i64::from(port)))
        });
        registry
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
        Cli::command_for(&TypeRegistry::default()).debug_assert();
    }

    #[test]
    fn set_defaults_to_string() {
        let cli = Cli::try_parse_with(&TypeRegistry::default(), ["ck", "set", "db.host", "db.internal"])
            .unwrap();
        match cli.command {
            Command::Set {
                type_name,
                setting,
                value,
                force,
            } => {
                assert_eq!(type_name, "string");
                assert_eq!(setting, "db.host");
                assert_eq!(value, "db.internal");
                assert!(!force);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn set_rejects_unknown_type() {
        let err = Cli::try_parse_with(&TypeRegistry::default(), ["ck", "set", "-t", "uuid", "a", "b"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn set_offers_registered_types() {
        let registry = with_port_type();
        let cli = Cli::try_parse_with(&registry, ["ck", "set", "-t", "port", "db.port", "5433"])
            .unwrap();
        match cli.command {
            Command::Set { type_name, .. } => assert_eq!(type_name, "port"),
            other => panic!("unexpected {other:?}"),
        }

        // Without the registration the same type is refused.
        assert!(Cli::try_parse_with(
            &TypeRegistry::default(),
            ["ck", "set", "-t", "port", "db.port", "5433"]
        )
        .is_err());
    }

    #[test]
    fn set_help_lists_registered_types() {
        let mut cmd = Cli::command_for(&with_port_type());
        let set = cmd.find_subcommand_mut("set").unwrap();
        let help = set.render_help().to_string();
        assert!(help.contains("boolean, list, port"));
    }

    #[test]
    fn apply_message_is_optional() {
        let cli = Cli::try_parse_from(["ck", "apply", "--force"]).unwrap();
        match cli.command {
            Command::Apply { message, force } => {
                assert_eq!(message, None);
                assert!(force);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ck", "get", "db.port", "--dir", "/cfg", "-q"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/cfg")));
        assert!(cli.quiet);
    }
}
