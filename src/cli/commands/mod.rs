//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT touch the configuration directory directly; every
//! mutation goes through [`ConfigurationManager`].

mod apply;
mod completion;
mod diff;
mod get;
mod init;
mod set;
mod status;
mod types;

pub use apply::apply;
pub use completion::completion;
pub use diff::diff;
pub use get::get;
pub use init::init;
pub use set::set;
pub use status::status;
pub use types::types;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};

use super::args::Command;
use crate::core::config::Config;
use crate::core::paths::ConfigPaths;
use crate::engine::{ConfigurationManager, Context};
use crate::git::{Author, GitBackend};
use crate::ui::output::Verbosity;

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The primary action succeeded but a post hook or cleanup failed.
    Degraded,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Degraded => ExitCode::from(3),
        }
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<Outcome> {
    match command {
        Command::Init { reset } => init(ctx, reset),
        Command::Apply { message, force } => apply(ctx, message.as_deref(), force),
        Command::Get { setting } => get(ctx, &setting),
        Command::Set {
            type_name,
            force,
            setting,
            value,
        } => set(ctx, &setting, &value, &type_name, force),
        Command::Diff => diff(ctx),
        Command::Status => status(ctx),
        Command::Types => types(ctx),
        Command::Completion { shell } => completion(ctx, shell),
    }
}

/// A manager for the directory selected by the context, plus the tool
/// configuration it was built from.
pub(crate) struct Session {
    pub manager: ConfigurationManager,
    pub config: Config,
    pub verbosity: Verbosity,
}

impl Session {
    /// Resolve directory, seed and config from the context.
    ///
    /// With `needs_seed`, fails early when no seed document is known.
    pub fn open(ctx: &Context, needs_seed: bool) -> Result<Self> {
        let dir = match &ctx.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let paths = ConfigPaths::new(&dir);
        let config = Config::load(Some(&paths)).context("Failed to load configuration")?;

        let seed = match ctx.seed.clone().or_else(|| config.seed_file()) {
            Some(seed) => seed,
            None if needs_seed => {
                bail!("No seed document configured. Pass --seed or set CONFKIT_SEED.")
            }
            None => PathBuf::new(),
        };

        let vcs = GitBackend::new(Author::new(config.author_name(), config.author_email()));
        Ok(Self {
            manager: ConfigurationManager::new(dir, seed, vcs)
                .with_registry(ctx.registry.clone()),
            config,
            verbosity: Verbosity::from_flags(ctx.quiet, ctx.debug),
        })
    }
}
