//! cli
//!
//! Command-line interface layer for confkit.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the process-wide log subscriber
//! - Delegate to command handlers
//! - Translate results into exit codes
//!
//! # Exit codes
//!
//! | code | meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | success                                        |
//! | 1    | failure                                        |
//! | 3    | success, but a post hook or cleanup failed     |
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. All configuration state changes flow
//! through the engine.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};
pub use commands::Outcome;

use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::core::coerce::TypeRegistry;
use crate::engine;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    run_with(TypeRegistry::default())
}

/// Run the CLI with the value types of `registry`.
///
/// Embedding applications use this to make their own types available to
/// `set --type`, `types` and shell completion.
pub fn run_with(registry: TypeRegistry) -> Result<ExitCode> {
    let cli = Cli::parse_args(&registry);
    init_logging(cli.debug, cli.quiet);

    let ctx = engine::Context {
        dir: cli.dir.clone(),
        seed: cli.seed.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        registry,
    };

    let outcome = commands::dispatch(cli.command, &ctx)?;
    Ok(outcome.exit_code())
}

/// Install the log subscriber. `RUST_LOG` wins over the flags.
///
/// Logs go to stderr so command output on stdout stays parseable.
fn init_logging(debug: bool, quiet: bool) {
    let default = if debug {
        "confkit=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}
