//! init command - Create a configuration directory from the seed document

use super::{Outcome, Session};
use crate::core::config::{Config, DirConfig};
use crate::engine::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Initialize the configuration directory.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `reset` - Overwrite an initialised directory with the seed
pub fn init(ctx: &Context, reset: bool) -> Result<Outcome> {
    let mut session = Session::open(ctx, true)?;
    let record = session.manager.init(reset)?;

    // Remember an explicitly given seed so later commands can find it.
    if let Some(seed) = &ctx.seed {
        let seed = std::fs::canonicalize(seed)
            .with_context(|| format!("Failed to resolve seed path {}", seed.display()))?;
        let config = DirConfig {
            seed_file: Some(seed),
        };
        Config::write_dir(session.manager.paths(), &config)
            .context("Failed to record seed document")?;
    }

    let dir = session.manager.paths().dir().display().to_string();
    let verb = if reset { "Reset" } else { "Initialised" };
    match &record.commit {
        Some(id) => output::print(
            format!("{} {} ({})", verb, dir, id.short(7)),
            session.verbosity,
        ),
        None => output::print(format!("{} {} (no changes)", verb, dir), session.verbosity),
    }

    Ok(match &record.post_hook {
        Some(failure) => {
            output::warn(failure, session.verbosity);
            Outcome::Degraded
        }
        None => Outcome::Success,
    })
}
