//! completion command - Generate shell completion scripts

use super::Outcome;
use crate::cli::args::{Cli, Shell};
use crate::engine::Context;
use anyhow::Result;
use clap_complete::{generate, shells};

/// Generate shell completion scripts.
pub fn completion(ctx: &Context, shell: Shell) -> Result<Outcome> {
    let mut cmd = Cli::command_for(&ctx.registry);
    let name = cmd.get_name().to_string();
    let mut out = std::io::stdout();

    match shell {
        Shell::Bash => generate(shells::Bash, &mut cmd, &name, &mut out),
        Shell::Zsh => generate(shells::Zsh, &mut cmd, &name, &mut out),
        Shell::Fish => generate(shells::Fish, &mut cmd, &name, &mut out),
        Shell::PowerShell => generate(shells::PowerShell, &mut cmd, &name, &mut out),
    }

    Ok(Outcome::Success)
}
