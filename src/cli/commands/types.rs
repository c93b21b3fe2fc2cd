//! types command - List the value types accepted by `set`

use super::Outcome;
use crate::core::coerce::{TypeRegistry, DEFAULT_TYPE};
use crate::engine::Context;
use anyhow::Result;

/// Print one registered type name per line, marking the default.
pub fn types(ctx: &Context) -> Result<Outcome> {
    for line in type_lines(&ctx.registry, ctx.quiet) {
        println!("{}", line);
    }
    Ok(Outcome::Success)
}

fn type_lines(registry: &TypeRegistry, quiet: bool) -> Vec<String> {
    registry
        .names()
        .map(|name| {
            if name == DEFAULT_TYPE && !quiet {
                format!("{} (default)", name)
            } else {
                name.to_string()
            }
        })
        .collect()
}
