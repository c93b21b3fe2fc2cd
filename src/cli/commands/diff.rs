//! diff command - Show drift from the seed document

use super::{Outcome, Session};
use crate::core::drift::DEFAULT_CONTEXT;
use crate::engine::Context;
use crate::ui::output;
use anyhow::Result;

/// Print a unified diff from the seed document to the current document.
pub fn diff(ctx: &Context) -> Result<Outcome> {
    let mut session = Session::open(ctx, true)?;
    let changes = session.manager.diff()?;

    if changes.is_empty() {
        output::print("No differences from the seed document", session.verbosity);
    } else {
        print!("{}", changes.unified("default", "current", DEFAULT_CONTEXT));
    }
    Ok(Outcome::Success)
}
