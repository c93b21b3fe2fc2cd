//! apply command - Persist and commit the working configuration

use super::{Outcome, Session};
use crate::engine::{ApplyOutcome, Context};
use crate::ui::output;
use anyhow::Result;

/// Apply the configuration.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `message` - Commit message; the configured default when `None`
/// * `force` - Commit without drift, or recover an interrupted apply
pub fn apply(ctx: &Context, message: Option<&str>, force: bool) -> Result<Outcome> {
    let mut session = Session::open(ctx, true)?;
    let message = message
        .unwrap_or_else(|| session.config.apply_message())
        .to_string();

    let record = session.manager.apply(&message, force)?;
    let verbosity = session.verbosity;

    match &record.outcome {
        ApplyOutcome::Committed(id) => {
            output::print(format!("Committed {}: {}", id.short(7), message), verbosity);
            if !record.variables.is_empty() {
                output::print(output::format_list(&record.variables, "  "), verbosity);
            }
        }
        ApplyOutcome::NothingToCommit => output::print("Nothing to commit", verbosity),
        ApplyOutcome::NoDrift => output::print("No changes to apply", verbosity),
    }

    for warning in &record.warnings {
        output::warn(warning, verbosity);
    }
    if let Some(failure) = &record.post_hook {
        output::warn(failure, verbosity);
    }
    Ok(if record.is_degraded() {
        Outcome::Degraded
    } else {
        Outcome::Success
    })
}
