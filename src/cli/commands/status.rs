//! status command - Show the lifecycle state of the configuration directory

use super::{Outcome, Session};
use crate::core::state::LifecycleState;
use crate::engine::Context;
use crate::ui::output;
use anyhow::Result;

/// Print directory, seed, state and drift.
pub fn status(ctx: &Context) -> Result<Outcome> {
    let mut session = Session::open(ctx, false)?;
    let state = session.manager.state()?;

    // Status is the answer here, so it ignores quiet mode.
    println!("directory: {}", session.manager.paths().dir().display());
    let seed = session.manager.seed_path();
    if !seed.as_os_str().is_empty() {
        println!("seed:      {}", seed.display());
    }
    println!("state:     {}", state);

    if state.is_initialised() && !seed.as_os_str().is_empty() {
        let changes = session.manager.diff()?;
        if changes.is_empty() {
            println!("drift:     none");
        } else {
            println!("drift:     {}", output::format_change_summary(&changes));
        }
    }

    match state {
        LifecycleState::NoDirectory | LifecycleState::Uninitialised => {
            output::print("\nRun `ck init` to create the configuration.", session.verbosity)
        }
        LifecycleState::Unversioned => output::print(
            "\nRun `ck init --reset` to replace the existing document with the seed.",
            session.verbosity,
        ),
        LifecycleState::Applying | LifecycleState::Failed => output::warn(
            "a previous apply did not finish; run `ck apply --force` to recover",
            session.verbosity,
        ),
        LifecycleState::Unmodified | LifecycleState::Modified => {}
    }
    Ok(Outcome::Success)
}
