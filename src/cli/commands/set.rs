//! set command - Change the value of a setting

use super::{Outcome, Session};
use crate::core::types::VariablePath;
use crate::engine::Context;
use crate::ui::output;
use anyhow::Result;

/// Assign `value`, converted to `type_name`, at `setting` and save it.
///
/// The change is written to the current document but not committed.
pub fn set(
    ctx: &Context,
    setting: &str,
    value: &str,
    type_name: &str,
    force: bool,
) -> Result<Outcome> {
    let path = VariablePath::parse(setting)?;
    let mut session = Session::open(ctx, false)?;

    let typed = session
        .manager
        .set_variable(&path, value, type_name, force)?;
    session.manager.save_current(force)?;

    output::print(format!("{} = {}", path, typed), session.verbosity);
    Ok(Outcome::Success)
}
