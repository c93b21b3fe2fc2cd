//! cli::commands::get
//!
//! Print the value of a setting.
//!
//! # Design
//!
//! The value is written to stdout even in quiet mode, since it is the
//! command's result. A setting that does not resolve prints nothing and
//! still succeeds, so scripts can test for emptiness.
//!
//! # Example
//!
//! ```bash
//! port=$(ck get db.port)
//! ```

use super::{Outcome, Session};
use crate::core::types::VariablePath;
use crate::engine::Context;
use crate::ui::output::format_value;
use anyhow::{Context as _, Result};

/// Print the value at `setting`.
pub fn get(ctx: &Context, setting: &str) -> Result<Outcome> {
    let path = VariablePath::parse(setting)?;
    let mut session = Session::open(ctx, false)?;

    if let Some(value) = session.manager.get_variable(&path)? {
        let text = format_value(&value).context("Failed to format value")?;
        println!("{}", text);
    }
    Ok(Outcome::Success)
}
