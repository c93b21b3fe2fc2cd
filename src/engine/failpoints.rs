//! engine::failpoints
//!
//! Named points where tests can force an operation to fail.
//!
//! # Usage
//!
//! ```ignore
//! use confkit::engine::failpoints;
//!
//! failpoints::fail_at(failpoints::GIT_COMMIT, "disk full");
//! let result = manager.apply("msg", false);
//! failpoints::clear();
//! ```
//!
//! # Scope
//!
//! Armed points are thread-local, so parallel tests do not see each
//! other's failures. Only compiled for tests or with the `fault_injection`
//! feature.

use std::cell::RefCell;
use std::collections::HashMap;

/// Recording the commit object.
pub const GIT_COMMIT: &str = "git.commit";

/// Writing the index file after a commit was recorded.
pub const WRITE_INDEX: &str = "git.index";

/// Removing the apply marker after a successful commit.
pub const CLEAR_MARKER: &str = "apply.clear_marker";

/// Replacing the current document during apply.
pub const PERSIST_DOCUMENT: &str = "apply.persist";

/// Putting the pre-apply document back after a failed commit.
pub const RESTORE_DOCUMENT: &str = "rollback.restore";

thread_local! {
    static ARMED: RefCell<HashMap<&'static str, String>> = RefCell::new(HashMap::new());
}

/// Make every later [`check`] of `point` on this thread fail with `message`.
pub fn fail_at(point: &'static str, message: impl Into<String>) {
    let message = message.into();
    ARMED.with(|armed| {
        armed.borrow_mut().insert(point, message);
    });
}

/// Disarm `point` only.
pub fn disarm(point: &str) {
    ARMED.with(|armed| {
        armed.borrow_mut().remove(point);
    });
}

/// Disarm every point on this thread.
pub fn clear() {
    ARMED.with(|armed| armed.borrow_mut().clear());
}

pub fn is_armed(point: &str) -> bool {
    ARMED.with(|armed| armed.borrow().contains_key(point))
}

/// `Err(message)` if `point` is armed.
pub fn check(point: &str) -> Result<(), String> {
    ARMED.with(|armed| match armed.borrow().get(point) {
        Some(message) => Err(message.clone()),
        None => Ok(()),
    })
}
