//! Architecture enforcement tests.
//!
//! The layering rules in `lib.rs` are easy to erode one import at a time.
//! These tests read the source tree and fail on violations so they are
//! caught in CI rather than in review.
//!
//! # Rules
//!
//! 1. **Git doorway** - only `src/git/` may use `git2`
//! 2. **Thin CLI** - command handlers never write files themselves
//! 3. **Explicit logging** - only the CLI installs a log subscriber
//! 4. **No panics** - library code outside tests does not `unwrap`/`expect`

use std::fs;
use std::path::{Path, PathBuf};

/// Every `.rs` file under `dir`, recursively.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).expect("Failed to read source directory") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
            files.push(path);
        }
    }
    files
}

/// The part of a file before its unit tests, without comment lines.
fn production_code(path: &Path) -> String {
    let content =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read {}", path.display()));
    let body = match content.find("#[cfg(test)]\nmod tests") {
        Some(idx) => &content[..idx],
        None => &content[..],
    };
    body.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn assert_no_violations(violations: Vec<String>) {
    assert!(
        violations.is_empty(),
        "Architecture violations found:\n  {}",
        violations.join("\n  ")
    );
}

// =============================================================================
// Git Doorway
// =============================================================================

#[test]
fn only_git_module_uses_git2() {
    let mut violations = Vec::new();
    for path in rust_files(Path::new("src")) {
        if path.starts_with("src/git") {
            continue;
        }
        if production_code(&path).contains("git2::") {
            violations.push(format!(
                "{}: uses git2 directly - go through crate::git",
                path.display()
            ));
        }
    }
    assert_no_violations(violations);
}

// =============================================================================
// Thin CLI
// =============================================================================

#[test]
fn commands_do_not_write_files() {
    let mut violations = Vec::new();
    for path in rust_files(Path::new("src/cli/commands")) {
        let code = production_code(&path);
        for pattern in ["fs::write", "write_atomic", "File::create", "remove_file"] {
            if code.contains(pattern) {
                violations.push(format!(
                    "{}: calls {} - mutations belong to the engine",
                    path.display(),
                    pattern
                ));
            }
        }
    }
    assert_no_violations(violations);
}

// =============================================================================
// Explicit Logging
// =============================================================================

#[test]
fn only_cli_installs_a_subscriber() {
    let mut violations = Vec::new();
    for path in rust_files(Path::new("src")) {
        if path == Path::new("src/cli/mod.rs") {
            continue;
        }
        if production_code(&path).contains("tracing_subscriber") {
            violations.push(format!(
                "{}: touches tracing_subscriber - only the CLI initialises logging",
                path.display()
            ));
        }
    }
    assert_no_violations(violations);
}

// =============================================================================
// No Panics
// =============================================================================

#[test]
fn library_code_does_not_unwrap() {
    let mut violations = Vec::new();
    for path in rust_files(Path::new("src")) {
        let code = production_code(&path);
        for (n, line) in code.lines().enumerate() {
            if line.contains(".unwrap()") || line.contains(".expect(") {
                violations.push(format!("{}:{}: {}", path.display(), n + 1, line.trim()));
            }
        }
    }
    assert_no_violations(violations);
}
