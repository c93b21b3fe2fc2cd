//! core::ops::atomic
//!
//! Whole-file replacement that readers never observe half-written.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replace `path` with `content`.
///
/// Writes a sibling temp file, syncs it, then renames it over `path`. The
/// parent directory must already exist. On failure the temp file is
/// removed and `path` keeps its previous content.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    replace(path, content, parent)
}

/// Like [`write_atomic`], but stage the temp file in `staging`.
///
/// Keeps half-written files out of a versioned directory even if the
/// process dies between write and rename. `staging` is created if missing
/// and must be on the same filesystem as `path`.
pub fn write_atomic_via(path: &Path, content: &[u8], staging: &Path) -> io::Result<()> {
    fs::create_dir_all(staging)?;
    replace(path, content, staging)
}

fn replace(path: &Path, content: &[u8], temp_dir: &Path) -> io::Result<()> {
    let temp = temp_path(path, temp_dir)?;
    let result = (|| {
        let mut file = File::create(&temp)?;
        file.write_all(content)?;
        file.sync_all()?;
        // Keep the mode of the file being replaced.
        if let Ok(existing) = fs::metadata(path) {
            fs::set_permissions(&temp, existing.permissions())?;
        }
        fs::rename(&temp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn temp_path(path: &Path, temp_dir: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' has no file name", path.display()),
        )
    })?;
    let mut temp = name.to_os_string();
    temp.push(format!(".tmp-{}", std::process::id()));
    Ok(temp_dir.join(temp))
}
