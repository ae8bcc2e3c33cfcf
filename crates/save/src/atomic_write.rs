//! Atomic file write using the write-rename pattern.
//!
//! Writes data to a temporary file (`{path}.tmp`), calls `sync_all()` to
//! ensure bytes are flushed to persistent storage, then atomically renames
//! the temp file to the final path.  This guarantees that a crash during
//! write cannot corrupt the existing slot file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temp-file path for an atomic write of `path`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Atomically writes `data` to `path` using the write-rename pattern.
///
/// 1. Write to `{path}.tmp`
/// 2. `sync_all()` to flush to disk
/// 3. `rename` temp to final path (atomic on POSIX; near-atomic on Windows)
///
/// If the process crashes during step 1 or 2, the original file at `path`
/// remains untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = tmp_path_for(path);

    // Ensure parent directory exists.
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Step 1: Write to temporary file.
    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;

    // Step 2: Flush to persistent storage.
    file.sync_all()?;

    // Step 3: Atomically rename temp file to final path.
    fs::rename(&tmp_path, path)?;

    Ok(())
}
