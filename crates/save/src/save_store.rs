// ---------------------------------------------------------------------------
// save_store – Named slot persistence with backup-on-write
// ---------------------------------------------------------------------------
//
// The store reads and writes opaque slot bytes; it never interprets the
// payload. Each slot `<name>` occupies `<name>.sav` plus a `<name>.bak`
// holding the previous content, refreshed before every overwrite. A failed
// write restores the `.bak` so the slot is never left half-written. Falling
// back to `.bak` on a corrupt primary is the coordinator's decision, not
// the store's.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::atomic_write::atomic_write;
use crate::save_error::SaveError;

pub const SLOT_EXTENSION: &str = "sav";
pub const BAK_EXTENSION: &str = "bak";

/// Directory-scoped slot store.
#[derive(Debug, Clone)]
pub struct SaveStore {
    root: PathBuf,
}

impl SaveStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SaveError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write slot bytes: refresh `.bak` from the current content, then
    /// atomically replace the slot file. Transient write failures are
    /// retried once; on repeated failure the previous content is restored
    /// from `.bak` before the error is surfaced.
    pub fn save(&self, slot: &str, bytes: &[u8]) -> Result<(), SaveError> {
        let path = self.slot_path(slot)?;
        let bak = self.bak_path(slot)?;

        if path.exists() {
            fs::copy(&path, &bak)?;
        }

        if let Err(first) = atomic_write(&path, bytes) {
            warn!(slot, error = %first, "slot write failed, retrying once");
            if let Err(second) = atomic_write(&path, bytes) {
                if bak.exists() {
                    if let Err(restore) = fs::copy(&bak, &path) {
                        warn!(slot, error = %restore, "failed to restore slot from .bak");
                    }
                }
                return Err(SaveError::Io(second));
            }
        }
        debug!(slot, bytes = bytes.len(), "slot written");
        Ok(())
    }

    /// Read slot bytes.
    ///
    /// # Errors
    ///
    /// `SaveError::SlotNotFound` when the slot file does not exist.
    pub fn load(&self, slot: &str) -> Result<Vec<u8>, SaveError> {
        let path = self.slot_path(slot)?;
        if !path.exists() {
            return Err(SaveError::SlotNotFound(slot.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Read the previous content of a slot (`<name>.bak`).
    ///
    /// # Errors
    ///
    /// `SaveError::SlotNotFound` when no `.bak` exists.
    pub fn load_bak(&self, slot: &str) -> Result<Vec<u8>, SaveError> {
        let bak = self.bak_path(slot)?;
        if !bak.exists() {
            return Err(SaveError::SlotNotFound(format!("{slot} (.bak)")));
        }
        Ok(fs::read(bak)?)
    }

    pub fn exists(&self, slot: &str) -> bool {
        self.slot_path(slot).map(|p| p.exists()).unwrap_or(false)
    }

    /// Names of all slots in the store, sorted.
    pub fn list_slots(&self) -> Result<Vec<String>, SaveError> {
        let mut slots = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SLOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                slots.push(stem.to_string());
            }
        }
        slots.sort();
        Ok(slots)
    }

    /// Delete a slot and its `.bak`. Deleting a missing slot is not an
    /// error.
    pub fn delete_slot(&self, slot: &str) -> Result<(), SaveError> {
        let path = self.slot_path(slot)?;
        let bak = self.bak_path(slot)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        if bak.exists() {
            fs::remove_file(bak)?;
        }
        Ok(())
    }

    /// Remove `.tmp` leftovers from writes interrupted by a crash. The
    /// rename in `atomic_write` means a surviving `.tmp` was never
    /// promoted, so it is safe to discard.
    pub fn clean_stale_tmp(&self) -> Result<usize, SaveError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                warn!(path = %path.display(), "removing stale temp file");
                fs::remove_file(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn slot_path(&self, slot: &str) -> Result<PathBuf, SaveError> {
        validate_slot_name(slot)?;
        Ok(self.root.join(format!("{slot}.{SLOT_EXTENSION}")))
    }

    fn bak_path(&self, slot: &str) -> Result<PathBuf, SaveError> {
        validate_slot_name(slot)?;
        Ok(self.root.join(format!("{slot}.{BAK_EXTENSION}")))
    }
}

/// Slot names become file names, so path separators and traversal are
/// rejected outright.
fn validate_slot_name(slot: &str) -> Result<(), SaveError> {
    let ok = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(SaveError::Decode(format!("invalid slot name '{slot}'")))
    }
}
