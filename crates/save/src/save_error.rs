// ---------------------------------------------------------------------------
// SaveError: typed errors for the persistence core
// ---------------------------------------------------------------------------

use std::fmt;

/// Errors that can occur during save/load/backup operations.
///
/// Integrity and format errors are never swallowed at the store, codec, or
/// backup layers; they propagate to the coordinator, which decides the
/// user-facing behavior (fall back to `.bak`, then to backup history, then
/// report "no save found").
#[derive(Debug)]
pub enum SaveError {
    /// I/O error (file not found, permission denied, disk full, etc.)
    Io(std::io::Error),
    /// JSON encoding failed.
    Encode(String),
    /// JSON decoding failed (corrupt or invalid save data).
    Decode(String),
    /// Save file format version is newer than this build supports.
    /// Never migrated, never guessed.
    VersionMismatch { expected_max: u32, found: u32 },
    /// Save migration failed for a reason other than version mismatch.
    MigrationFailed(String),
    /// Checksum or signature mismatch, or a missing password for an
    /// encrypted payload. Fails closed: the wrapped payload is never
    /// deserialized.
    SecurityViolation(String),
    /// Encryption or decryption failed. Wrong password and corrupted
    /// ciphertext are indistinguishable by design.
    Crypto(String),
    /// Structural validation failed at a security level that treats
    /// validation errors as fatal.
    Validation(Vec<String>),
    /// The named save slot does not exist. Represents "nothing to load",
    /// not corruption.
    SlotNotFound(String),
    /// The named backup does not exist in the backup index.
    BackupNotFound(String),
    /// A coordinator operation requires a loaded save and none is active.
    NoActiveSave,
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "I/O error: {e}"),
            SaveError::Encode(msg) => write!(f, "Encoding error: {msg}"),
            SaveError::Decode(msg) => write!(f, "Decoding error: {msg}"),
            SaveError::VersionMismatch {
                expected_max,
                found,
            } => write!(
                f,
                "Version mismatch: save is v{found}, but this build only supports up to v{expected_max}"
            ),
            SaveError::MigrationFailed(msg) => write!(f, "Migration failed: {msg}"),
            SaveError::SecurityViolation(msg) => write!(f, "Security violation: {msg}"),
            SaveError::Crypto(msg) => write!(f, "Crypto error: {msg}"),
            SaveError::Validation(errors) => {
                write!(f, "Validation failed with {} error(s): ", errors.len())?;
                let mut first = true;
                for e in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{e}")?;
                    first = false;
                }
                Ok(())
            }
            SaveError::SlotNotFound(name) => write!(f, "Save slot not found: {name}"),
            SaveError::BackupNotFound(id) => write!(f, "Backup not found: {id}"),
            SaveError::NoActiveSave => write!(f, "No save is loaded in memory"),
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Decode(e.to_string())
    }
}
