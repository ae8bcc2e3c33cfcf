// ---------------------------------------------------------------------------
// security – Security policy levels and canonical payload bytes
// ---------------------------------------------------------------------------
//
// The level decides, for every component downstream, whether signatures and
// validation failures are fatal or advisory and whether encryption applies.
// The sealing/verification pipeline itself lives in save_codec.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::save_error::SaveError;

/// Security policy tier.
///
/// Controls whether a signature mismatch or validation failure is fatal or
/// advisory, and whether encryption is applied.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Checksum only.
    Basic,
    /// Checksum + signature + advisory validation. The default.
    Standard,
    /// Checksum + signature + encryption (when a password is configured);
    /// signature mismatches and validation failures are fatal.
    High,
    /// All of the above, plus unknown save fields are validation errors.
    Paranoid,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Standard
    }
}

impl SecurityLevel {
    /// Whether payloads are signed at this level.
    pub fn signs(self) -> bool {
        self >= SecurityLevel::Standard
    }

    /// Whether payloads are encrypted at this level (requires a password).
    pub fn encrypts(self) -> bool {
        self >= SecurityLevel::High
    }

    /// Whether a signature mismatch or validation failure aborts a load.
    pub fn strict(self) -> bool {
        self >= SecurityLevel::High
    }

    /// Whether unknown fields in the save structure are validation errors
    /// rather than preserved-but-ignored.
    pub fn rejects_unknown_fields(self) -> bool {
        self == SecurityLevel::Paranoid
    }
}

/// Canonical JSON bytes of a payload value. `serde_json`'s map type keeps
/// keys sorted, so this is stable across semantically-equal values.
/// Checksums and signatures are always computed over these bytes.
pub fn canonical_bytes(payload: &Value) -> Result<Vec<u8>, SaveError> {
    serde_json::to_vec(payload).map_err(|e| SaveError::Encode(e.to_string()))
}
