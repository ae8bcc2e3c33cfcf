// ---------------------------------------------------------------------------
// save_codec – Slot document encoding: JSON + gzip + integrity + crypto
// ---------------------------------------------------------------------------
//
// On-disk slot layout (after gunzip):
//
//   {
//     "metadata": { version, game_version, created_at, modified_at,
//                   player_name, floor, playtime_seconds,
//                   checksum, signature, security_level,
//                   encrypted, salt?, nonce? },
//     "game_state": { ... } | { "encrypted": "<base64>" }
//   }
//
// The checksum and signature cover the canonical (sorted-key) JSON bytes of
// the game state, computed before encryption and verified after decryption.
// Metadata summarizes the save so slot listings never decrypt or migrate.
// Encoding an unchanged `SaveData` at a non-encrypting level is
// byte-deterministic: gzip runs with a zero mtime and the canonical form is
// key-sorted.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::crypto::{self, EncryptedBlob};
use crate::security::{canonical_bytes, SecurityLevel};
use crate::integrity::{sha256_hex, HmacKey};
use crate::save_error::SaveError;
use crate::save_migrate::{self, MigrationReport};
use crate::save_types::SaveData;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Slot summary and integrity record. Readable without touching (or being
/// able to decrypt) the game state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlotMetadata {
    /// Save format version of the wrapped game state.
    pub version: u32,
    pub game_version: String,
    pub created_at: String,
    pub modified_at: String,

    // Listing summary.
    pub player_name: String,
    /// Chambers completed so far.
    pub floor: u32,
    pub playtime_seconds: f64,

    // Integrity.
    pub checksum: String,
    /// Empty when the slot was written at `Basic`.
    pub signature: String,
    pub security_level: SecurityLevel,
    pub encrypted: bool,
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// What `decode_slot` did beyond deserializing: migrations applied and
/// advisory integrity findings.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub migration: MigrationReport,
    pub warnings: Vec<String>,
}

/// Encode a save into compressed slot bytes.
///
/// # Errors
///
/// Returns `SaveError::Encode` if serialization fails, `SaveError::Crypto`
/// if encryption fails at an encrypting level.
pub fn encode_slot(
    save: &SaveData,
    level: SecurityLevel,
    key: &HmacKey,
    password: Option<&str>,
) -> Result<Vec<u8>, SaveError> {
    let payload =
        serde_json::to_value(save).map_err(|e| SaveError::Encode(e.to_string()))?;
    let canonical = canonical_bytes(&payload)?;

    let checksum = sha256_hex(&canonical);
    let signature = if level.signs() {
        key.sign(&canonical)
    } else {
        String::new()
    };

    let mut metadata = SlotMetadata {
        version: save.save_version,
        game_version: save.game_version.clone(),
        created_at: save.created_at.clone(),
        modified_at: save.modified_at.clone(),
        player_name: save.player_profile.name.clone(),
        floor: save.progression.chambers_completed.len() as u32,
        playtime_seconds: save.player_profile.playtime_seconds,
        checksum,
        signature,
        security_level: level,
        encrypted: false,
        salt: None,
        nonce: None,
    };

    let game_state = match (level.encrypts(), password) {
        (true, Some(password)) => {
            let blob = crypto::encrypt(&canonical, password)?;
            metadata.encrypted = true;
            metadata.salt = Some(blob.salt);
            metadata.nonce = Some(blob.nonce);
            serde_json::json!({ "encrypted": blob.ciphertext })
        }
        _ => payload,
    };

    let document = serde_json::json!({
        "metadata": serde_json::to_value(&metadata)
            .map_err(|e| SaveError::Encode(e.to_string()))?,
        "game_state": game_state,
    });
    let bytes = serde_json::to_vec(&document).map_err(|e| SaveError::Encode(e.to_string()))?;
    compress(&bytes)
}

/// Decode slot bytes back into a verified, migrated `SaveData`.
///
/// Pipeline: gunzip, verify checksum (always fatal on mismatch) and
/// signature (fatal at `High`+, otherwise a logged warning), decrypt if
/// needed, migrate the raw document, deserialize, clamp settings.
///
/// # Errors
///
/// - `SaveError::Decode` for malformed bytes or structure
/// - `SaveError::SecurityViolation` for integrity failures or a missing
///   password on an encrypted slot
/// - `SaveError::Crypto` for decryption failures
/// - `SaveError::VersionMismatch` for future-version saves
pub fn decode_slot(
    bytes: &[u8],
    level: SecurityLevel,
    key: &HmacKey,
    password: Option<&str>,
) -> Result<(SaveData, DecodeReport), SaveError> {
    let document: Value = serde_json::from_slice(&decompress(bytes)?)
        .map_err(|e| SaveError::Decode(format!("slot is not valid JSON: {e}")))?;

    let metadata = slot_metadata_of(&document)?;
    let game_state = document
        .get("game_state")
        .ok_or_else(|| SaveError::Decode("slot document missing game_state".to_string()))?;

    let mut warnings = Vec::new();

    let (mut payload, canonical) = if metadata.encrypted {
        let password = password.ok_or_else(|| {
            SaveError::SecurityViolation("password required for encrypted save".to_string())
        })?;
        let ciphertext = game_state
            .get("encrypted")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SaveError::SecurityViolation("encrypted slot has no ciphertext".to_string())
            })?;
        let (Some(salt), Some(nonce)) = (metadata.salt.clone(), metadata.nonce.clone()) else {
            return Err(SaveError::SecurityViolation(
                "encrypted slot is missing its salt or nonce".to_string(),
            ));
        };
        let blob = EncryptedBlob {
            ciphertext: ciphertext.to_string(),
            salt,
            nonce,
        };
        let plaintext = crypto::decrypt(&blob, password)?;
        let payload: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| SaveError::Decode(format!("decrypted game state is not JSON: {e}")))?;
        (payload, plaintext)
    } else {
        let canonical = canonical_bytes(game_state)?;
        (game_state.clone(), canonical)
    };

    if sha256_hex(&canonical) != metadata.checksum {
        return Err(SaveError::SecurityViolation(
            "checksum mismatch: save may be corrupted or tampered with".to_string(),
        ));
    }

    if metadata.signature.is_empty() {
        if level.signs() {
            warnings.push("save is unsigned".to_string());
        }
    } else if !key.verify(&canonical, &metadata.signature) {
        if level.strict() {
            return Err(SaveError::SecurityViolation(
                "signature mismatch: save integrity compromised".to_string(),
            ));
        }
        warn!("save signature verification failed, continuing at non-strict security level");
        warnings.push("signature verification failed".to_string());
    }

    let migration = save_migrate::migrate_document(&mut payload)?;
    let mut save: SaveData = serde_json::from_value(payload)
        .map_err(|e| SaveError::Decode(format!("malformed game state: {e}")))?;
    save.settings.clamp();

    Ok((save, DecodeReport { migration, warnings }))
}

/// Read only the slot metadata, without verifying, decrypting, or migrating
/// the game state. Used for slot listings.
pub fn peek_metadata(bytes: &[u8]) -> Result<SlotMetadata, SaveError> {
    let document: Value = serde_json::from_slice(&decompress(bytes)?)
        .map_err(|e| SaveError::Decode(format!("slot is not valid JSON: {e}")))?;
    slot_metadata_of(&document)
}

/// Decompress and parse a slot into its raw document, without verifying or
/// migrating. The backup manager re-wraps documents wholesale.
pub(crate) fn read_document(bytes: &[u8]) -> Result<Value, SaveError> {
    serde_json::from_slice(&decompress(bytes)?)
        .map_err(|e| SaveError::Decode(format!("slot is not valid JSON: {e}")))
}

/// Rebuild compressed slot bytes from a metadata record and raw game state.
pub(crate) fn assemble_slot(
    metadata: &SlotMetadata,
    game_state: &Value,
) -> Result<Vec<u8>, SaveError> {
    let document = serde_json::json!({
        "metadata": serde_json::to_value(metadata)
            .map_err(|e| SaveError::Encode(e.to_string()))?,
        "game_state": game_state,
    });
    let bytes = serde_json::to_vec(&document).map_err(|e| SaveError::Encode(e.to_string()))?;
    compress(&bytes)
}

pub(crate) fn slot_metadata_of(document: &Value) -> Result<SlotMetadata, SaveError> {
    let metadata = document
        .get("metadata")
        .ok_or_else(|| SaveError::Decode("slot document missing metadata".to_string()))?;
    serde_json::from_value(metadata.clone())
        .map_err(|e| SaveError::Decode(format!("malformed slot metadata: {e}")))
}

pub(crate) fn compress(bytes: &[u8]) -> Result<Vec<u8>, SaveError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Gunzip slot bytes. Bytes without the gzip magic are passed through
/// unchanged, so an uncompressed JSON slot (e.g. hand-recovered) still
/// loads.
pub(crate) fn decompress(bytes: &[u8]) -> Result<Vec<u8>, SaveError> {
    if bytes.len() < 2 || bytes[..2] != GZIP_MAGIC {
        return Ok(bytes.to_vec());
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| SaveError::Decode(format!("gzip decompression failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save_types::CURRENT_SAVE_VERSION;

    fn sample_save() -> SaveData {
        let mut save = SaveData::new("Khenti", "2026-08-29T10:00:00Z");
        save.player_profile.xp = 2500;
        save.player_profile.level = 3;
        save.progression
            .chambers_completed
            .insert("entrance".to_string());
        save.progression
            .chambers_completed
            .insert("antechamber".to_string());
        save
    }

    #[test]
    fn test_roundtrip_standard() {
        let key = HmacKey::generate();
        let save = sample_save();
        let bytes = encode_slot(&save, SecurityLevel::Standard, &key, None).unwrap();
        let (loaded, report) = decode_slot(&bytes, SecurityLevel::Standard, &key, None).unwrap();
        assert_eq!(loaded, save);
        assert_eq!(report.migration.steps_applied, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let key = HmacKey::generate();
        let save = sample_save();
        let a = encode_slot(&save, SecurityLevel::Standard, &key, None).unwrap();
        let b = encode_slot(&save, SecurityLevel::Standard, &key, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_metadata_summarizes_save() {
        let key = HmacKey::generate();
        let save = sample_save();
        let bytes = encode_slot(&save, SecurityLevel::Standard, &key, None).unwrap();
        let metadata = peek_metadata(&bytes).unwrap();
        assert_eq!(metadata.player_name, "Khenti");
        assert_eq!(metadata.floor, 2);
        assert_eq!(metadata.version, CURRENT_SAVE_VERSION);
        assert!(!metadata.encrypted);
        assert!(!metadata.signature.is_empty());
    }

    #[test]
    fn test_flipped_byte_is_rejected() {
        let key = HmacKey::generate();
        let bytes = encode_slot(&sample_save(), SecurityLevel::Standard, &key, None).unwrap();

        // Corrupt the decompressed document instead of the gzip stream so the
        // failure is the checksum, not the decoder.
        let mut plain = decompress(&bytes).unwrap();
        let target = plain
            .windows(6)
            .position(|w| w == b"Khenti")
            .expect("player name present in plaintext");
        plain[target] ^= 0x01;
        let result = decode_slot(&plain, SecurityLevel::Standard, &key, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_encrypted_roundtrip_and_password_policy() {
        let key = HmacKey::generate();
        let save = sample_save();
        let bytes = encode_slot(&save, SecurityLevel::High, &key, Some("nile")).unwrap();

        let metadata = peek_metadata(&bytes).unwrap();
        assert!(metadata.encrypted);
        assert_eq!(metadata.player_name, "Khenti");

        let (loaded, _) = decode_slot(&bytes, SecurityLevel::High, &key, Some("nile")).unwrap();
        assert_eq!(loaded, save);

        assert!(matches!(
            decode_slot(&bytes, SecurityLevel::High, &key, None),
            Err(SaveError::SecurityViolation(_))
        ));
        assert!(matches!(
            decode_slot(&bytes, SecurityLevel::High, &key, Some("wrong")),
            Err(SaveError::Crypto(_))
        ));
    }

    #[test]
    fn test_signature_mismatch_policy_by_level() {
        let key_a = HmacKey::generate();
        let key_b = HmacKey::generate();
        let bytes = encode_slot(&sample_save(), SecurityLevel::Standard, &key_a, None).unwrap();

        let (_, report) = decode_slot(&bytes, SecurityLevel::Standard, &key_b, None).unwrap();
        assert_eq!(report.warnings.len(), 1);

        assert!(matches!(
            decode_slot(&bytes, SecurityLevel::High, &key_b, None),
            Err(SaveError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_legacy_document_is_migrated_on_decode() {
        let key = HmacKey::generate();

        // A v2 slot: playtime still in hours inside a v1-era profile shape
        // would be v1; use a v2 document with scalar achievement progress.
        let mut save = sample_save();
        save.save_version = 2;
        let mut payload = serde_json::to_value(&save).unwrap();
        payload["progression"]["achievement_progress"] =
            serde_json::json!({ "chamber_crawler": 40 });

        let canonical = canonical_bytes(&payload).unwrap();
        let document = serde_json::json!({
            "metadata": {
                "version": 2,
                "game_version": "0.9.0",
                "created_at": save.created_at,
                "modified_at": save.modified_at,
                "player_name": "Khenti",
                "floor": 2,
                "playtime_seconds": 0.0,
                "checksum": sha256_hex(&canonical),
                "signature": key.sign(&canonical),
                "security_level": "standard",
                "encrypted": false,
            },
            "game_state": payload,
        });
        let bytes = compress(&serde_json::to_vec(&document).unwrap()).unwrap();

        let (loaded, report) = decode_slot(&bytes, SecurityLevel::Standard, &key, None).unwrap();
        assert_eq!(loaded.save_version, CURRENT_SAVE_VERSION);
        assert_eq!(report.migration.original_version, 2);
        assert_eq!(report.migration.steps_applied, 1);
        let progress = &loaded.progression.achievement_progress["chamber_crawler"];
        assert_eq!(progress.current_value, 40.0);
        assert!(!progress.is_completed);
    }

    #[test]
    fn test_uncompressed_slot_still_decodes() {
        let key = HmacKey::generate();
        let save = sample_save();
        let bytes = encode_slot(&save, SecurityLevel::Standard, &key, None).unwrap();
        let plain = decompress(&bytes).unwrap();
        let (loaded, _) = decode_slot(&plain, SecurityLevel::Standard, &key, None).unwrap();
        assert_eq!(loaded, save);
    }

    #[test]
    fn test_out_of_range_settings_are_clamped_on_load() {
        let key = HmacKey::generate();
        let mut save = sample_save();
        save.settings.audio_volume = 9.0;
        let bytes = encode_slot(&save, SecurityLevel::Basic, &key, None).unwrap();
        let (loaded, _) = decode_slot(&bytes, SecurityLevel::Basic, &key, None).unwrap();
        assert_eq!(loaded.settings.audio_volume, 1.0);
    }
}
