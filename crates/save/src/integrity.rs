// ---------------------------------------------------------------------------
// integrity – SHA-256 checksums and HMAC-SHA256 signatures
// ---------------------------------------------------------------------------
//
// Checksums detect corruption; signatures detect tampering. Both are
// computed over canonical (sorted-key) serialized bytes, so two
// semantically-equal structures always hash identically -- the codec is
// responsible for producing those bytes.
//
// Verification fails closed: a mismatch is always reported as an integrity
// failure. Callers decide per security level whether a signature mismatch
// aborts the load or is downgraded to a logged warning.

use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Filename of the persisted signing key, relative to the save directory.
pub const HMAC_KEY_FILENAME: &str = "hmac.key";

/// Length of the signing key in bytes.
const HMAC_KEY_LEN: usize = 32;

/// Hex-encoded SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compare a payload against an expected hex digest.
pub fn verify_checksum(bytes: &[u8], expected_hex: &str) -> bool {
    sha256_hex(bytes) == expected_hex
}

/// Process-local HMAC signing key.
///
/// Generated once and persisted to a key file next to the saves. If the key
/// file cannot be read or written, a fresh in-memory key is used instead,
/// which makes signatures from the prior key unverifiable. That is an
/// accepted degradation inherited from the original system, not a
/// recommended design; it is logged loudly rather than hardened.
#[derive(Clone)]
pub struct HmacKey {
    key: [u8; HMAC_KEY_LEN],
}

impl HmacKey {
    /// Load the key from `dir/hmac.key`, generating and persisting a fresh
    /// one if missing.
    pub fn load_or_generate(dir: &Path) -> Self {
        let key_path = dir.join(HMAC_KEY_FILENAME);

        if let Ok(bytes) = fs::read(&key_path) {
            if bytes.len() == HMAC_KEY_LEN {
                let mut key = [0u8; HMAC_KEY_LEN];
                key.copy_from_slice(&bytes);
                return Self { key };
            }
            warn!(
                path = %key_path.display(),
                len = bytes.len(),
                "HMAC key file has wrong length, regenerating"
            );
        }

        let fresh = Self::generate();
        if let Err(e) = fs::create_dir_all(dir).and_then(|()| fs::write(&key_path, fresh.key)) {
            warn!(
                path = %key_path.display(),
                error = %e,
                "failed to persist HMAC key; previously signed payloads will not verify"
            );
        }
        fresh
    }

    /// A fresh random key that is never persisted. Used when the key file is
    /// unwritable, and by tests.
    pub fn generate() -> Self {
        let mut key = [0u8; HMAC_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Hex-encoded HMAC-SHA256 signature over `bytes`.
    pub fn sign(&self, bytes: &[u8]) -> String {
        // new_from_slice only fails on invalid key lengths; ours is fixed.
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts 32-byte keys"));
        mac.update(bytes);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a hex signature over `bytes`. Constant-time on the MAC
    /// comparison; hex decoding failures simply fail verification.
    pub fn verify(&self, bytes: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts 32-byte keys"));
        mac.update(bytes);
        mac.verify_slice(&signature).is_ok()
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("HmacKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Helper to create a unique temp directory for each test.
    fn test_dir(name: &str) -> PathBuf {
        let dir = PathBuf::from(format!("/tmp/duat_integrity_test_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sha256_is_deterministic() {
        let a = sha256_hex(b"sands of duat");
        let b = sha256_hex(b"sands of duat");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_checksum_detects_any_flip() {
        let data = b"payload bytes".to_vec();
        let digest = sha256_hex(&data);
        assert!(verify_checksum(&data, &digest));

        for i in 0..data.len() {
            let mut corrupted = data.clone();
            corrupted[i] ^= 0x01;
            assert!(
                !verify_checksum(&corrupted, &digest),
                "flip at byte {i} not detected"
            );
        }
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let key = HmacKey::generate();
        let signature = key.sign(b"hello");
        assert!(key.verify(b"hello", &signature));
        assert!(!key.verify(b"hellO", &signature));
    }

    #[test]
    fn test_different_keys_do_not_cross_verify() {
        let key_a = HmacKey::generate();
        let key_b = HmacKey::generate();
        let signature = key_a.sign(b"data");
        assert!(!key_b.verify(b"data", &signature));
    }

    #[test]
    fn test_verify_rejects_malformed_hex() {
        let key = HmacKey::generate();
        assert!(!key.verify(b"data", "not hex at all"));
        assert!(!key.verify(b"data", ""));
    }

    #[test]
    fn test_key_persists_across_loads() {
        let dir = test_dir("persists");
        let key_a = HmacKey::load_or_generate(&dir);
        let key_b = HmacKey::load_or_generate(&dir);
        let signature = key_a.sign(b"payload");
        assert!(key_b.verify(b"payload", &signature));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_wrong_length_key_file_regenerated() {
        let dir = test_dir("wrong_len");
        fs::write(dir.join(HMAC_KEY_FILENAME), b"short").unwrap();
        let key = HmacKey::load_or_generate(&dir);
        // A valid key was produced and persisted over the bad file.
        let on_disk = fs::read(dir.join(HMAC_KEY_FILENAME)).unwrap();
        assert_eq!(on_disk.len(), 32);
        assert!(key.verify(b"x", &key.sign(b"x")));
        let _ = fs::remove_dir_all(&dir);
    }
}
