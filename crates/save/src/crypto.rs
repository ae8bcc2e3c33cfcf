// ---------------------------------------------------------------------------
// crypto – Password-derived authenticated encryption for save payloads
// ---------------------------------------------------------------------------
//
// Key derivation: PBKDF2-HMAC-SHA256 over a fresh 16-byte salt, 100,000
// rounds (intentionally slow, bounded to sub-second).
// Encryption: ChaCha20-Poly1305 with a fresh 12-byte nonce.
//
// Decryption returns a single `SaveError::Crypto`: a wrong password and a
// corrupted ciphertext are indistinguishable, and no partial recovery is
// ever attempted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::save_error::SaveError;

/// PBKDF2 iteration count.
pub const KEY_DERIVATION_ROUNDS: u32 = 100_000;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// ChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 12;

/// An encrypted payload plus the parameters needed to decrypt it (everything
/// except the password). All fields are base64 text so the blob embeds
/// directly in the JSON save document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptedBlob {
    pub ciphertext: String,
    pub salt: String,
    pub nonce: String,
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KEY_DERIVATION_ROUNDS, &mut key);
    key
}

/// Encrypt `plaintext` under a password-derived key with a fresh salt and
/// nonce.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<EncryptedBlob, SaveError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt);
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| SaveError::Crypto(format!("key setup failed: {e}")))?;

    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SaveError::Crypto("encryption failed".to_string()))?;

    Ok(EncryptedBlob {
        ciphertext: BASE64.encode(ciphertext),
        salt: BASE64.encode(salt),
        nonce: BASE64.encode(nonce_bytes),
    })
}

/// Decrypt a blob with the given password.
///
/// # Errors
///
/// `SaveError::Crypto` on any failure: malformed base64, wrong password, or
/// a ciphertext that fails the Poly1305 authentication tag.
pub fn decrypt(blob: &EncryptedBlob, password: &str) -> Result<Vec<u8>, SaveError> {
    let ciphertext = BASE64
        .decode(&blob.ciphertext)
        .map_err(|_| SaveError::Crypto("malformed ciphertext encoding".to_string()))?;
    let salt = BASE64
        .decode(&blob.salt)
        .map_err(|_| SaveError::Crypto("malformed salt encoding".to_string()))?;
    let nonce_bytes = BASE64
        .decode(&blob.nonce)
        .map_err(|_| SaveError::Crypto("malformed nonce encoding".to_string()))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(SaveError::Crypto("malformed nonce length".to_string()));
    }

    let key = derive_key(password, &salt);
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| SaveError::Crypto(format!("key setup failed: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| SaveError::Crypto("decryption failed".to_string()))
}
