//! Symmetric layer of the hybrid scheme.
//!
//! AES-256-GCM with a random 12-byte nonce prepended to the ciphertext, plus
//! the HKDF-SHA-256 key schedule used by the salted regime.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{BlogError, Result};

/// Size of encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Size of the HKDF salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Ciphertext sealed under an HKDF-derived key, with the salt that
/// derived it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub salt: String,
    pub ciphertext: String,
}

/// Encrypt and return `nonce || ciphertext || tag`.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| BlogError::Crypto("invalid AES-256 key length".to_string()))?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| BlogError::Crypto(format!("failed to generate nonce: {}", e)))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| BlogError::Crypto("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a buffer laid out as `nonce || ciphertext || tag`.
pub fn open(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE {
        return Err(BlogError::BadRequest("ciphertext too short".to_string()));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| BlogError::Crypto("invalid AES-256 key length".to_string()))?;

    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| BlogError::Crypto("decryption failed".to_string()))
}

/// HKDF-SHA-256 with empty info, producing a 32-byte key.
pub fn hkdf_key(input_key_material: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), input_key_material);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(&[], &mut okm[..])
        .map_err(|_| BlogError::Crypto("HKDF expansion failed".to_string()))?;
    Ok(okm)
}

pub fn random_salt() -> Result<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| BlogError::Crypto(format!("failed to generate salt: {}", e)))?;
    Ok(salt)
}
