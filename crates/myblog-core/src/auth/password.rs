//! Password hashing using Argon2id.
//!
//! Hashes are stored as
//! `$argon2id$v=19$m=65536,t=1,p=4$<salt>$<hash>` with unpadded standard
//! base64 for the salt and digest.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{BlogError, Result};

/// Argon2id parameters for stored passwords.
///
/// - Memory: 64 MiB (64 * 1024 KiB)
/// - Iterations: 1
/// - Parallelism: 4
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;

/// Length of the stored digest in bytes.
const KEY_LENGTH: usize = 32;

/// Length of the random salt in bytes.
const SALT_LENGTH: usize = 16;

/// Parameters recovered from an encoded hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HashParams {
    memory: u32,
    iterations: u32,
    parallelism: u32,
}

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns `BlogError::Crypto` if the system RNG cannot be read.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| BlogError::Crypto(format!("Failed to read random salt: {}", e)))?;

    let params = HashParams {
        memory: ARGON2_MEMORY_KIB,
        iterations: ARGON2_ITERATIONS,
        parallelism: ARGON2_PARALLELISM,
    };
    let digest = derive(password, &salt, params, KEY_LENGTH)?;

    Ok(format!(
        "$argon2id$v={}$m={},t={},p={}${}${}",
        Version::V0x13 as u32,
        params.memory,
        params.iterations,
        params.parallelism,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest.as_slice()),
    ))
}

/// Check a password against an encoded hash.
///
/// Returns `Ok(false)` on mismatch. Errors are reserved for hashes that
/// cannot be decoded.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool> {
    let (params, salt, expected) = decode_hash(encoded)?;
    let candidate = derive(password, &salt, params, expected.len())?;
    Ok(candidate.as_slice().ct_eq(&expected).into())
}

fn derive(
    password: &str,
    salt: &[u8],
    params: HashParams,
    key_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let params = Params::new(
        params.memory,
        params.iterations,
        params.parallelism,
        Some(key_len),
    )
    .map_err(|e| BlogError::Crypto(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = Zeroizing::new(vec![0u8; key_len]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| BlogError::Crypto(format!("Password hashing failed: {}", e)))?;
    Ok(out)
}

fn decode_hash(encoded: &str) -> Result<(HashParams, Vec<u8>, Vec<u8>)> {
    let fields: Vec<&str> = encoded.split('$').collect();
    if fields.len() != 6 {
        return Err(BlogError::Crypto(
            "the encoded hash is not in the correct format".to_string(),
        ));
    }

    let version: u32 = fields[2]
        .strip_prefix("v=")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| BlogError::Crypto("invalid hash version field".to_string()))?;
    if version != Version::V0x13 as u32 {
        return Err(BlogError::Crypto(
            "incompatible version of argon2".to_string(),
        ));
    }

    let params = parse_params(fields[3])
        .ok_or_else(|| BlogError::Crypto("invalid hash parameters".to_string()))?;

    let salt = STANDARD_NO_PAD
        .decode(fields[4])
        .map_err(|e| BlogError::Crypto(format!("invalid salt encoding: {}", e)))?;
    let hash = STANDARD_NO_PAD
        .decode(fields[5])
        .map_err(|e| BlogError::Crypto(format!("invalid hash encoding: {}", e)))?;

    Ok((params, salt, hash))
}

/// Parse `m=<u32>,t=<u32>,p=<u32>`.
fn parse_params(line: &str) -> Option<HashParams> {
    let mut parts = line.split(',');
    let memory = parts.next()?.strip_prefix("m=")?.parse().ok()?;
    let iterations = parts.next()?.strip_prefix("t=")?.parse().ok()?;
    let parallelism = parts.next()?.strip_prefix("p=")?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(HashParams {
        memory,
        iterations,
        parallelism,
    })
}
