//! Session-scoped P-256 key pairs.
//!
//! An [`EccManager`] owns one key pair for one client session. Clients fetch
//! the public key in JWK, raw or PEM form, derive the same ECDH secret on
//! their side and submit AES-GCM sealed payloads.

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p256::{EncodedPoint, FieldBytes, PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::hybrid::{self, SealedPayload};
use crate::error::{BlogError, Result};

/// How long a session key pair is advertised as valid.
pub const SESSION_KEY_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Width of a P-256 coordinate and of the derived shared secret.
pub const COORDINATE_SIZE: usize = 32;

/// Public key as a JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawKeyAlgorithm {
    pub name: &'static str,
    #[serde(rename = "namedCurve")]
    pub named_curve: &'static str,
}

/// Descriptor for Web Crypto `importKey("raw", ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawPublicKey {
    pub format: &'static str,
    #[serde(rename = "keyData")]
    pub key_data: String,
    pub algorithm: RawKeyAlgorithm,
    pub extractable: bool,
    pub usages: Vec<&'static str>,
}

/// One session's key pair.
pub struct EccManager {
    session_id: String,
    secret: SecretKey,
    public: PublicKey,
    expires_at: DateTime<Utc>,
}

impl EccManager {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_lifetime(session_id, SESSION_KEY_LIFETIME)
    }

    pub fn with_lifetime(session_id: impl Into<String>, lifetime: Duration) -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero());
        Self {
            session_id: session_id.into(),
            secret,
            public,
            expires_at: Utc::now() + lifetime,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Advisory only; the key pair keeps working after expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn public_key_jwk(&self) -> Jwk {
        let point = self.public.to_encoded_point(false);
        Jwk {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: URL_SAFE_NO_PAD.encode(point.x().map(|x| x.as_slice()).unwrap_or_default()),
            y: URL_SAFE_NO_PAD.encode(point.y().map(|y| y.as_slice()).unwrap_or_default()),
            key_use: Some("enc".to_string()),
            alg: Some("ECDH-ES+A256KW".to_string()),
        }
    }

    /// 65-byte `0x04 || X || Y`, base64 encoded, in a Web Crypto descriptor.
    pub fn public_key_raw(&self) -> RawPublicKey {
        let point = self.public.to_encoded_point(false);
        RawPublicKey {
            format: "raw",
            key_data: STANDARD.encode(point.as_bytes()),
            algorithm: RawKeyAlgorithm {
                name: "ECDH",
                named_curve: "P-256",
            },
            extractable: true,
            usages: vec!["deriveKey", "deriveBits"],
        }
    }

    pub fn public_key_pem(&self) -> Result<String> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| BlogError::Crypto(format!("failed to encode public key: {}", e)))
    }

    /// X coordinate of `peer * secret`, always 32 bytes.
    ///
    /// Curve mismatch and the identity point cannot be represented by
    /// `PublicKey`, so they are rejected when the peer key is parsed.
    pub fn derive_shared_secret(&self, peer: &PublicKey) -> Zeroizing<[u8; COORDINATE_SIZE]> {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        let mut out = Zeroizing::new([0u8; COORDINATE_SIZE]);
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        out
    }

    /// Seal `plaintext` for `peer` using the raw shared X coordinate as the
    /// AES-256 key. Output is base64 of `nonce || ciphertext || tag`.
    pub fn hybrid_encrypt(&self, plaintext: &[u8], peer: &PublicKey) -> Result<String> {
        let key = self.derive_shared_secret(peer);
        let sealed = hybrid::seal(&key[..], plaintext)?;
        Ok(STANDARD.encode(sealed))
    }

    /// Open a payload produced by [`EccManager::hybrid_encrypt`] or by a
    /// Web Crypto client that used the raw ECDH bits as its AES key.
    pub fn hybrid_decrypt(&self, ciphertext_b64: &str, peer: &PublicKey) -> Result<Vec<u8>> {
        let data = STANDARD
            .decode(ciphertext_b64.trim())
            .map_err(|e| BlogError::BadRequest(format!("failed to decode ciphertext: {}", e)))?;
        let key = self.derive_shared_secret(peer);
        hybrid::open(&key[..], &data)
    }

    /// Seal with an HKDF-SHA-256 key derived under a fresh salt. The salt
    /// travels with the ciphertext.
    pub fn hybrid_encrypt_hkdf(&self, plaintext: &[u8], peer: &PublicKey) -> Result<SealedPayload> {
        let shared = self.derive_shared_secret(peer);
        let salt = hybrid::random_salt()?;
        let key = hybrid::hkdf_key(&shared[..], &salt)?;
        let sealed = hybrid::seal(&key[..], plaintext)?;
        Ok(SealedPayload {
            salt: STANDARD.encode(salt),
            ciphertext: STANDARD.encode(sealed),
        })
    }

    pub fn hybrid_decrypt_hkdf(&self, payload: &SealedPayload, peer: &PublicKey) -> Result<Vec<u8>> {
        let salt = STANDARD
            .decode(&payload.salt)
            .map_err(|e| BlogError::BadRequest(format!("failed to decode salt: {}", e)))?;
        let data = STANDARD
            .decode(&payload.ciphertext)
            .map_err(|e| BlogError::BadRequest(format!("failed to decode ciphertext: {}", e)))?;
        let shared = self.derive_shared_secret(peer);
        let key = hybrid::hkdf_key(&shared[..], &salt)?;
        hybrid::open(&key[..], &data)
    }
}

impl std::fmt::Debug for EccManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EccManager")
            .field("session_id", &self.session_id)
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Parse a PEM `SubjectPublicKeyInfo` holding a P-256 key.
pub fn parse_public_key_pem(pem: &str) -> Result<PublicKey> {
    if !pem.trim_start().starts_with("-----BEGIN") {
        return Err(BlogError::BadRequest(
            "failed to decode PEM block".to_string(),
        ));
    }
    PublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| BlogError::BadRequest(format!("not a P-256 public key: {}", e)))
}

/// Parse a JWK string. Only `kty: EC` on `crv: P-256` is accepted.
pub fn parse_public_key_jwk(json: &str) -> Result<PublicKey> {
    let jwk: Jwk = serde_json::from_str(json)?;
    if jwk.kty != "EC" || jwk.crv != "P-256" {
        return Err(BlogError::BadRequest(
            "unsupported key type or curve".to_string(),
        ));
    }

    let x = decode_coordinate(&jwk.x)?;
    let y = decode_coordinate(&jwk.y)?;
    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::<PublicKey>::from(PublicKey::from_encoded_point(&point))
        .ok_or_else(|| BlogError::BadRequest("point is not on P-256".to_string()))
}

/// Decode a base64url coordinate, left-padding short values to 32 bytes.
fn decode_coordinate(value: &str) -> Result<FieldBytes> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| BlogError::BadRequest(format!("invalid JWK coordinate: {}", e)))?;
    if bytes.len() > COORDINATE_SIZE {
        return Err(BlogError::BadRequest(
            "JWK coordinate too long".to_string(),
        ));
    }
    let mut out = FieldBytes::default();
    out[COORDINATE_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_symmetry() {
        let a = EccManager::new("a");
        let b = EccManager::new("b");
        let ab = a.derive_shared_secret(b.public_key());
        let ba = b.derive_shared_secret(a.public_key());
        assert_eq!(&ab[..], &ba[..]);
    }

    #[test]
    fn test_expiry_window() {
        let mgr = EccManager::new("s");
        assert!(!mgr.is_expired());
        let delta = mgr.expires_at() - Utc::now();
        assert!(delta.num_minutes() >= 59 && delta.num_minutes() <= 60);

        let stale = EccManager::with_lifetime("old", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert!(stale.is_expired());
    }

    #[test]
    fn test_jwk_export_and_import() {
        let mgr = EccManager::new("s");
        let jwk = mgr.public_key_jwk();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv, "P-256");
        assert_eq!(jwk.key_use.as_deref(), Some("enc"));
        assert_eq!(jwk.alg.as_deref(), Some("ECDH-ES+A256KW"));
        assert_eq!(URL_SAFE_NO_PAD.decode(&jwk.x).unwrap().len(), 32);

        let json = serde_json::to_string(&jwk).unwrap();
        assert!(json.contains(r#""use":"enc""#));
        let parsed = parse_public_key_jwk(&json).unwrap();
        assert_eq!(&parsed, mgr.public_key());
    }

    #[test]
    fn test_jwk_rejects_other_curves() {
        let json = r#"{"kty":"EC","crv":"P-384","x":"AA","y":"AA"}"#;
        let err = parse_public_key_jwk(json).unwrap_err();
        assert!(err.to_string().contains("unsupported key type or curve"));

        let json = r#"{"kty":"RSA","crv":"P-256","x":"AA","y":"AA"}"#;
        assert!(parse_public_key_jwk(json).is_err());
    }

    #[test]
    fn test_raw_export() {
        let mgr = EccManager::new("s");
        let raw = mgr.public_key_raw();
        let bytes = STANDARD.decode(&raw.key_data).unwrap();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 0x04);
        assert_eq!(raw.usages, vec!["deriveKey", "deriveBits"]);

        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["algorithm"]["namedCurve"], "P-256");
        assert_eq!(json["format"], "raw");
    }

    #[test]
    fn test_pem_round_trip() {
        let mgr = EccManager::new("s");
        let pem = mgr.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        let parsed = parse_public_key_pem(&pem).unwrap();
        assert_eq!(&parsed, mgr.public_key());
    }

    #[test]
    fn test_pem_garbage_rejected() {
        let err = parse_public_key_pem("hello").unwrap_err();
        assert!(err.to_string().contains("failed to decode PEM block"));
        assert!(parse_public_key_pem("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----").is_err());
    }

    #[test]
    fn test_hybrid_round_trip() {
        let server = EccManager::new("server");
        let client = EccManager::new("client");
        let sealed = client.hybrid_encrypt(b"admin123", server.public_key()).unwrap();
        let opened = server.hybrid_decrypt(&sealed, client.public_key()).unwrap();
        assert_eq!(opened, b"admin123");
    }

    #[test]
    fn test_hybrid_hkdf_round_trip() {
        let server = EccManager::new("server");
        let client = EccManager::new("client");
        let payload = client.hybrid_encrypt_hkdf(b"secret", server.public_key()).unwrap();
        let opened = server.hybrid_decrypt_hkdf(&payload, client.public_key()).unwrap();
        assert_eq!(opened, b"secret");

        // The raw-key regime cannot open an HKDF payload.
        assert!(server.hybrid_decrypt(&payload.ciphertext, client.public_key()).is_err());
    }

    #[test]
    fn test_decrypt_accepts_client_sealed_with_raw_bits() {
        let server = EccManager::new("server");
        let client = EccManager::new("client");
        // A Web Crypto client imports deriveBits output directly as the AES key.
        let bits = client.derive_shared_secret(server.public_key());
        let sealed = hybrid::seal(&bits[..], b"from browser").unwrap();
        let opened = server
            .hybrid_decrypt(&STANDARD.encode(sealed), client.public_key())
            .unwrap();
        assert_eq!(opened, b"from browser");
    }

    #[test]
    fn test_decrypt_short_ciphertext() {
        let server = EccManager::new("server");
        let client = EccManager::new("client");
        let err = server
            .hybrid_decrypt(&STANDARD.encode([1u8; 5]), client.public_key())
            .unwrap_err();
        assert!(err.to_string().contains("ciphertext too short"));
    }
}
