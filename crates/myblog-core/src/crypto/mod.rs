//! Hybrid ECDH + AES-GCM transport for client-submitted secrets.

pub mod ecc;
pub mod hybrid;
pub mod session;

pub use ecc::{parse_public_key_jwk, parse_public_key_pem, EccManager, Jwk, RawPublicKey};
pub use hybrid::SealedPayload;
pub use session::{generate_session_id, EccSessionStore, EncryptedEnvelope};
