//! In-memory registry of ECC sessions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::ecc::{parse_public_key_pem, EccManager};
use crate::error::{BlogError, Result};

/// Payload a client submits after sealing a secret for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub session_id: String,
    pub encrypted_data: String,
    pub client_public_key: String,
    #[serde(default)]
    pub algorithm: String,
}

/// Session id to key pair map shared across request handlers.
#[derive(Debug, Default)]
pub struct EccSessionStore {
    sessions: RwLock<HashMap<String, Arc<EccManager>>>,
}

impl EccSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<EccManager>>>> {
        self.sessions
            .read()
            .map_err(|_| BlogError::Internal("ECC session store poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<EccManager>>>> {
        self.sessions
            .write()
            .map_err(|_| BlogError::Internal("ECC session store poisoned".to_string()))
    }

    /// Return the live session for `session_id`, or start a new one.
    ///
    /// Unknown or expired ids get a fresh key pair under a fresh id.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Result<Arc<EccManager>> {
        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            if let Some(existing) = self.read()?.get(id) {
                if !existing.is_expired() {
                    return Ok(Arc::clone(existing));
                }
            }
        }

        let manager = Arc::new(EccManager::new(generate_session_id()?));
        self.write()?
            .insert(manager.session_id().to_string(), Arc::clone(&manager));
        tracing::debug!(session_id = manager.session_id(), "created ECC session");
        Ok(manager)
    }

    /// Look up a session that has not expired.
    pub fn get(&self, session_id: &str) -> Result<Arc<EccManager>> {
        let manager = self
            .read()?
            .get(session_id)
            .cloned()
            .ok_or_else(|| BlogError::Unauthorized(format!("unknown session: {}", session_id)))?;
        if manager.is_expired() {
            return Err(BlogError::Unauthorized("session expired".to_string()));
        }
        Ok(manager)
    }

    /// Decrypt a client envelope with its session's key pair.
    pub fn decrypt_envelope(&self, envelope: &EncryptedEnvelope) -> Result<String> {
        let manager = self.get(&envelope.session_id)?;
        let client_key = parse_public_key_pem(&envelope.client_public_key)?;
        let plaintext = manager.hybrid_decrypt(&envelope.encrypted_data, &client_key)?;
        String::from_utf8(plaintext)
            .map_err(|_| BlogError::BadRequest("decrypted payload is not UTF-8".to_string()))
    }

    /// Drop expired sessions, returning how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, manager| !manager.is_expired());
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> usize {
        self.read().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn insert(&self, manager: EccManager) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(manager.session_id().to_string(), Arc::new(manager));
    }
}

/// `session_` followed by 32 hex characters.
pub fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| BlogError::Crypto(format!("failed to generate session id: {}", e)))?;
    Ok(format!("session_{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id().unwrap();
        assert!(id.starts_with("session_"));
        assert_eq!(id.len(), "session_".len() + 32);
    }

    #[test]
    fn test_get_or_create_reuses_live_session() {
        let store = EccSessionStore::new();
        let first = store.get_or_create(None).unwrap();
        let again = store.get_or_create(Some(first.session_id())).unwrap();
        assert_eq!(first.session_id(), again.session_id());
        assert_eq!(store.len(), 1);

        let other = store.get_or_create(Some("session_unknown")).unwrap();
        assert_ne!(other.session_id(), "session_unknown");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = EccSessionStore::new();
        store.get_or_create(None).unwrap();
        store.insert(EccManager::with_lifetime("session_old", Duration::ZERO));
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get("session_old").is_err());
        assert_eq!(store.cleanup_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_decrypt_envelope() {
        let store = EccSessionStore::new();
        let server = store.get_or_create(None).unwrap();
        let client = EccManager::new("client");

        let envelope = EncryptedEnvelope {
            session_id: server.session_id().to_string(),
            encrypted_data: client.hybrid_encrypt(b"admin123", server.public_key()).unwrap(),
            client_public_key: client.public_key_pem().unwrap(),
            algorithm: "ECDH-P256-AES-GCM".to_string(),
        };
        assert_eq!(store.decrypt_envelope(&envelope).unwrap(), "admin123");

        let unknown = EncryptedEnvelope {
            session_id: "session_missing".to_string(),
            ..envelope
        };
        assert!(store.decrypt_envelope(&unknown).is_err());
    }
}
