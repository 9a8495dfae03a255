//! Username/password login.

use serde::{Deserialize, Serialize};

use super::password::verify_password;
use super::token::TokenService;
use crate::crypto::{EccSessionStore, EncryptedEnvelope};
use crate::error::{BlogError, Result};
use crate::storage::{User, UserRepository};

/// Credentials submitted by a client. The password arrives either in the
/// clear (over TLS) or sealed for an ECC session.
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub encrypted_password: Option<EncryptedEnvelope>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("encrypted", &self.encrypted_password.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Stored-format hash with the production parameters that no password
/// matches. Unknown usernames are verified against it so every rejected
/// login costs one Argon2 run.
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=65536,t=1,p=4$bXlibG9nLW5vdXNlci0wMA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn bad_credentials() -> BlogError {
    BlogError::Unauthorized("invalid username or password".to_string())
}

/// Check credentials and mint a token.
///
/// # Errors
///
/// Unknown users and wrong passwords give the same `Unauthorized`; a
/// disabled account gives `Forbidden`.
pub fn login(
    users: &dyn UserRepository,
    tokens: &TokenService,
    sessions: &EccSessionStore,
    request: &LoginRequest,
) -> Result<LoginOutcome> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(BlogError::BadRequest("username is required".to_string()));
    }

    let password = match (&request.password, &request.encrypted_password) {
        (_, Some(envelope)) => sessions.decrypt_envelope(envelope)?,
        (Some(password), None) => password.clone(),
        (None, None) => return Err(BlogError::BadRequest("password is required".to_string())),
    };

    let Some(user) = users.find_user_by_username(username)? else {
        let _ = verify_password(&password, UNKNOWN_USER_HASH);
        tracing::info!(username, "login rejected");
        return Err(bad_credentials());
    };
    if !verify_password(&password, &user.password_hash)? {
        tracing::info!(username, "login rejected");
        return Err(bad_credentials());
    }
    if !user.is_active() {
        return Err(BlogError::Forbidden(format!("account {} is disabled", user.username)));
    }

    let token = tokens.mint(user.id, &user.username, &user.role)?;
    tracing::info!(user_id = user.id, username = %user.username, "login succeeded");
    Ok(LoginOutcome { token, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::crypto::EccManager;
    use crate::schema::tables;
    use crate::storage::{NewUser, SqliteStore};
    use rusqlite::Connection;

    fn conn_with_user(status: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        tables::create_tables(&conn).unwrap();
        SqliteStore::new(&conn)
            .create_user(&NewUser {
                username: "alice".to_string(),
                password_hash: hash_password("s3cret").unwrap(),
                email: None,
                role: "user".to_string(),
                status: status.to_string(),
            })
            .unwrap();
        conn
    }

    fn plain(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: Some(password.to_string()),
            encrypted_password: None,
        }
    }

    #[test]
    fn test_login_plaintext() {
        let conn = conn_with_user("active");
        let store = SqliteStore::new(&conn);
        let tokens = TokenService::with_secret("test-secret");
        let sessions = EccSessionStore::new();

        let outcome = login(&store, &tokens, &sessions, &plain("alice", "s3cret")).unwrap();
        let claims = tokens.validate(&outcome.token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.user_id, outcome.user.id);
    }

    #[test]
    fn test_login_same_error_for_unknown_and_wrong() {
        let conn = conn_with_user("active");
        let store = SqliteStore::new(&conn);
        let tokens = TokenService::with_secret("test-secret");
        let sessions = EccSessionStore::new();

        let wrong = login(&store, &tokens, &sessions, &plain("alice", "nope")).unwrap_err();
        let unknown = login(&store, &tokens, &sessions, &plain("bob", "s3cret")).unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, BlogError::Unauthorized(_)));
    }

    #[test]
    fn test_unknown_user_hash_is_verifiable() {
        assert!(!verify_password("s3cret", UNKNOWN_USER_HASH).unwrap());
        assert!(!verify_password("", UNKNOWN_USER_HASH).unwrap());
        let stored = hash_password("s3cret").unwrap();
        let params = |h: &str| h.split('$').nth(3).map(str::to_string);
        assert_eq!(params(UNKNOWN_USER_HASH), params(&stored));
    }

    #[test]
    fn test_login_disabled_account() {
        let conn = conn_with_user("disabled");
        let store = SqliteStore::new(&conn);
        let tokens = TokenService::with_secret("test-secret");
        let err = login(&store, &tokens, &EccSessionStore::new(), &plain("alice", "s3cret"))
            .unwrap_err();
        assert!(matches!(err, BlogError::Forbidden(_)));
    }

    #[test]
    fn test_login_encrypted_password() {
        let conn = conn_with_user("active");
        let store = SqliteStore::new(&conn);
        let tokens = TokenService::with_secret("test-secret");
        let sessions = EccSessionStore::new();

        let server = sessions.get_or_create(None).unwrap();
        let client = EccManager::new("client");
        let sealed = client.hybrid_encrypt(b"s3cret", server.public_key()).unwrap();
        let request = LoginRequest {
            username: "alice".to_string(),
            password: None,
            encrypted_password: Some(EncryptedEnvelope {
                session_id: server.session_id().to_string(),
                encrypted_data: sealed,
                client_public_key: client.public_key_pem().unwrap(),
                algorithm: "ECDH-P256-AES-GCM".to_string(),
            }),
        };

        assert!(login(&store, &tokens, &sessions, &request).is_ok());
    }

    #[test]
    fn test_login_requires_password() {
        let conn = conn_with_user("active");
        let store = SqliteStore::new(&conn);
        let request = LoginRequest {
            username: "alice".to_string(),
            password: None,
            encrypted_password: None,
        };
        let err = login(
            &store,
            &TokenService::with_secret("k"),
            &EccSessionStore::new(),
            &request,
        )
        .unwrap_err();
        assert!(matches!(err, BlogError::BadRequest(_)));
    }
}
