//! HMAC-signed session tokens.
//!
//! Tokens are compact JWS strings over HS256. The signing key lives in a
//! [`TokenService`] value built by the composition root; tests swap the key
//! or lifetime through explicit setters.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{BlogError, Result, TokenError};

/// Issuer written into every token.
pub const ISSUER: &str = "myblog-gogogo";

/// Default token lifetime.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Role tag granting administrative access.
pub const ADMIN_ROLE: &str = "admin";

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claim set carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub exp: u64,
    pub iat: u64,
    pub nbf: u64,
    pub iss: String,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Mints, validates and refreshes session tokens.
pub struct TokenService {
    secret: SecretString,
    lifetime: Duration,
}

impl TokenService {
    /// Create a service with a random key: 16 bytes from the OS RNG rendered
    /// as 32 hex characters.
    pub fn new() -> Result<Self> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| BlogError::Crypto(format!("Failed to generate signing key: {}", e)))?;
        Ok(Self::with_secret(hex::encode(bytes)))
    }

    /// Create a service with a caller-supplied key.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            lifetime: DEFAULT_LIFETIME,
        }
    }

    /// Replace the signing key. Not safe to call while tokens are in flight.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = SecretString::from(secret.into());
    }

    pub fn set_lifetime(&mut self, lifetime: Duration) {
        self.lifetime = lifetime;
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token for the given identity.
    pub fn mint(&self, user_id: i64, username: &str, role: &str) -> Result<String> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            role: role.to_string(),
            exp: now + self.lifetime.as_secs(),
            iat: now,
            nbf: now,
            iss: ISSUER.to_string(),
        };
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| TokenError::Signing(e.to_string()).into())
    }

    /// Verify signature and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| TokenError::Parse(e.to_string()))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::UnexpectedAlgorithm(format!("{:?}", header.alg)).into());
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let data = jsonwebtoken::decode::<Claims>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::InvalidSignature | JwtErrorKind::ImmatureSignature => {
                    TokenError::Invalid
                }
                _ => TokenError::Parse(e.to_string()),
            }
        })?;

        if data.claims.exp <= jsonwebtoken::get_current_timestamp() {
            return Err(TokenError::Expired.into());
        }
        Ok(data.claims)
    }

    /// Validate a token and mint a fresh one for the same identity.
    pub fn refresh(&self, token: &str) -> Result<String> {
        let claims = self.validate(token)?;
        self.mint(claims.user_id, &claims.username, &claims.role)
    }

    /// Resolve claims from an `Authorization` header value and an
    /// `auth_token` cookie value.
    ///
    /// A `Bearer ` prefix is stripped; any other header value is used as-is.
    /// The cookie is consulted only when the header is empty.
    pub fn authenticate(&self, authorization: Option<&str>, cookie: Option<&str>) -> Result<Claims> {
        let token = token_from_parts(authorization, cookie).ok_or(TokenError::Missing)?;
        self.validate(token)
    }

    /// True only for a `Bearer <token>` header that validates with the admin role.
    pub fn is_admin(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.validate(token).ok())
            .is_some_and(|claims| claims.is_admin())
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Raw token from an `Authorization` value, falling back to the cookie.
pub fn token_from_parts<'a>(authorization: Option<&'a str>, cookie: Option<&'a str>) -> Option<&'a str> {
    match authorization.filter(|value| !value.is_empty()) {
        Some(value) => Some(value.strip_prefix("Bearer ").unwrap_or(value)),
        None => cookie.filter(|value| !value.is_empty()),
    }
    .filter(|token| !token.is_empty())
}
