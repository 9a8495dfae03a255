//! Error types for the blog core.
//!
//! Every error projects onto a small taxonomy ([`ErrorKind`]) that the HTTP
//! layer maps to status codes. Backend messages are kept as strings so the
//! response layer can expose the textual cause.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, BlogError>;

/// Coarse classification used at the response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    Conflict,
    Internal,
}

/// Token validation failures.
///
/// Expiry is kept apart from signature problems; both are unauthorized at
/// the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("missing authorization token")]
    Missing,

    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("unexpected signing method: {0}")]
    UnexpectedAlgorithm(String),

    #[error("failed to parse token: {0}")]
    Parse(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Core error type.
#[derive(Debug, Error)]
pub enum BlogError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication required or failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Token engine failure
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Hashing, key handling or cipher failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// No driver registered under the requested name
    #[error("driver not found: {0}")]
    DriverNotFound(String),

    /// Connection, pool or pragma failure for a named backend
    #[error("{backend}: {message}")]
    Database {
        backend: &'static str,
        message: String,
    },

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Context added on the way up
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<BlogError>,
    },

    /// Generic error (fallback)
    #[error("{0}")]
    Internal(String),
}

impl BlogError {
    pub(crate) fn database(backend: &'static str, message: impl Into<String>) -> Self {
        BlogError::Database {
            backend,
            message: message.into(),
        }
    }

    /// Attach context while keeping the original error as the source.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        BlogError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error. Wrapped errors report the kind of their source.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlogError::NotFound(_) => ErrorKind::NotFound,
            BlogError::BadRequest(_) => ErrorKind::BadRequest,
            BlogError::Unauthorized(_) | BlogError::Token(_) => ErrorKind::Unauthorized,
            BlogError::Forbidden(_) => ErrorKind::Forbidden,
            BlogError::Conflict(_) => ErrorKind::Conflict,
            BlogError::Wrapped { source, .. } => source.kind(),
            BlogError::Crypto(_)
            | BlogError::DriverNotFound(_)
            | BlogError::Database { .. }
            | BlogError::Storage(_)
            | BlogError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The innermost error of a wrap chain.
    pub fn root(&self) -> &BlogError {
        match self {
            BlogError::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Wrap operator for results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<BlogError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().wrap(context))
    }
}

impl From<rusqlite::Error> for BlogError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, _) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return BlogError::Conflict(err.to_string());
            }
        }
        if matches!(err, rusqlite::Error::QueryReturnedNoRows) {
            return BlogError::NotFound(err.to_string());
        }
        BlogError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for BlogError {
    fn from(err: std::io::Error) -> Self {
        BlogError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BlogError {
    fn from(err: serde_json::Error) -> Self {
        BlogError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_keeps_kind_and_message() {
        let err = BlogError::NotFound("article 9".to_string()).wrap("load article");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "load article: Not found: article 9");
        assert!(matches!(err.root(), BlogError::NotFound(_)));
    }

    #[test]
    fn test_token_errors_are_unauthorized() {
        let expired: BlogError = TokenError::Expired.into();
        let invalid: BlogError = TokenError::Invalid.into();
        assert_eq!(expired.kind(), ErrorKind::Unauthorized);
        assert_eq!(invalid.kind(), ErrorKind::Unauthorized);
        assert_eq!(expired.to_string(), "token has expired");
    }

    #[test]
    fn test_context_on_result() {
        let res: std::result::Result<(), TokenError> = Err(TokenError::Missing);
        let err = res.context("authenticate").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(err.to_string().contains("missing authorization token"));
    }

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: BlogError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_driver_not_found_message() {
        let err = BlogError::DriverNotFound("oracle".to_string());
        assert_eq!(err.to_string(), "driver not found: oracle");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
