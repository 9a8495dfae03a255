//! Request-side token extraction.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use myblog_core::auth::{token_from_parts, Claims};
use myblog_core::{BlogError, TokenError};

use crate::response::ApiError;
use crate::state::AppState;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// Raw token from the `Authorization` header or the `auth_token` cookie.
pub fn request_token(headers: &HeaderMap) -> Option<String> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(AUTH_COOKIE).map(|c| c.value());
    token_from_parts(authorization, cookie).map(str::to_string)
}

/// Claims of an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers).ok_or(TokenError::Missing)?;
        Ok(AuthUser(state.tokens.validate(&token)?))
    }
}

/// An admin caller. Only `Authorization: Bearer <token>` is accepted; the
/// cookie and bare header values are not.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::Missing)?;
        let claims = state.tokens.validate(token)?;
        if !state.tokens.is_admin(authorization) {
            return Err(ApiError(BlogError::Forbidden(
                "admin role required".to_string(),
            )));
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_token(&headers), None);

        headers.insert("cookie", HeaderValue::from_static("theme=dark; auth_token=from-cookie"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-header"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("raw-token"));
        assert_eq!(request_token(&headers).as_deref(), Some("raw-token"));
    }
}
