//! HTTP routes.

use axum::extract::{Path, Query, Request, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use myblog_core::auth::{login, LoginRequest};
use myblog_core::storage::SqliteStore;
use myblog_core::TokenError;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::extract::{request_token, AdminUser, AuthUser, AUTH_COOKIE};
use crate::response::{self, ApiResult};
use crate::state::AppState;
use crate::static_files;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/static/*path", get(serve_static))
        .route("/api/crypto/public-key", get(public_key))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me", get(me))
        .route("/api/admin/status", get(admin_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => response::success(json!({
            "status": "ok",
            "backend": state.db.backend(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            response::service_unavailable(e.to_string())
        }
    }
}

async fn serve_static(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    static_files::serve(&state.static_dir, &path, request).await
}

#[derive(Debug, Deserialize)]
struct PublicKeyQuery {
    session_id: Option<String>,
}

async fn public_key(
    State(state): State<AppState>,
    Query(query): Query<PublicKeyQuery>,
) -> ApiResult {
    let manager = state.sessions.get_or_create(query.session_id.as_deref())?;
    Ok(response::success(json!({
        "session_id": manager.session_id(),
        "public_key": manager.public_key_jwk(),
        "public_key_raw": manager.public_key_raw(),
        "public_key_pem": manager.public_key_pem()?,
        "expires_at": manager.expires_at(),
    })))
}

fn auth_cookie(token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Response)> {
    let tokens = state.tokens.clone();
    let sessions = state.sessions.clone();
    let outcome = state
        .db
        .interact(move |conn| login(&SqliteStore::new(conn), &tokens, &sessions, &request))
        .await?;

    let jar = jar.add(auth_cookie(outcome.token.clone()));
    Ok((
        jar,
        response::success_with_message(
            "登录成功",
            json!({ "token": outcome.token, "user": outcome.user }),
        ),
    ))
}

async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> ApiResult<(CookieJar, Response)> {
    let token = request_token(&headers).ok_or(TokenError::Missing)?;
    let fresh = state.tokens.refresh(&token)?;
    let jar = jar.add(auth_cookie(fresh.clone()));
    Ok((jar, response::success(json!({ "token": fresh }))))
}

async fn me(AuthUser(claims): AuthUser) -> Response {
    response::success(json!({
        "user_id": claims.user_id,
        "username": claims.username,
        "role": claims.role,
        "expires_at": claims.exp,
    }))
}

async fn admin_status(State(state): State<AppState>, AdminUser(_): AdminUser) -> Response {
    let pool = state.db.status();
    response::success(json!({
        "backend": state.db.backend(),
        "pool": {
            "size": pool.size,
            "available": pool.available,
            "max_size": pool.max_size,
        },
        "ecc_sessions": state.sessions.len(),
    }))
}
