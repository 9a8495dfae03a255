//! Router behaviour over a bootstrapped database.

use std::fs;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use myblog_core::auth::TokenService;
use myblog_core::crypto::EccManager;
use myblog_core::db::registry;
use myblog_core::{BootstrapOptions, Database, DriverConfig};
use myblog_server::{router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct TestApp {
    _dir: TempDir,
    app: Router,
    tokens: TokenService,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let static_dir = dir.path().join("static");
    fs::create_dir_all(static_dir.join("sub")).unwrap();
    fs::write(static_dir.join("site.css"), "body { margin: 0 }").unwrap();
    let mut m4a = b"\0\0\0\x20ftypM4A ".to_vec();
    m4a.extend_from_slice(&[0u8; 32]);
    fs::write(static_dir.join("song.mp3"), m4a).unwrap();

    let db = Database::open(
        registry::global(),
        &DriverConfig::sqlite(dir.path().join("app.db")),
    )
    .await
    .unwrap();
    db.bootstrap(BootstrapOptions {
        markdown_dir: None,
        seed_admin: true,
    })
    .await
    .unwrap();

    let state = AppState::new(db, TokenService::with_secret(SECRET), static_dir);
    TestApp {
        _dir: dir,
        app: router(state),
        tokens: TokenService::with_secret(SECRET),
    }
}

async fn send(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_static_directory_is_404() {
    let t = test_app().await;
    let (status, _, _) = send(&t.app, get("/static/sub/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&t.app, get("/static/sub")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_file_and_missing() {
    let t = test_app().await;
    let (status, headers, body) = send(&t.app, get("/static/site.css")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/css; charset=utf-8");
    assert_eq!(body, b"body { margin: 0 }");
    assert!(headers.contains_key(header::LAST_MODIFIED));

    let (status, _, _) = send(&t.app, get("/static/missing.css")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&t.app, get("/static/sub/%2e%2e/site.css")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_mp3_sniffed_as_mp4() {
    let t = test_app().await;
    let (status, headers, _) = send(&t.app, get("/static/song.mp3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mp4");
}

#[tokio::test]
async fn test_health() {
    let t = test_app().await;
    let (status, _, body) = send(&t.app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["backend"], "sqlite");
}

#[tokio::test]
async fn test_login_and_me() {
    let t = test_app().await;
    let (status, headers, body) = send(
        &t.app,
        post_json("/api/auth/login", json!({"username": "admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::SET_COOKIE].to_str().unwrap().starts_with("auth_token="));
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], true);
    assert!(body["data"]["user"].get("password_hash").is_none());
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["role"], "admin");

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("auth_token={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let t = test_app().await;
    let (status, _, body) = send(
        &t.app,
        post_json("/api/auth/login", json!({"username": "admin", "password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_encrypted_login() {
    let t = test_app().await;
    let (status, _, body) = send(&t.app, get("/api/crypto/public-key")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let session_id = body["data"]["session_id"].as_str().unwrap().to_string();
    let jwk = body["data"]["public_key"].to_string();
    assert_eq!(body["data"]["public_key_raw"]["format"], "raw");

    let server_key = myblog_core::crypto::parse_public_key_jwk(&jwk).unwrap();
    let client = EccManager::new("client");
    let sealed = client.hybrid_encrypt(b"admin123", &server_key).unwrap();

    let (status, _, _) = send(
        &t.app,
        post_json(
            "/api/auth/login",
            json!({
                "username": "admin",
                "encrypted_password": {
                    "session_id": session_id,
                    "encrypted_data": sealed,
                    "client_public_key": client.public_key_pem().unwrap(),
                    "algorithm": "ECDH-P256-AES-GCM",
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_me_requires_token() {
    let t = test_app().await;
    let (status, _, _) = send(&t.app, get("/api/auth/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_and_admin_gate() {
    let t = test_app().await;
    let user_token = t.tokens.mint(2, "bob", "user").unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh")
        .header(header::AUTHORIZATION, format!("Bearer {}", user_token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let fresh = body["data"]["token"].as_str().unwrap();
    assert_eq!(t.tokens.validate(fresh).unwrap().username, "bob");

    let request = Request::builder()
        .uri("/api/admin/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", user_token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = t.tokens.mint(1, "admin", "admin").unwrap();
    let request = Request::builder()
        .uri("/api/admin/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_requires_bearer_header() {
    let t = test_app().await;
    let admin_token = t.tokens.mint(1, "admin", "admin").unwrap();

    let request = Request::builder()
        .uri("/api/admin/status")
        .header(header::COOKIE, format!("auth_token={}", admin_token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/admin/status")
        .header(header::AUTHORIZATION, admin_token.clone())
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The same raw header is enough for a plain authenticated route.
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, admin_token)
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
}
