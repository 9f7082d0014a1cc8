#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, request::Builder},
    routing::get,
};
use cookie_jwt::{
    ServerConfig,
    auth::{MaybeAuth, SessionBackend},
    config::{AuthSettings, CookieProfile},
    create_app_with,
    db::Database,
    jwt::{Claims, JwtCodec, RawToken, TokenType, unix_now},
    password::hash_password,
};
use serde_json::{Value, json};
use std::net::SocketAddr;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-integration-tests";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Router, database and a codec sharing the app's secret and revocation store.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub codec: JwtCodec,
    pub settings: AuthSettings,
}

/// Default settings, except cookies are not Secure (tests run over plain HTTP).
pub fn test_settings() -> AuthSettings {
    AuthSettings {
        profile: CookieProfile {
            secure: false,
            ..CookieProfile::default()
        },
        ..AuthSettings::default()
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_settings(), 1000, whoami_routes).await
}

pub async fn create_test_app_with<F>(
    settings: AuthSettings,
    login_rate_per_minute: u32,
    routes: F,
) -> TestApp
where
    F: FnOnce(&SessionBackend<JwtCodec>) -> Router,
{
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        auth: settings.clone(),
        login_rate_per_minute,
        trust_forwarded_for: false,
    };
    let codec = JwtCodec::new(TEST_SECRET, &settings).with_revocation_store(db.revoked_tokens());

    TestApp {
        app: create_app_with(&config, routes),
        db,
        codec,
        settings,
    }
}

/// `GET /whoami`: an endpoint that works with or without a session.
pub fn whoami_routes(session: &SessionBackend<JwtCodec>) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .with_state(session.clone())
}

async fn whoami(MaybeAuth(user): MaybeAuth) -> Json<Value> {
    Json(json!({ "subject": user.map(|u| u.principal.subject) }))
}

/// Create an active user with `TEST_PASSWORD` and return its UUID.
pub async fn create_user(db: &Database, username: &str) -> String {
    let uuid = uuid::Uuid::new_v4().to_string();
    let hash = hash_password(TEST_PASSWORD).unwrap();
    db.users().create(&uuid, username, &hash).await.unwrap();
    uuid
}

/// Sign a token for `sub` that expires `expires_in` seconds from now (negative for the past).
pub fn sign_token(codec: &JwtCodec, sub: &str, token_type: TokenType, expires_in: i64) -> RawToken {
    let now = unix_now();
    let claims = Claims {
        token_type,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.saturating_sub(600),
        exp: (now as i64 + expires_in) as u64,
        ..Claims::for_subject(sub).with_claim("username", "alice")
    };
    codec.sign(&claims).unwrap()
}

/// Request builder with a peer address, as `into_make_service_with_connect_info` provides.
pub fn request(method: &str, uri: &str) -> Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    request("POST", "/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

pub fn cookies(access: Option<&RawToken>, refresh: Option<&RawToken>) -> String {
    let mut parts = Vec::new();
    if let Some(access) = access {
        parts.push(format!("access_token={}", access.as_str()));
    }
    if let Some(refresh) = refresh {
        parts.push(format!("refresh_token={}", refresh.as_str()));
    }
    parts.join("; ")
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Set-Cookie headers for the cookie called `name`.
pub fn cookies_named<'a>(cookies: &'a [String], name: &str) -> Vec<&'a String> {
    let prefix = format!("{}=", name);
    cookies.iter().filter(|c| c.starts_with(&prefix)).collect()
}

/// Value of the cookie called `name`, if it is set and not being cleared.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<RawToken> {
    cookies_named(cookies, name)
        .into_iter()
        .find(|c| !c.contains("Max-Age=0"))
        .and_then(|c| c.split(';').next())
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| RawToken::from(value))
}

/// Check if cookies contain `name` being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    cookies_named(cookies, name)
        .iter()
        .any(|c| c.contains("Max-Age=0"))
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
