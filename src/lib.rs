pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::create_auth_router;
use auth::{SessionBackend, rotate_access_cookie};
use axum::{Router, middleware};
use config::AuthSettings;
use db::Database;
use jwt::JwtCodec;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Cookie names, cookie attributes, lifetimes and rotation threshold
    pub auth: AuthSettings,
    /// Login attempts allowed per client IP per minute
    pub login_rate_per_minute: u32,
    /// Key rate limiting on `X-Forwarded-For` (requires running behind a proxy)
    pub trust_forwarded_for: bool,
}

/// Build the session backend: an HS256 codec with refresh token revocation
/// backed by the database, and subject checks against the user table.
pub fn session_backend(config: &ServerConfig) -> SessionBackend<JwtCodec> {
    let codec = JwtCodec::new(&config.jwt_secret, &config.auth)
        .with_revocation_store(config.db.revoked_tokens());
    SessionBackend::new(config.auth.clone(), codec, Some(config.db.users()))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    create_app_with(config, |_| Router::new())
}

/// Create the application router and merge in extra routes.
///
/// The closure receives the session backend so the extra routes can use it as
/// state for the `Auth` and `MaybeAuth` extractors. Every route, including the
/// extra ones, runs behind the access cookie rotation middleware.
pub fn create_app_with<F>(config: &ServerConfig, routes: F) -> Router
where
    F: FnOnce(&SessionBackend<JwtCodec>) -> Router,
{
    let session = session_backend(config);
    let rate_limit = Arc::new(RateLimitConfig::new(
        config.login_rate_per_minute,
        config.trust_forwarded_for,
    ));

    let auth_router = create_auth_router(session.clone(), config.db.clone(), rate_limit);

    Router::new()
        .nest("/auth", auth_router)
        .merge(routes(&session))
        .layer(middleware::from_fn_with_state(
            session,
            rotate_access_cookie::<JwtCodec>,
        ))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
