//! Session endpoints.
//!
//! - POST `/login` - Verify credentials, set access and refresh cookies
//! - POST `/refresh` - Exchange the refresh cookie for a new access cookie
//! - POST `/logout` - Revoke the refresh token and clear both cookies
//! - GET `/me` - Current principal

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::body::{inject_detail, strip_token_fields};
use super::error::{ApiError, ResultExt};
use crate::auth::{
    Auth, CookiePair, HasSessionBackend, Principal, SessionBackend, apply_directives,
    ensure_active,
};
use crate::db::{Database, User};
use crate::jwt::{Claims, TokenCodec, TokenError, TokenType};
use crate::password::{verify_dummy_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

pub const LOGIN_SUCCESS: &str = "Login realizado com sucesso.";
pub const REFRESH_SUCCESS: &str = "Token renovado com sucesso.";
pub const LOGOUT_SUCCESS: &str = "Logout realizado com sucesso.";
pub const REFRESH_MISSING: &str = "Refresh token ausente.";
pub const REFRESH_INVALID: &str = "Refresh token inválido ou expirado.";
pub const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

pub struct TokensState<C> {
    pub session: SessionBackend<C>,
    pub db: Database,
    pub rate_limit: Arc<RateLimitConfig>,
}

impl<C> Clone for TokensState<C> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            db: self.db.clone(),
            rate_limit: self.rate_limit.clone(),
        }
    }
}

impl<C: TokenCodec> HasSessionBackend for TokensState<C> {
    type Codec = C;

    fn session(&self) -> &SessionBackend<C> {
        &self.session
    }
}

pub fn router<C: TokenCodec>(state: TokensState<C>) -> Router {
    let login_route = post(login::<C>).layer(middleware::from_fn_with_state(
        state.rate_limit.clone(),
        rate_limit_login,
    ));

    Router::new()
        .route("/login", login_route)
        .route("/refresh", post(refresh::<C>))
        .route("/logout", post(logout::<C>))
        .route("/me", get(me))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginCredentials {
    username: String,
    password: String,
}

/// Issue a token pair for a user, in the shape a token endpoint would return it.
fn obtain_token_pair<C: TokenCodec>(codec: &C, user: &User) -> Result<Value, TokenError> {
    let claims = Claims::for_subject(&user.uuid).with_claim("username", user.username.as_str());
    let refresh = codec.issue_refresh(&claims)?;
    let access = codec.issue_access(&claims)?;
    Ok(json!({
        "access": access.into_string(),
        "refresh": refresh.into_string(),
    }))
}

/// Verify username and password, then move the issued tokens into cookies.
/// The response body never contains tokens.
async fn login<C: TokenCodec>(
    State(state): State<TokensState<C>>,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(credentials) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let user = state
        .db
        .users()
        .get_by_username(&credentials.username)
        .await
        .db_err("Failed to look up user")?;

    // Every attempt pays for one argon2 verification, known user or not.
    let user = match user {
        Some(user) => {
            let password_ok = verify_password(&credentials.password, &user.password_hash);
            (password_ok && user.active).then_some(user)
        }
        None => {
            verify_dummy_password(&credentials.password);
            None
        }
    };

    let Some(user) = user else {
        info!(username = %credentials.username, "Failed login attempt");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let session = &state.session;
    let body = obtain_token_pair(session.codec(), &user).map_err(|e| {
        error!(error = %e, "Failed to issue tokens");
        ApiError::internal("Failed to generate token")
    })?;

    let (body, tokens) = strip_token_fields(body);
    let (Some(access), Some(refresh)) = (tokens.access, tokens.refresh) else {
        return Err(ApiError::internal("Failed to generate token"));
    };

    let mut response = Json(inject_detail(body, LOGIN_SUCCESS)).into_response();
    apply_directives(
        response.headers_mut(),
        &session.projection().issue_pair(&access, &refresh),
    );

    info!(user = %user.uuid, "User logged in");
    Ok(response)
}

/// Mint a new access token from the refresh cookie.
/// Failures leave the cookies untouched.
async fn refresh<C: TokenCodec>(
    State(state): State<TokensState<C>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = &state.session;

    let refresh_token = CookiePair::from_headers(&headers, session.settings())
        .refresh
        .ok_or_else(|| ApiError::unauthorized(REFRESH_MISSING))?;

    let claims = session
        .codec()
        .verify(&refresh_token, TokenType::Refresh)
        .await
        .map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            ApiError::unauthorized(REFRESH_INVALID)
        })?;

    ensure_active(session.users(), &claims.sub)
        .await
        .map_err(|e| {
            debug!(error = %e, "Refresh token subject rejected");
            ApiError::unauthorized(REFRESH_INVALID)
        })?;

    let access = session.codec().issue_access(&claims).map_err(|e| {
        error!(error = %e, "Failed to issue access token");
        ApiError::unauthorized(REFRESH_INVALID)
    })?;

    let mut response = Json(inject_detail(json!({}), REFRESH_SUCCESS)).into_response();
    apply_directives(
        response.headers_mut(),
        &session.projection().issue_access_only(&access),
    );

    Ok(response)
}

/// Logout - revoke the refresh token if possible and always clear both cookies.
async fn logout<C: TokenCodec>(
    State(state): State<TokensState<C>>,
    headers: HeaderMap,
) -> Response {
    let session = &state.session;

    if let Some(refresh_token) = CookiePair::from_headers(&headers, session.settings()).refresh {
        // Expired or already revoked tokens still get their cookies cleared.
        match session.codec().revoke(&refresh_token).await {
            Ok(()) => debug!("Refresh token revoked"),
            Err(e) => debug!(error = %e, "Refresh token not revoked"),
        }
    }

    let mut response = Json(inject_detail(json!({}), LOGOUT_SUCCESS)).into_response();
    apply_directives(response.headers_mut(), &session.projection().clear_pair());
    response
}

/// Return the authenticated principal.
async fn me(Auth(user): Auth) -> Json<Principal> {
    Json(user.principal)
}
