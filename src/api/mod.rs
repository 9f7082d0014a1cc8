mod body;
mod error;
mod tokens;

use axum::Router;
use std::sync::Arc;

use crate::auth::SessionBackend;
use crate::db::Database;
use crate::jwt::TokenCodec;
use crate::rate_limit::RateLimitConfig;

pub use body::{StrippedTokens, inject_detail, strip_token_fields};
pub use error::ApiError;
pub use tokens::{
    INVALID_CREDENTIALS, LOGIN_SUCCESS, LOGOUT_SUCCESS, REFRESH_INVALID, REFRESH_MISSING,
    REFRESH_SUCCESS, TokensState,
};

/// Create the session API router (`/login`, `/refresh`, `/logout`, `/me`).
pub fn create_auth_router<C: TokenCodec>(
    session: SessionBackend<C>,
    db: Database,
    rate_limit: Arc<RateLimitConfig>,
) -> Router {
    tokens::router(TokensState {
        session,
        db,
        rate_limit,
    })
}
