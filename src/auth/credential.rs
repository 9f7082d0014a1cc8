//! Candidate credential lookup.
//!
//! Priority is fixed: an `Authorization: Bearer` header always wins over the access
//! cookie, so API and mobile clients can override a browser session.

use axum::http::{HeaderMap, header};

use super::cookie::get_token_cookie;
use crate::jwt::RawToken;

/// Pick the raw token to authenticate with, if any.
pub fn extract_credential(headers: &HeaderMap, access_cookie_name: &str) -> Option<RawToken> {
    bearer_token(headers).or_else(|| get_token_cookie(headers, access_cookie_name))
}

/// Token from `Authorization: Bearer <token>`. Other schemes and empty tokens count as absent.
fn bearer_token(headers: &HeaderMap) -> Option<RawToken> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| RawToken::from(token))
}
