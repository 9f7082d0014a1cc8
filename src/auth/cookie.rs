//! Cookie parsing for the inbound `Cookie` header.

use axum::http::{HeaderMap, header};

use crate::config::AuthSettings;
use crate::jwt::RawToken;

/// Extract a cookie value from the Cookie header.
/// Surrounding double quotes are removed; the first matching cookie wins.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = value.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    let value = value.trim();
                    return Some(
                        value
                            .strip_prefix('"')
                            .and_then(|v| v.strip_suffix('"'))
                            .unwrap_or(value),
                    );
                }
            }
        }
    }
    None
}

/// Non-empty cookie value as a token.
pub(super) fn get_token_cookie(headers: &HeaderMap, name: &str) -> Option<RawToken> {
    get_cookie(headers, name)
        .filter(|value| !value.is_empty())
        .map(RawToken::from)
}

/// The access and refresh cookies presented on an inbound request.
#[derive(Debug, Clone, Default)]
pub struct CookiePair {
    pub access: Option<RawToken>,
    pub refresh: Option<RawToken>,
}

impl CookiePair {
    pub fn from_headers(headers: &HeaderMap, settings: &AuthSettings) -> Self {
        Self {
            access: get_token_cookie(headers, &settings.access_cookie),
            refresh: get_token_cookie(headers, &settings.refresh_cookie),
        }
    }
}
