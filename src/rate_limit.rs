//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to prevent brute force attacks.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for the login endpoint.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts
    pub login: Arc<IpLimiter>,
    /// Key clients by `X-Forwarded-For` instead of the socket address
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    /// Allow `login_per_minute` attempts per IP per minute, with the same burst.
    pub fn new(login_per_minute: u32, trust_forwarded_for: bool) -> Self {
        let per_minute = NonZeroU32::new(login_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            trust_forwarded_for,
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = extract_client_ip(
        request.headers(),
        request.extensions(),
        config.trust_forwarded_for,
    ) else {
        return ApiError::forbidden("Unable to determine client IP.").into_response();
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Login rate limit exceeded");
            ApiError::too_many_requests("Too many requests").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_blocks_after_quota() {
        let config = RateLimitConfig::new(2, false);
        let ip = "10.0.0.1".to_string();

        assert!(config.login.check_key(&ip).is_ok());
        assert!(config.login.check_key(&ip).is_ok());
        assert!(config.login.check_key(&ip).is_err());

        // Other clients have their own bucket
        assert!(config.login.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let config = RateLimitConfig::new(0, false);
        assert!(config.login.check_key(&"10.0.0.1".to_string()).is_ok());
    }
}
