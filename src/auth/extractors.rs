//! Axum extractors for authentication and the passive rotation middleware.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::cookie::CookiePair;
use super::errors::ApiAuthError;
use super::projection::{apply_directives, sets_cookie};
use super::refresh::RefreshDecision;
use super::state::{HasSessionBackend, SessionBackend};
use super::types::AuthenticatedUser;
use crate::jwt::{TokenCodec, unix_now};

/// Extractor for endpoints that require an authenticated caller.
/// Missing and invalid credentials are rejected the same way, with a JSON 401.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasSessionBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        state
            .session()
            .authenticator()
            .authenticate(&parts.headers)
            .await
            .user()
            .map(Auth)
            .ok_or(ApiAuthError)
    }
}

/// Optional authentication extractor - never fails.
/// Useful for endpoints that work both authenticated and unauthenticated.
pub struct MaybeAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasSessionBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let outcome = state
            .session()
            .authenticator()
            .authenticate(&parts.headers)
            .await;
        Ok(MaybeAuth(outcome.user()))
    }
}

/// Middleware that rotates a near-expiry access cookie after the handler ran.
///
/// The decision is made from the cookies the request arrived with. A cookie is only
/// written once the policy returned `Rotated`; rotation failures are logged and
/// otherwise ignored, leaving rejection to the next request's authentication.
pub async fn rotate_access_cookie<C: TokenCodec>(
    State(session): State<SessionBackend<C>>,
    request: Request,
    next: Next,
) -> Response {
    let cookies = CookiePair::from_headers(request.headers(), session.settings());
    let mut response = next.run(request).await;

    // Login, refresh and logout manage the access cookie themselves.
    if sets_cookie(response.headers(), &session.settings().access_cookie) {
        return response;
    }

    let decision = session
        .policy()
        .maybe_refresh(
            session.codec(),
            cookies.access.as_ref(),
            cookies.refresh.as_ref(),
            unix_now(),
        )
        .await;

    match decision {
        RefreshDecision::NoOp => {}
        RefreshDecision::Rotated(token) => {
            let directives = session.projection().issue_access_only(&token);
            apply_directives(response.headers_mut(), &directives);
            tracing::debug!("Rotated access token");
        }
        RefreshDecision::Failed(reason) => {
            tracing::debug!(reason = %reason, "Access token rotation failed");
        }
    }

    response
}
