//! Cookie-transported JWT session handling.
//!
//! Dual-token system: short-lived access tokens (stateless) and long-lived
//! refresh tokens (revocable). The access token is read from the
//! `Authorization: Bearer` header or the access cookie; a middleware rotates
//! near-expiry access cookies using the refresh cookie.

mod authenticator;
mod cookie;
mod credential;
mod errors;
mod extractors;
mod ip;
mod projection;
mod refresh;
mod state;
mod subject;
mod types;

pub use authenticator::SessionAuthenticator;
pub use cookie::{CookiePair, get_cookie};
pub use credential::extract_credential;
pub use errors::{ApiAuthError, NOT_AUTHENTICATED};
pub use extractors::{Auth, MaybeAuth, rotate_access_cookie};
pub use ip::extract_client_ip;
pub use projection::{
    CookieDirective, CookieLifetime, CookieProjection, apply_directives, sets_cookie,
};
pub use refresh::{RefreshDecision, RefreshPolicy, RotationFailure};
pub use state::{HasSessionBackend, SessionBackend};
pub use subject::{SubjectError, ensure_active};
pub use types::{AuthOutcome, AuthenticatedUser, Principal, RejectReason};
