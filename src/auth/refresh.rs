//! Write path: should the access token be rotated before the response leaves?

use std::fmt;

use super::subject::{SubjectError, ensure_active};
use crate::db::UserStore;
use crate::jwt::{RawToken, TokenCodec, TokenError, TokenType};

/// Outcome of the rotation check for one exchange.
#[derive(Debug)]
pub enum RefreshDecision {
    NoOp,
    Rotated(RawToken),
    Failed(RotationFailure),
}

/// Why rotation did not happen. Advisory only: the next request's
/// authentication is what actually rejects the caller.
#[derive(Debug)]
pub enum RotationFailure {
    RefreshRejected(TokenError),
    SubjectRejected(SubjectError),
    IssueFailed(TokenError),
}

impl fmt::Display for RotationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationFailure::RefreshRejected(e) => write!(f, "Refresh token rejected: {}", e),
            RotationFailure::SubjectRejected(e) => write!(f, "Refresh token subject rejected: {}", e),
            RotationFailure::IssueFailed(e) => write!(f, "Failed to issue access token: {}", e),
        }
    }
}

/// Decides when a near-expiry access token is replaced using the refresh token.
#[derive(Clone)]
pub struct RefreshPolicy {
    threshold: u64,
    users: Option<UserStore>,
}

impl RefreshPolicy {
    pub fn new(threshold_secs: u64) -> Self {
        Self {
            threshold: threshold_secs,
            users: None,
        }
    }

    /// Only rotate for subjects that exist and are active in `users`.
    pub fn with_user_store(mut self, users: UserStore) -> Self {
        self.users = Some(users);
        self
    }

    /// Run the rotation state machine for one exchange.
    ///
    /// The access token is only decoded, not verified: its signature is irrelevant
    /// here because the new token is derived from the refresh token's claims, and
    /// the refresh token is fully verified (signature, expiry, revocation).
    pub async fn maybe_refresh<C: TokenCodec>(
        &self,
        codec: &C,
        access: Option<&RawToken>,
        refresh: Option<&RawToken>,
        now: u64,
    ) -> RefreshDecision {
        let (Some(access), Some(refresh)) = (access, refresh) else {
            return RefreshDecision::NoOp;
        };

        match codec.decode(access) {
            Ok(claims) if claims.remaining(now) > self.threshold as i64 => {
                return RefreshDecision::NoOp;
            }
            Ok(_) => {}
            // Unreadable access cookie: treat as expired so a valid refresh token heals it.
            Err(e) => tracing::debug!(error = %e, "Access token could not be decoded"),
        }

        let refresh_claims = match codec.verify(refresh, TokenType::Refresh).await {
            Ok(claims) => claims,
            Err(e) => return RefreshDecision::Failed(RotationFailure::RefreshRejected(e)),
        };

        if let Err(e) = ensure_active(self.users.as_ref(), &refresh_claims.sub).await {
            return RefreshDecision::Failed(RotationFailure::SubjectRejected(e));
        }

        match codec.issue_access(&refresh_claims) {
            Ok(token) => RefreshDecision::Rotated(token),
            Err(e) => RefreshDecision::Failed(RotationFailure::IssueFailed(e)),
        }
    }
}
