//! Authentication result types.

use serde::Serialize;

use super::subject::SubjectError;
use crate::jwt::{Claims, TokenError};

/// The caller identity resolved from verified claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Token subject (user UUID)
    pub subject: String,
    pub username: Option<String>,
}

impl Principal {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            subject: claims.sub.clone(),
            username: claims.username().map(str::to_string),
        }
    }
}

/// Authenticated caller with the claims of the token that proved it.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub claims: Claims,
}

/// Why a presented credential was rejected. Logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Expired,
    Malformed,
    BadSignature,
    WrongTokenType,
    Revoked,
    /// Token is valid but its user is unknown or deactivated
    InactiveSubject,
    Unverifiable,
}

impl From<&TokenError> for RejectReason {
    fn from(e: &TokenError) -> Self {
        match e {
            TokenError::Expired => RejectReason::Expired,
            TokenError::Malformed(_) => RejectReason::Malformed,
            TokenError::BadSignature => RejectReason::BadSignature,
            TokenError::WrongTokenType => RejectReason::WrongTokenType,
            TokenError::Revoked => RejectReason::Revoked,
            TokenError::Encoding(_)
            | TokenError::InvalidLifetime
            | TokenError::RevocationUnavailable
            | TokenError::Storage(_) => RejectReason::Unverifiable,
        }
    }
}

impl From<&SubjectError> for RejectReason {
    fn from(e: &SubjectError) -> Self {
        match e {
            SubjectError::Unknown | SubjectError::Inactive => RejectReason::InactiveSubject,
            SubjectError::Lookup(_) => RejectReason::Unverifiable,
        }
    }
}

/// Result of authenticating one request.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(AuthenticatedUser),
    /// No credential presented
    Anonymous,
    Rejected(RejectReason),
}

impl AuthOutcome {
    /// The authenticated user; `Anonymous` and `Rejected` both yield `None`.
    pub fn user(self) -> Option<AuthenticatedUser> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::Anonymous | AuthOutcome::Rejected(_) => None,
        }
    }
}
