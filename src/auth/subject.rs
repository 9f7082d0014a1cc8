//! Account status of a token's subject.
//!
//! A valid signature only proves the token was issued; the user behind it may
//! have been deactivated or deleted since. Both authentication and access token
//! issuance consult the user store before trusting the subject.

use std::fmt;

use crate::db::UserStore;

/// Why a token subject may not hold a session.
#[derive(Debug)]
pub enum SubjectError {
    Unknown,
    Inactive,
    Lookup(sqlx::Error),
}

impl fmt::Display for SubjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectError::Unknown => write!(f, "Token subject does not exist"),
            SubjectError::Inactive => write!(f, "Token subject is deactivated"),
            SubjectError::Lookup(e) => write!(f, "Failed to look up token subject: {}", e),
        }
    }
}

impl std::error::Error for SubjectError {}

/// Check that `subject` names an existing, active user.
/// Without a user store every subject is accepted.
pub async fn ensure_active(users: Option<&UserStore>, subject: &str) -> Result<(), SubjectError> {
    let Some(users) = users else {
        return Ok(());
    };

    match users.get_by_uuid(subject).await {
        Ok(Some(user)) if user.active => Ok(()),
        Ok(Some(_)) => Err(SubjectError::Inactive),
        Ok(None) => Err(SubjectError::Unknown),
        Err(e) => Err(SubjectError::Lookup(e)),
    }
}
