//! Read path: who is the caller?

use std::sync::Arc;

use axum::http::HeaderMap;

use super::credential::extract_credential;
use super::subject::ensure_active;
use super::types::{AuthOutcome, AuthenticatedUser, Principal, RejectReason};
use crate::db::UserStore;
use crate::jwt::{TokenCodec, TokenType};

/// Resolves the caller of a request from its bearer header or access cookie.
///
/// Verification failures are outcomes, not errors: the request carries on and
/// the handler decides whether it needs an authenticated caller.
pub struct SessionAuthenticator<C> {
    codec: Arc<C>,
    access_cookie: String,
    users: Option<UserStore>,
}

impl<C> Clone for SessionAuthenticator<C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            access_cookie: self.access_cookie.clone(),
            users: self.users.clone(),
        }
    }
}

impl<C: TokenCodec> SessionAuthenticator<C> {
    pub fn new(codec: Arc<C>, access_cookie: impl Into<String>) -> Self {
        Self {
            codec,
            access_cookie: access_cookie.into(),
            users: None,
        }
    }

    /// Reject tokens whose subject is unknown or deactivated in `users`.
    pub fn with_user_store(mut self, users: UserStore) -> Self {
        self.users = Some(users);
        self
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let Some(candidate) = extract_credential(headers, &self.access_cookie) else {
            return AuthOutcome::Anonymous;
        };

        let claims = match self.codec.verify(&candidate, TokenType::Access).await {
            Ok(claims) => claims,
            Err(e) => {
                let reason = RejectReason::from(&e);
                tracing::debug!(?reason, error = %e, "Rejected access token");
                return AuthOutcome::Rejected(reason);
            }
        };

        if let Err(e) = ensure_active(self.users.as_ref(), &claims.sub).await {
            let reason = RejectReason::from(&e);
            tracing::debug!(?reason, error = %e, "Rejected access token subject");
            return AuthOutcome::Rejected(reason);
        }

        AuthOutcome::Authenticated(AuthenticatedUser {
            principal: Principal::from_claims(&claims),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;
    use crate::jwt::{Claims, JwtCodec, unix_now};
    use axum::http::{HeaderValue, header};

    fn authenticator() -> (SessionAuthenticator<JwtCodec>, Arc<JwtCodec>) {
        let codec = Arc::new(JwtCodec::new(b"test-secret", &AuthSettings::default()));
        (SessionAuthenticator::new(codec.clone(), "access_token"), codec)
    }

    fn cookie_headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_no_credential_is_anonymous() {
        let (auth, _) = authenticator();
        assert!(matches!(
            auth.authenticate(&HeaderMap::new()).await,
            AuthOutcome::Anonymous
        ));
    }

    #[tokio::test]
    async fn test_valid_cookie_authenticates() {
        let (auth, codec) = authenticator();
        let token = codec
            .issue_access(&Claims::for_subject("uuid-1").with_claim("username", "alice"))
            .unwrap();

        let headers = cookie_headers(&format!("access_token={}", token.as_str()));
        let user = auth.authenticate(&headers).await.user().unwrap();
        assert_eq!(user.principal.subject, "uuid-1");
        assert_eq!(user.principal.username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_header_identity_beats_cookie_identity() {
        let (auth, codec) = authenticator();
        let from_header = codec.issue_access(&Claims::for_subject("header-user")).unwrap();
        let from_cookie = codec.issue_access(&Claims::for_subject("cookie-user")).unwrap();

        let mut headers = cookie_headers(&format!("access_token={}", from_cookie.as_str()));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", from_header.as_str())).unwrap(),
        );

        let user = auth.authenticate(&headers).await.user().unwrap();
        assert_eq!(user.principal.subject, "header-user");
    }

    #[tokio::test]
    async fn test_invalid_header_does_not_fall_back_to_cookie() {
        let (auth, codec) = authenticator();
        let from_cookie = codec.issue_access(&Claims::for_subject("cookie-user")).unwrap();

        let mut headers = cookie_headers(&format!("access_token={}", from_cookie.as_str()));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));

        assert!(matches!(
            auth.authenticate(&headers).await,
            AuthOutcome::Rejected(RejectReason::Malformed)
        ));
    }

    #[tokio::test]
    async fn test_expired_and_malformed_are_both_rejected() {
        let (auth, codec) = authenticator();
        let now = unix_now();
        let mut claims = Claims::for_subject("uuid-1");
        claims.iat = now - 600;
        claims.exp = now - 10;
        let expired = codec.sign(&claims).unwrap();

        for cookie in [
            format!("access_token={}", expired.as_str()),
            "access_token=not-a-token".to_string(),
        ] {
            let outcome = auth.authenticate(&cookie_headers(&cookie)).await;
            assert!(matches!(outcome, AuthOutcome::Rejected(_)));
            assert!(outcome.user().is_none());
        }
    }

    #[tokio::test]
    async fn test_deactivated_subject_is_rejected() {
        let db = crate::db::Database::open(":memory:").await.unwrap();
        let id = db.users().create("uuid-1", "alice", "hash").await.unwrap();
        let (auth, codec) = authenticator();
        let auth = auth.with_user_store(db.users());

        let token = codec.issue_access(&Claims::for_subject("uuid-1")).unwrap();
        let headers = cookie_headers(&format!("access_token={}", token.as_str()));
        assert!(auth.authenticate(&headers).await.user().is_some());

        db.users().set_active(id, false).await.unwrap();
        assert!(matches!(
            auth.authenticate(&headers).await,
            AuthOutcome::Rejected(RejectReason::InactiveSubject)
        ));

        let stranger = codec.issue_access(&Claims::for_subject("uuid-2")).unwrap();
        let headers = cookie_headers(&format!("access_token={}", stranger.as_str()));
        assert!(matches!(
            auth.authenticate(&headers).await,
            AuthOutcome::Rejected(RejectReason::InactiveSubject)
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_credential() {
        let (auth, codec) = authenticator();
        let refresh = codec.issue_refresh(&Claims::for_subject("uuid-1")).unwrap();

        let headers = cookie_headers(&format!("access_token={}", refresh.as_str()));
        assert!(matches!(
            auth.authenticate(&headers).await,
            AuthOutcome::Rejected(RejectReason::WrongTokenType)
        ));
    }
}
