//! Shared session backend and the state trait the extractors rely on.

use std::sync::Arc;

use super::authenticator::SessionAuthenticator;
use super::projection::CookieProjection;
use super::refresh::RefreshPolicy;
use crate::config::AuthSettings;
use crate::db::UserStore;
use crate::jwt::TokenCodec;

struct BackendInner<C> {
    settings: AuthSettings,
    codec: Arc<C>,
    users: Option<UserStore>,
    authenticator: SessionAuthenticator<C>,
    policy: RefreshPolicy,
    projection: CookieProjection,
}

/// Everything a request needs for session handling, built once at startup.
/// Cloning is cheap and shares the same immutable configuration.
pub struct SessionBackend<C> {
    inner: Arc<BackendInner<C>>,
}

impl<C> Clone for SessionBackend<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: TokenCodec> SessionBackend<C> {
    /// With a user store, tokens whose subject is unknown or deactivated neither
    /// authenticate nor mint new access tokens.
    pub fn new(settings: AuthSettings, codec: C, users: Option<UserStore>) -> Self {
        let codec = Arc::new(codec);
        let mut authenticator = SessionAuthenticator::new(codec.clone(), &settings.access_cookie);
        let mut policy = RefreshPolicy::new(settings.refresh_threshold);
        if let Some(users) = &users {
            authenticator = authenticator.with_user_store(users.clone());
            policy = policy.with_user_store(users.clone());
        }
        let projection = CookieProjection::new(&settings);

        Self {
            inner: Arc::new(BackendInner {
                settings,
                codec,
                users,
                authenticator,
                policy,
                projection,
            }),
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.inner.settings
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    pub fn users(&self) -> Option<&UserStore> {
        self.inner.users.as_ref()
    }

    pub fn authenticator(&self) -> &SessionAuthenticator<C> {
        &self.inner.authenticator
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.inner.policy
    }

    pub fn projection(&self) -> &CookieProjection {
        &self.inner.projection
    }
}

/// Trait for state types that provide the session backend.
pub trait HasSessionBackend {
    type Codec: TokenCodec;

    fn session(&self) -> &SessionBackend<Self::Codec>;
}

impl<C: TokenCodec> HasSessionBackend for SessionBackend<C> {
    type Codec = C;

    fn session(&self) -> &SessionBackend<C> {
        self
    }
}
