//! JWT token issuance, verification and revocation.
//!
//! The session layer only talks to tokens through the [`TokenCodec`] trait.
//! [`JwtCodec`] is the HS256 implementation backed by `jsonwebtoken`, with refresh
//! token revocation tracked in the database by JTI. Access tokens are stateless
//! and never hit the database.

use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AuthSettings;
use crate::db::RevokedTokenStore;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived, authorizes requests directly
    Access,
    /// Long-lived, authorizes minting new access tokens
    Refresh,
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// JWT ID, used for revocation
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Custom claims carried over when a refresh token mints an access token
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Claims template for a subject. `issue_*` fill in type, JTI and timestamps.
    pub fn for_subject(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            token_type: TokenType::Access,
            jti: String::new(),
            iat: 0,
            exp: 0,
            extra: Map::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.extra.get("username").and_then(Value::as_str)
    }

    /// Seconds until expiry; negative once expired.
    pub fn remaining(&self, now: u64) -> i64 {
        self.exp as i64 - now as i64
    }
}

/// An opaque signed token string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawToken(String);

impl RawToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for RawToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for RawToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

// Tokens are credentials, keep them out of debug logs.
impl std::fmt::Debug for RawToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawToken(..{} bytes)", self.0.len())
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Token signing, verification and revocation capability.
pub trait TokenCodec: Send + Sync + 'static {
    /// Check signature, expiry, token type and (for refresh tokens) revocation.
    fn verify(
        &self,
        raw: &RawToken,
        expected: TokenType,
    ) -> impl Future<Output = Result<Claims, TokenError>> + Send;

    /// Read the claims without any integrity or expiry check.
    fn decode(&self, raw: &RawToken) -> Result<Claims, TokenError>;

    /// Mint an access token carrying the subject and custom claims of `claims`.
    fn issue_access(&self, claims: &Claims) -> Result<RawToken, TokenError>;

    /// Mint a refresh token carrying the subject and custom claims of `claims`.
    fn issue_refresh(&self, claims: &Claims) -> Result<RawToken, TokenError>;

    /// Make a refresh token unusable before its natural expiry.
    fn revoke(&self, raw: &RawToken) -> impl Future<Output = Result<(), TokenError>> + Send;
}

/// HS256 codec with database-backed refresh token revocation.
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: u64,
    refresh_lifetime: u64,
    revocations: Option<RevokedTokenStore>,
}

impl JwtCodec {
    /// Create a codec signing with `secret`, using the token lifetimes from `settings`.
    pub fn new(secret: &[u8], settings: &AuthSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_lifetime: settings.access_lifetime,
            refresh_lifetime: settings.refresh_lifetime,
            revocations: None,
        }
    }

    /// Track revoked refresh tokens in `store`.
    pub fn with_revocation_store(mut self, store: RevokedTokenStore) -> Self {
        self.revocations = Some(store);
        self
    }

    /// Sign claims as-is.
    pub fn sign(&self, claims: &Claims) -> Result<RawToken, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map(RawToken)
            .map_err(TokenError::Encoding)
    }

    fn mint(&self, template: &Claims, token_type: TokenType) -> Result<RawToken, TokenError> {
        let now = unix_now();
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };

        let claims = Claims {
            sub: template.sub.clone(),
            token_type,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now.checked_add(lifetime).ok_or(TokenError::InvalidLifetime)?,
            extra: template.extra.clone(),
        };

        self.sign(&claims)
    }
}

impl TokenCodec for JwtCodec {
    async fn verify(&self, raw: &RawToken, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(raw.as_str(), &self.decoding_key, &validation)
            .map_err(TokenError::from_decode)?
            .claims;

        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType);
        }

        if expected == TokenType::Refresh {
            if let Some(store) = &self.revocations {
                match store.is_revoked(&claims.jti).await {
                    Ok(false) => {}
                    Ok(true) => return Err(TokenError::Revoked),
                    Err(e) => {
                        // Fail closed: an unreadable revocation list must not admit tokens.
                        tracing::error!(error = %e, "Failed to check refresh token revocation");
                        return Err(TokenError::Revoked);
                    }
                }
            }
        }

        Ok(claims)
    }

    fn decode(&self, raw: &RawToken) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Claims>(raw.as_str(), &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::from_decode)
    }

    fn issue_access(&self, claims: &Claims) -> Result<RawToken, TokenError> {
        self.mint(claims, TokenType::Access)
    }

    fn issue_refresh(&self, claims: &Claims) -> Result<RawToken, TokenError> {
        self.mint(claims, TokenType::Refresh)
    }

    async fn revoke(&self, raw: &RawToken) -> Result<(), TokenError> {
        let claims = self.verify(raw, TokenType::Refresh).await?;
        let store = self
            .revocations
            .as_ref()
            .ok_or(TokenError::RevocationUnavailable)?;

        store
            .revoke(&claims.jti, claims.exp)
            .await
            .map_err(|e| TokenError::Storage(e.to_string()))?;

        Ok(())
    }
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Signature valid but `exp` is in the past
    Expired,
    /// Signature does not match the key
    BadSignature,
    /// Not a structurally valid JWT, or claims missing
    Malformed(jsonwebtoken::errors::Error),
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
    /// Refresh token was revoked
    Revoked,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// No revocation store configured
    RevocationUnavailable,
    /// Revocation store failed
    Storage(String),
    /// The configured lifetime pushes `exp` past the timestamp range
    InvalidLifetime,
}

impl TokenError {
    fn from_decode(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed(e),
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::BadSignature => write!(f, "Invalid token signature"),
            TokenError::Malformed(e) => write!(f, "Malformed token: {}", e),
            TokenError::WrongTokenType => write!(f, "Wrong token type"),
            TokenError::Revoked => write!(f, "Token has been revoked"),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::RevocationUnavailable => write!(f, "No revocation store configured"),
            TokenError::Storage(e) => write!(f, "Revocation store error: {}", e),
            TokenError::InvalidLifetime => {
                write!(f, "Token lifetime overflows the expiry timestamp")
            }
        }
    }
}

impl std::error::Error for TokenError {}
