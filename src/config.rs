//! Authentication settings resolved once at startup.
//!
//! Everything here is immutable after `AuthSettings::validate` succeeds and is shared
//! across request handlers behind an `Arc`.

use std::fmt;
use std::str::FromStr;

/// Default name of the cookie carrying the access token.
pub const DEFAULT_ACCESS_COOKIE_NAME: &str = "access_token";

/// Default name of the cookie carrying the refresh token.
pub const DEFAULT_REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Access cookie max-age: 5 minutes
pub const DEFAULT_ACCESS_MAX_AGE_SECS: u64 = 5 * 60;

/// Refresh cookie max-age: 1 day
pub const DEFAULT_REFRESH_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Rotate the access token when it expires in this many seconds or less.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 60;

/// Upper bound for token lifetimes: 10 years
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(ConfigError::UnknownSameSite(s.to_string())),
        }
    }
}

/// Security attributes shared by the access and refresh cookies.
///
/// Only the max-age differs between the two cookies. Clearing reuses the same
/// `path` and `domain`, otherwise browsers keep the old cookie around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieProfile {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    /// `None` scopes the cookie to the current host.
    pub domain: Option<String>,
    pub access_max_age: u64,
    pub refresh_max_age: u64,
}

impl Default for CookieProfile {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            domain: None,
            access_max_age: DEFAULT_ACCESS_MAX_AGE_SECS,
            refresh_max_age: DEFAULT_REFRESH_MAX_AGE_SECS,
        }
    }
}

/// Complete configuration for the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub profile: CookieProfile,
    /// Seconds before access token expiry at which rotation kicks in.
    pub refresh_threshold: u64,
    /// Lifetime (`exp - iat`) of minted access tokens.
    pub access_lifetime: u64,
    /// Lifetime (`exp - iat`) of minted refresh tokens.
    pub refresh_lifetime: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_cookie: DEFAULT_ACCESS_COOKIE_NAME.to_string(),
            refresh_cookie: DEFAULT_REFRESH_COOKIE_NAME.to_string(),
            profile: CookieProfile::default(),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD_SECS,
            access_lifetime: DEFAULT_ACCESS_MAX_AGE_SECS,
            refresh_lifetime: DEFAULT_REFRESH_MAX_AGE_SECS,
        }
    }
}

impl AuthSettings {
    /// Check the settings for values that would break cookie handling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_cookie_name("access", &self.access_cookie)?;
        validate_cookie_name("refresh", &self.refresh_cookie)?;
        if self.access_cookie == self.refresh_cookie {
            return Err(ConfigError::DuplicateCookieName(self.access_cookie.clone()));
        }

        let profile = &self.profile;
        if !profile.path.starts_with('/') || has_attribute_breaking_chars(&profile.path) {
            return Err(ConfigError::InvalidPath(profile.path.clone()));
        }
        if let Some(domain) = &profile.domain {
            if domain.is_empty() || has_attribute_breaking_chars(domain) {
                return Err(ConfigError::InvalidDomain(domain.clone()));
            }
        }

        for (name, value) in [
            ("access max-age", profile.access_max_age),
            ("refresh max-age", profile.refresh_max_age),
            ("access lifetime", self.access_lifetime),
            ("refresh lifetime", self.refresh_lifetime),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        for (name, value) in [
            ("access lifetime", self.access_lifetime),
            ("refresh lifetime", self.refresh_lifetime),
        ] {
            if value > MAX_TOKEN_LIFETIME_SECS {
                return Err(ConfigError::LifetimeTooLong(name));
            }
        }

        // Otherwise every freshly issued access token is already due for rotation.
        if self.refresh_threshold >= self.access_lifetime {
            return Err(ConfigError::ThresholdNotBelowLifetime {
                threshold: self.refresh_threshold,
                lifetime: self.access_lifetime,
            });
        }

        // Browsers drop SameSite=None cookies that are not Secure.
        if profile.same_site == SameSite::None && !profile.secure {
            return Err(ConfigError::InsecureSameSiteNone);
        }

        Ok(())
    }
}

fn validate_cookie_name(which: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyCookieName(which));
    }
    // RFC 6265 cookie-name is an RFC 2616 token.
    let valid = name.bytes().all(|b| {
        b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
    });
    if !valid {
        return Err(ConfigError::InvalidCookieName(name.to_string()));
    }
    Ok(())
}

fn has_attribute_breaking_chars(value: &str) -> bool {
    value.chars().any(|c| c == ';' || c.is_whitespace() || c.is_control())
}

/// Invalid configuration detected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyCookieName(&'static str),
    InvalidCookieName(String),
    DuplicateCookieName(String),
    InvalidPath(String),
    InvalidDomain(String),
    ZeroDuration(&'static str),
    LifetimeTooLong(&'static str),
    ThresholdNotBelowLifetime { threshold: u64, lifetime: u64 },
    InsecureSameSiteNone,
    UnknownSameSite(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyCookieName(which) => write!(f, "The {} cookie name is empty", which),
            ConfigError::InvalidCookieName(name) => write!(f, "Invalid cookie name: {}", name),
            ConfigError::DuplicateCookieName(name) => {
                write!(f, "Access and refresh cookies share the name {}", name)
            }
            ConfigError::InvalidPath(path) => write!(f, "Invalid cookie path: {}", path),
            ConfigError::InvalidDomain(domain) => write!(f, "Invalid cookie domain: {}", domain),
            ConfigError::ZeroDuration(name) => write!(f, "The {} must be greater than zero", name),
            ConfigError::LifetimeTooLong(name) => write!(
                f,
                "The {} must not exceed {} seconds",
                name, MAX_TOKEN_LIFETIME_SECS
            ),
            ConfigError::ThresholdNotBelowLifetime {
                threshold,
                lifetime,
            } => write!(
                f,
                "The refresh threshold ({}s) must be shorter than the access lifetime ({}s)",
                threshold, lifetime
            ),
            ConfigError::InsecureSameSiteNone => {
                write!(f, "SameSite=None requires the Secure cookie attribute")
            }
            ConfigError::UnknownSameSite(value) => {
                write!(f, "Unknown SameSite value (expected Strict, Lax or None): {}", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = AuthSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.access_cookie, "access_token");
        assert_eq!(settings.refresh_cookie, "refresh_token");
        assert_eq!(settings.refresh_threshold, 60);
        assert_eq!(settings.profile.access_max_age, 300);
        assert_eq!(settings.profile.refresh_max_age, 86400);
        assert!(settings.profile.http_only);
        assert!(settings.profile.secure);
        assert_eq!(settings.profile.same_site, SameSite::Lax);
        assert_eq!(settings.profile.path, "/");
        assert_eq!(settings.profile.domain, None);
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!("strict".parse::<SameSite>(), Ok(SameSite::Strict));
        assert_eq!("Lax".parse::<SameSite>(), Ok(SameSite::Lax));
        assert_eq!("NONE".parse::<SameSite>(), Ok(SameSite::None));
        assert!("relaxed".parse::<SameSite>().is_err());
    }

    #[test]
    fn test_duplicate_cookie_names_rejected() {
        let settings = AuthSettings {
            refresh_cookie: "access_token".to_string(),
            ..AuthSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::DuplicateCookieName("access_token".to_string()))
        );
    }

    #[test]
    fn test_invalid_cookie_names_rejected() {
        for name in ["", "has space", "semi;colon", "eq=uals"] {
            let settings = AuthSettings {
                access_cookie: name.to_string(),
                ..AuthSettings::default()
            };
            assert!(settings.validate().is_err(), "{:?} should be rejected", name);
        }
    }

    #[test]
    fn test_zero_max_age_rejected() {
        let mut settings = AuthSettings::default();
        settings.profile.refresh_max_age = 0;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::ZeroDuration("refresh max-age"))
        );
    }

    #[test]
    fn test_path_must_be_absolute() {
        let mut settings = AuthSettings::default();
        settings.profile.path = "api".to_string();
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidPath(_))));

        settings.profile.path = "/api; Domain=evil".to_string();
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidPath(_))));
    }

    #[test]
    fn test_same_site_none_requires_secure() {
        let mut settings = AuthSettings::default();
        settings.profile.same_site = SameSite::None;
        settings.profile.secure = false;
        assert_eq!(settings.validate(), Err(ConfigError::InsecureSameSiteNone));

        settings.profile.secure = true;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_lifetime_bounds() {
        let mut settings = AuthSettings::default();
        settings.refresh_lifetime = u64::MAX;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::LifetimeTooLong("refresh lifetime"))
        );

        settings.refresh_lifetime = MAX_TOKEN_LIFETIME_SECS;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_threshold_must_be_below_access_lifetime() {
        let mut settings = AuthSettings::default();
        settings.refresh_threshold = settings.access_lifetime;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::ThresholdNotBelowLifetime {
                threshold: 300,
                lifetime: 300,
            })
        );

        settings.refresh_threshold = 0;
        assert!(settings.validate().is_ok());
    }
}
