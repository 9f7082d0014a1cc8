//! Mapping of token-set operations onto `Set-Cookie` directives.
//!
//! Every directive is rendered from the single `CookieProfile` held by the
//! projection, so the path and domain used to clear a cookie always match the
//! ones it was issued with.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::config::{AuthSettings, CookieProfile, SameSite};
use crate::jwt::RawToken;

const EXPIRED_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Cookie lifetime carried by a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieLifetime {
    MaxAge(u64),
    Expired,
}

/// A single cookie write or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    pub name: String,
    /// Empty when the cookie is being cleared
    pub value: String,
    pub lifetime: CookieLifetime,
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieDirective {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_string(&self) -> String {
        let mut cookie = format!("{}={}", self.name, self.value);
        match self.lifetime {
            CookieLifetime::MaxAge(secs) => cookie.push_str(&format!("; Max-Age={}", secs)),
            CookieLifetime::Expired => {
                cookie.push_str(&format!("; Expires={}; Max-Age=0", EXPIRED_DATE))
            }
        }
        cookie.push_str(&format!("; Path={}", self.path));
        if let Some(domain) = &self.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie
    }
}

/// Produces cookie directives for the access/refresh pair.
#[derive(Debug, Clone)]
pub struct CookieProjection {
    access_cookie: String,
    refresh_cookie: String,
    profile: CookieProfile,
}

impl CookieProjection {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            access_cookie: settings.access_cookie.clone(),
            refresh_cookie: settings.refresh_cookie.clone(),
            profile: settings.profile.clone(),
        }
    }

    /// Set both cookies (login).
    pub fn issue_pair(&self, access: &RawToken, refresh: &RawToken) -> Vec<CookieDirective> {
        vec![
            self.directive(
                &self.access_cookie,
                access.as_str(),
                CookieLifetime::MaxAge(self.profile.access_max_age),
            ),
            self.directive(
                &self.refresh_cookie,
                refresh.as_str(),
                CookieLifetime::MaxAge(self.profile.refresh_max_age),
            ),
        ]
    }

    /// Set only the access cookie (refresh endpoint and rotation).
    pub fn issue_access_only(&self, access: &RawToken) -> Vec<CookieDirective> {
        vec![self.directive(
            &self.access_cookie,
            access.as_str(),
            CookieLifetime::MaxAge(self.profile.access_max_age),
        )]
    }

    /// Expire both cookies (logout).
    pub fn clear_pair(&self) -> Vec<CookieDirective> {
        vec![
            self.directive(&self.access_cookie, "", CookieLifetime::Expired),
            self.directive(&self.refresh_cookie, "", CookieLifetime::Expired),
        ]
    }

    fn directive(&self, name: &str, value: &str, lifetime: CookieLifetime) -> CookieDirective {
        CookieDirective {
            name: name.to_string(),
            value: value.to_string(),
            lifetime,
            path: self.profile.path.clone(),
            domain: self.profile.domain.clone(),
            http_only: self.profile.http_only,
            secure: self.profile.secure,
            same_site: self.profile.same_site,
        }
    }
}

/// Append directives to a response as `Set-Cookie` headers.
pub fn apply_directives(headers: &mut HeaderMap, directives: &[CookieDirective]) {
    for directive in directives {
        match HeaderValue::from_str(&directive.to_header_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::error!(cookie = %directive.name, error = %e, "Invalid Set-Cookie value");
            }
        }
    }
}

/// Whether the headers already carry a `Set-Cookie` for `name`.
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split_once('=').is_some_and(|(key, _)| key.trim() == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection() -> CookieProjection {
        let mut settings = AuthSettings::default();
        settings.profile.domain = Some("example.com".to_string());
        settings.profile.path = "/app".to_string();
        CookieProjection::new(&settings)
    }

    #[test]
    fn test_issue_pair_renders_profile() {
        let directives = projection().issue_pair(&RawToken::from("aaa"), &RawToken::from("rrr"));
        assert_eq!(directives.len(), 2);
        assert_eq!(
            directives[0].to_header_string(),
            "access_token=aaa; Max-Age=300; Path=/app; Domain=example.com; HttpOnly; Secure; SameSite=Lax"
        );
        assert_eq!(
            directives[1].to_header_string(),
            "refresh_token=rrr; Max-Age=86400; Path=/app; Domain=example.com; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn test_issue_access_only() {
        let directives = projection().issue_access_only(&RawToken::from("aaa"));
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].name, "access_token");
        assert_eq!(directives[0].lifetime, CookieLifetime::MaxAge(300));
    }

    #[test]
    fn test_clear_pair_matches_issue_scope() {
        let projection = projection();
        let issued = projection.issue_pair(&RawToken::from("aaa"), &RawToken::from("rrr"));
        let cleared = projection.clear_pair();

        assert_eq!(cleared.len(), 2);
        for (set, clear) in issued.iter().zip(&cleared) {
            assert_eq!(set.name, clear.name);
            assert_eq!(set.path, clear.path);
            assert_eq!(set.domain, clear.domain);
            assert_eq!(clear.value, "");
            assert_eq!(clear.lifetime, CookieLifetime::Expired);
        }
        assert_eq!(
            cleared[0].to_header_string(),
            "access_token=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/app; Domain=example.com; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn test_insecure_profile_omits_flags() {
        let mut settings = AuthSettings::default();
        settings.profile.secure = false;
        settings.profile.http_only = false;
        settings.profile.same_site = SameSite::Strict;

        let directive = &CookieProjection::new(&settings).issue_access_only(&RawToken::from("a"))[0];
        assert_eq!(
            directive.to_header_string(),
            "access_token=a; Max-Age=300; Path=/; SameSite=Strict"
        );
    }

    #[test]
    fn test_apply_and_detect_directives() {
        let mut headers = HeaderMap::new();
        apply_directives(&mut headers, &projection().clear_pair());

        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
        assert!(sets_cookie(&headers, "access_token"));
        assert!(sets_cookie(&headers, "refresh_token"));
        assert!(!sets_cookie(&headers, "access"));
    }
}
