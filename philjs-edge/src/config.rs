//! Middleware configuration.
//!
//! Every section has working defaults except the secrets, which must be
//! supplied. Sections deserialize from JSON with missing fields filled in.

use serde::Deserialize;

use crate::cookie::{CookieOptions, SameSite};
use crate::error::{EdgeError, Result};

/// Shortest secret accepted for signing and encryption.
pub const MIN_SECRET_LEN: usize = 32;

pub(crate) fn validate_secret(section: &str, secret: &str) -> Result<()> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(EdgeError::Config(format!(
            "{section} secret must be at least {MIN_SECRET_LEN} bytes, got {}",
            secret.len()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secret: String,
    /// Session lifetime in seconds, measured from creation.
    pub max_age: u64,
    /// Re-issue the session after this many seconds.
    pub rotate_after: Option<u64>,
    /// Encrypt the signed cookie payload.
    pub encrypt: bool,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "philjs_session".to_string(),
            secret: String::new(),
            max_age: 24 * 60 * 60,
            rotate_after: None,
            encrypt: false,
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn rotate_after(mut self, seconds: u64) -> Self {
        self.rotate_after = Some(seconds);
        self
    }

    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_secret("session", &self.secret)
    }

    /// Attributes for the session cookie.
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            path: Some(self.path.clone()),
            domain: self.domain.clone(),
            max_age: Some(self.max_age),
            secure: self.secure,
            http_only: self.http_only,
            same_site: Some(self.same_site),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Header carrying the token on unsafe requests.
    pub header_name: String,
    /// Form field carrying the token in urlencoded bodies.
    pub field_name: String,
    /// Double-submit cookie, used when no session is present.
    pub cookie_name: String,
    pub secret: String,
    pub secure: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            header_name: "x-csrf-token".to_string(),
            field_name: "_csrf".to_string(),
            cookie_name: "philjs_csrf".to_string(),
            secret: String::new(),
            secure: true,
        }
    }
}

impl CsrfConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_secret("csrf", &self.secret)
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            path: Some("/".to_string()),
            secure: self.secure,
            // Client scripts read the token from this cookie.
            http_only: false,
            same_site: Some(SameSite::Strict),
            ..CookieOptions::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket size, the largest burst a client may send.
    pub capacity: u32,
    /// Tokens added back per second.
    pub refill_per_second: f64,
    /// Path prefixes that are never limited.
    pub exclude_paths: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_per_second: 10.0,
            exclude_paths: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn new(capacity: u32, refill_per_second: f64) -> Self {
        Self {
            capacity,
            refill_per_second,
            exclude_paths: Vec::new(),
        }
    }

    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.exclude_paths.push(prefix.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let rate = self.refill_per_second;
        if self.capacity == 0 || !rate.is_finite() || rate <= 0.0 {
            return Err(EdgeError::Config(
                "rate limit capacity and refill rate must be positive and finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the whole edge stack.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub session: SessionConfig,
    pub csrf: CsrfConfig,
    pub rate_limit: RateLimitConfig,
}

impl EdgeConfig {
    /// Load and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.session.validate()?;
        config.csrf.validate()?;
        config.rate_limit.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn json_fills_in_defaults() {
        let json = format!(
            r#"{{"session": {{"secret": "{SECRET}", "encrypt": true, "same_site": "strict"}},
                "csrf": {{"secret": "{SECRET}"}},
                "rate_limit": {{"capacity": 5}}}}"#
        );
        let config = EdgeConfig::from_json(&json).unwrap();
        assert!(config.session.encrypt);
        assert_eq!(config.session.same_site, SameSite::Strict);
        assert_eq!(config.session.cookie_name, "philjs_session");
        assert_eq!(config.csrf.header_name, "x-csrf-token");
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.refill_per_second, 10.0);
    }

    #[test]
    fn rate_limits_need_a_finite_positive_rate() {
        assert!(RateLimitConfig::new(10, 1.0).validate().is_ok());
        assert!(RateLimitConfig::new(0, 1.0).validate().is_err());
        assert!(RateLimitConfig::new(10, 0.0).validate().is_err());
        assert!(RateLimitConfig::new(10, f64::NAN).validate().is_err());
        assert!(RateLimitConfig::new(10, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn short_secrets_are_rejected() {
        let err = EdgeConfig::from_json(r#"{"session": {"secret": "short"}}"#).unwrap_err();
        assert!(matches!(err, EdgeError::Config(_)));
        assert!(SessionConfig::new("short").validate().is_err());
        assert!(SessionConfig::new(SECRET).validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(RateLimitConfig::new(0, 1.0).validate().is_err());
    }
}
