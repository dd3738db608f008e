use std::fmt;
use std::time::Duration;

use crate::{DelayConfig, Result};

/// Level gating for the stock logging hooks.
///
/// Levels are bit sets: a configured level enables a message level when it
/// contains all of its bits. `DEBUG` implies `ERROR`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LogLevel(u16);

impl LogLevel {
    pub const OFF: Self = Self(0);
    pub const ERROR: Self = Self(0x0100);
    pub const DEBUG: Self = Self(0x1000 | Self::ERROR.0);
    /// Debug plus request and response body dumps.
    pub const DEBUG_WITH_HTTP_BODY: Self = Self(Self::DEBUG.0 | 0x0002);
    /// Debug plus a notice before every retry.
    pub const DEBUG_WITH_REQUEST_RETRIES: Self = Self(Self::DEBUG.0 | 0x0004);

    pub fn matches(self, level: Self) -> bool {
        level.0 != 0 && self.0 & level.0 == level.0
    }

    pub fn is_off(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for LogLevel {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Endpoint, transport and retry settings shared by every request of a
/// client. Immutable once wrapped in an `Arc`.
#[derive(Clone)]
pub struct Config {
    /// Base endpoint; a missing scheme is filled in from `disable_ssl`.
    pub endpoint: String,
    pub http: reqwest::Client,
    /// Use `http://` instead of `https://` for scheme-less endpoints.
    pub disable_ssl: bool,
    pub follow_redirects: bool,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Full `Authorization` header value.
    pub authorization: Option<String>,
    pub log_level: LogLevel,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    pub max_retry_elapsed: Option<Duration>,
    pub retry_delay: DelayConfig,
    pub retry_error_codes: Vec<String>,
    custom_http: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("disable_ssl", &self.disable_ssl)
            .field("follow_redirects", &self.follow_redirects)
            .field("timeout_ms", &self.timeout_ms)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("log_level", &self.log_level)
            .field("max_retries", &self.max_retries)
            .field("max_retry_elapsed", &self.max_retry_elapsed)
            .field("retry_delay", &self.retry_delay)
            .field("retry_error_codes", &self.retry_error_codes)
            .finish()
    }
}

impl Config {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
            disable_ssl: false,
            follow_redirects: true,
            timeout_ms: 10_000,
            authorization: None,
            log_level: LogLevel::OFF,
            max_retries: 0,
            max_retry_elapsed: None,
            retry_delay: DelayConfig::default(),
            retry_error_codes: Vec::new(),
            custom_http: false,
        }
    }

    /// Sets a raw authorization value, e.g. `"Basic ..."`.
    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    /// Sets a bearer token. The `Bearer ` prefix is added when missing.
    pub fn with_bearer(self, token: impl AsRef<str>) -> Self {
        let authorization = normalize_bearer_authorization(token.as_ref());
        self.with_authorization(authorization)
    }

    pub fn with_disable_ssl(mut self, disable_ssl: bool) -> Self {
        self.disable_ssl = disable_ssl;
        self
    }

    /// Replaces the transport client. The supplied client's own redirect
    /// policy applies from then on, whatever the redirect toggle says.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self.custom_http = true;
        self
    }

    /// Rebuilds the default transport client with the given redirect
    /// behavior. A client supplied through [`Self::with_http_client`] is
    /// kept as is, in either call order; only the toggle is recorded.
    pub fn with_follow_redirects(mut self, follow: bool) -> Result<Self> {
        if !self.custom_http {
            let policy = if follow {
                reqwest::redirect::Policy::default()
            } else {
                reqwest::redirect::Policy::none()
            };
            self.http = reqwest::Client::builder().redirect(policy).build()?;
        }
        self.follow_redirects = follow;
        Ok(self)
    }

    pub fn has_custom_http_client(&self) -> bool {
        self.custom_http
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_retry_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_retry_elapsed = Some(max_elapsed);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: DelayConfig) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_retry_error_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retry_error_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Endpoint with its scheme resolved and trailing slashes removed.
    pub fn resolved_endpoint(&self) -> String {
        resolve_endpoint(&self.endpoint, self.disable_ssl)
    }
}

pub(crate) fn resolve_endpoint(endpoint: &str, disable_ssl: bool) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.contains("://") {
        return trimmed.to_owned();
    }
    let scheme = if disable_ssl { "http" } else { "https" };
    format!("{scheme}://{trimmed}")
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_bearer_authorization, resolve_endpoint, Config, LogLevel};

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(
            normalize_bearer_authorization("abc123"),
            "Bearer abc123".to_owned()
        );
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123".to_owned()
        );
    }

    #[test]
    fn debug_redacts_authorization_value() {
        let config = Config::new("https://api.example.com").with_bearer("secret-token");
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn scheme_follows_ssl_toggle() {
        assert_eq!(
            resolve_endpoint("api.example.com/", false),
            "https://api.example.com"
        );
        assert_eq!(
            resolve_endpoint("api.example.com", true),
            "http://api.example.com"
        );
        assert_eq!(
            resolve_endpoint("http://127.0.0.1:8080//", false),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn redirect_toggle_rebuilds_client() {
        let config = Config::new("https://api.example.com")
            .with_follow_redirects(false)
            .expect("client must build");
        assert!(!config.follow_redirects);
        assert!(!config.has_custom_http_client());
    }

    #[test]
    fn redirect_toggle_keeps_supplied_client() {
        let config = Config::new("https://api.example.com")
            .with_http_client(reqwest::Client::new())
            .with_follow_redirects(false)
            .expect("toggle must apply");
        assert!(!config.follow_redirects);
        assert!(config.has_custom_http_client());
    }

    #[test]
    fn log_levels_nest() {
        let level = LogLevel::DEBUG_WITH_HTTP_BODY;
        assert!(level.matches(LogLevel::DEBUG));
        assert!(level.matches(LogLevel::ERROR));
        assert!(!level.matches(LogLevel::DEBUG_WITH_REQUEST_RETRIES));
        assert!(!LogLevel::ERROR.matches(LogLevel::DEBUG));
        assert!(!LogLevel::DEBUG.matches(LogLevel::OFF));
        assert!((LogLevel::DEBUG_WITH_HTTP_BODY | LogLevel::DEBUG_WITH_REQUEST_RETRIES)
            .matches(LogLevel::DEBUG_WITH_REQUEST_RETRIES));
    }
}
