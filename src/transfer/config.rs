//! Per-transfer configuration.
//!
//! A [`TransferConfig`] is the option snapshot handed to the engine when a
//! transfer starts. The orchestration layer never interprets it beyond the
//! URL used for engine bookkeeping; everything here exists for the engine.

use bytes::Bytes;
use std::time::Duration;
use url::Url;

use crate::base::multierror::MultiError;

/// Browser profiles the engine knows how to impersonate.
///
/// Matches the target list of the native engine build we ship against.
pub const KNOWN_PROFILES: &[&str] = &[
    "chrome99",
    "chrome100",
    "chrome101",
    "chrome104",
    "chrome107",
    "chrome110",
    "chrome116",
    "chrome119",
    "chrome120",
    "chrome123",
    "chrome124",
    "chrome131",
    "chrome133a",
    "chrome136",
    "chrome99_android",
    "edge99",
    "edge101",
    "safari15_3",
    "safari15_5",
    "safari17_0",
    "safari18_0",
    "firefox133",
    "firefox135",
];

/// Configuration snapshot for one transfer.
///
/// Immutable once the transfer starts; the session clones it out of the
/// handle at start time and the engine reads it through `&TransferConfig`.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    url: Url,
    method: String,
    headers: Vec<String>,
    body: Option<Bytes>,
    impersonate: Option<String>,
    impersonate_default_headers: bool,
    verify_tls: bool,
    follow_redirects: bool,
    max_redirects: u32,
    timeout: Option<Duration>,
}

impl TransferConfig {
    /// Create a configuration for the given URL.
    pub fn new(url: &str) -> Result<Self, MultiError> {
        let url = Url::parse(url).map_err(|_| MultiError::InvalidUrl)?;
        Ok(Self {
            url,
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            impersonate: None,
            impersonate_default_headers: true,
            verify_tls: true,
            follow_redirects: true,
            max_redirects: 30,
            timeout: None,
        })
    }

    /// Set the request method. Stored verbatim; the engine validates it.
    pub fn set_method(&mut self, method: &str) -> &mut Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    /// Append one raw header line (`"Name: value"`). Order is preserved;
    /// impersonation profiles are sensitive to it.
    pub fn add_header(&mut self, line: &str) -> &mut Self {
        self.headers.push(line.to_string());
        self
    }

    /// Set the request body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Select a browser impersonation profile, e.g. `"chrome136"`.
    ///
    /// With `default_headers` the engine injects the profile's full header
    /// set; without it only the TLS/HTTP fingerprint is emulated and headers
    /// come solely from [`add_header`](Self::add_header).
    pub fn impersonate(&mut self, profile: &str, default_headers: bool) -> Result<&mut Self, MultiError> {
        if !KNOWN_PROFILES.contains(&profile) {
            return Err(MultiError::UnknownProfile(profile.to_string()));
        }
        self.impersonate = Some(profile.to_string());
        self.impersonate_default_headers = default_headers;
        Ok(self)
    }

    /// Toggle TLS certificate verification.
    pub fn set_verify_tls(&mut self, verify: bool) -> &mut Self {
        self.verify_tls = verify;
        self
    }

    /// Toggle redirect following and cap the redirect chain length.
    pub fn set_follow_redirects(&mut self, follow: bool, max: u32) -> &mut Self {
        self.follow_redirects = follow;
        self.max_redirects = max;
        self
    }

    /// Overall transfer deadline. `None` means no limit.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn impersonate_profile(&self) -> Option<&str> {
        self.impersonate.as_deref()
    }

    pub fn impersonate_default_headers(&self) -> bool {
        self.impersonate_default_headers
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn follow_redirects(&self) -> (bool, u32) {
        (self.follow_redirects, self.max_redirects)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url() {
        let res = TransferConfig::new("not-a-url");
        assert!(matches!(res, Err(MultiError::InvalidUrl)));
    }

    #[test]
    fn test_defaults() {
        let config = TransferConfig::new("https://example.com/").unwrap();
        assert_eq!(config.method(), "GET");
        assert!(config.verify_tls());
        assert!(config.headers().is_empty());
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_header_order_preserved() {
        let mut config = TransferConfig::new("https://example.com/").unwrap();
        config
            .add_header("Accept: */*")
            .add_header("X-First: 1")
            .add_header("X-Second: 2");
        assert_eq!(
            config.headers(),
            &["Accept: */*", "X-First: 1", "X-Second: 2"]
        );
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let mut config = TransferConfig::new("https://example.com/").unwrap();
        let res = config.impersonate("netscape4", true);
        assert!(matches!(res, Err(MultiError::UnknownProfile(_))));

        config.impersonate("chrome136", true).unwrap();
        assert_eq!(config.impersonate_profile(), Some("chrome136"));
    }
}
