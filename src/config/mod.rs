//! Configuration module for the network client.
//!
//! Holds the agent string, connect/read timeouts and an optional default
//! endpoint. Timeouts are whole seconds; `0` disables the limit, matching the
//! byte-pump engines this crate fronts.

use std::time::Duration;

use crate::errors::{TransportError, TransportResult};

/// Default user agent sent with every request.
pub const DEFAULT_AGENT_NAME: &str = concat!(
    "integrations-timestamp-transport/",
    env!("CARGO_PKG_VERSION")
);

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default read (whole transfer) timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Longest URL accepted by [`NetworkClient::send`](crate::NetworkClient::send).
pub const MAX_URL_LEN: usize = 8192;

/// Largest response body accepted by default.
pub const DEFAULT_MAX_RESPONSE_LEN: usize = u32::MAX as usize;

/// Configuration for the network client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// User agent, `None` to send the engine's own.
    pub agent_name: Option<String>,
    /// Connect timeout in seconds (`0` = no limit).
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds (`0` = no limit).
    pub read_timeout_secs: u64,
    /// Default endpoint used by [`NetworkClient::send_default`](crate::NetworkClient::send_default).
    pub url_template: Option<String>,
    /// Report HTTP status >= 400 as an HTTP-level failure instead of a body.
    pub fail_on_http_error: bool,
    /// Upper bound on the accumulated response length.
    pub max_response_len: usize,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TIMESTAMP_HTTP_AGENT` (optional): User agent
    /// - `TIMESTAMP_HTTP_CONNECT_TIMEOUT` (optional): Connect timeout in seconds
    /// - `TIMESTAMP_HTTP_READ_TIMEOUT` (optional): Read timeout in seconds
    /// - `TIMESTAMP_HTTP_URL` (optional): Default endpoint
    pub fn from_env() -> TransportResult<Self> {
        let mut builder = ClientConfigBuilder::new();

        if let Ok(agent) = std::env::var("TIMESTAMP_HTTP_AGENT") {
            builder = builder.agent_name(agent);
        }

        if let Ok(secs) = std::env::var("TIMESTAMP_HTTP_CONNECT_TIMEOUT") {
            builder = builder.connect_timeout_secs(parse_secs("TIMESTAMP_HTTP_CONNECT_TIMEOUT", &secs)?);
        }

        if let Ok(secs) = std::env::var("TIMESTAMP_HTTP_READ_TIMEOUT") {
            builder = builder.read_timeout_secs(parse_secs("TIMESTAMP_HTTP_READ_TIMEOUT", &secs)?);
        }

        if let Ok(url) = std::env::var("TIMESTAMP_HTTP_URL") {
            builder = builder.url_template(url);
        }

        builder.build()
    }

    /// Connect timeout as a duration, `None` when unlimited.
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.connect_timeout_secs)
    }

    /// Read timeout as a duration, `None` when unlimited.
    pub fn read_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.read_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            agent_name: Some(DEFAULT_AGENT_NAME.to_string()),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            url_template: None,
            fail_on_http_error: true,
            max_response_len: DEFAULT_MAX_RESPONSE_LEN,
        }
    }
}

fn secs_to_duration(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

fn parse_secs(var: &str, value: &str) -> TransportResult<u64> {
    value.trim().parse::<u64>().map_err(|e| {
        TransportError::invalid_argument(format!("{} is not a number of seconds: {}", var, e))
    })
}

/// Checks a URL before it is copied into a transfer context.
pub(crate) fn validate_url(url: &str) -> TransportResult<()> {
    if url.is_empty() {
        return Err(TransportError::invalid_argument("URL cannot be empty"));
    }
    if url.len() > MAX_URL_LEN {
        return Err(TransportError::invalid_argument(format!(
            "URL is {} bytes, limit is {}",
            url.len(),
            MAX_URL_LEN
        )));
    }
    if url.contains('\0') {
        return Err(TransportError::invalid_argument("URL contains a NUL byte"));
    }
    Ok(())
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    agent_name: Option<Option<String>>,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
    url_template: Option<String>,
    fail_on_http_error: Option<bool>,
    max_response_len: Option<usize>,
}

impl ClientConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user agent.
    pub fn agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(Some(agent_name.into()));
        self
    }

    /// Sends no user agent of our own.
    pub fn no_agent_name(mut self) -> Self {
        self.agent_name = Some(None);
        self
    }

    /// Sets the connect timeout in seconds.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Sets the read timeout in seconds.
    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = Some(secs);
        self
    }

    /// Sets the default endpoint.
    pub fn url_template(mut self, url: impl Into<String>) -> Self {
        self.url_template = Some(url.into());
        self
    }

    /// Controls whether HTTP status >= 400 is reported as an HTTP failure.
    pub fn fail_on_http_error(mut self, enabled: bool) -> Self {
        self.fail_on_http_error = Some(enabled);
        self
    }

    /// Sets the response size limit.
    pub fn max_response_len(mut self, len: usize) -> Self {
        self.max_response_len = Some(len);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> TransportResult<ClientConfig> {
        let defaults = ClientConfig::default();

        let agent_name = self.agent_name.unwrap_or(defaults.agent_name);
        if matches!(&agent_name, Some(agent) if agent.is_empty()) {
            return Err(TransportError::invalid_argument("Agent name cannot be empty"));
        }

        if let Some(url) = &self.url_template {
            validate_url(url)?;
        }

        let max_response_len = self.max_response_len.unwrap_or(defaults.max_response_len);
        if max_response_len == 0 {
            return Err(TransportError::invalid_argument(
                "Maximum response length must be positive",
            ));
        }

        Ok(ClientConfig {
            agent_name,
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            read_timeout_secs: self.read_timeout_secs.unwrap_or(defaults.read_timeout_secs),
            url_template: self.url_template,
            fail_on_http_error: self.fail_on_http_error.unwrap_or(defaults.fail_on_http_error),
            max_response_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_config_builder_defaults() {
        let config = ClientConfig::builder().build().unwrap();

        assert_eq!(config.agent_name.as_deref(), Some(DEFAULT_AGENT_NAME));
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.read_timeout_secs, DEFAULT_READ_TIMEOUT_SECS);
        assert!(config.url_template.is_none());
        assert!(config.fail_on_http_error);
        assert_eq!(config.max_response_len, DEFAULT_MAX_RESPONSE_LEN);
    }

    #[test]
    fn test_config_builder_success() {
        let config = ClientConfig::builder()
            .agent_name("signer/2.1")
            .connect_timeout_secs(3)
            .read_timeout_secs(7)
            .url_template("https://tsa.example.com/gt-signingservice")
            .fail_on_http_error(false)
            .max_response_len(1 << 20)
            .build()
            .unwrap();

        assert_eq!(config.agent_name.as_deref(), Some("signer/2.1"));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(7)));
        assert_eq!(
            config.url_template.as_deref(),
            Some("https://tsa.example.com/gt-signingservice")
        );
        assert!(!config.fail_on_http_error);
        assert_eq!(config.max_response_len, 1 << 20);
    }

    #[test]
    fn test_zero_timeout_is_unlimited() {
        let config = ClientConfig::builder()
            .connect_timeout_secs(0)
            .read_timeout_secs(0)
            .build()
            .unwrap();

        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.read_timeout(), None);
    }

    #[test]
    fn test_no_agent_name() {
        let config = ClientConfig::builder().no_agent_name().build().unwrap();
        assert!(config.agent_name.is_none());
    }

    #[test]
    fn test_empty_agent_name_rejected() {
        assert!(ClientConfig::builder().agent_name("").build().is_err());
    }

    #[test]
    fn test_zero_response_limit_rejected() {
        assert!(ClientConfig::builder().max_response_len(0).build().is_err());
    }

    #[test_case("" ; "empty")]
    #[test_case("http://host/\0path" ; "interior nul")]
    fn test_invalid_url(url: &str) {
        assert!(validate_url(url).is_err());
    }

    #[test]
    fn test_overlong_url() {
        let url = format!("http://host/{}", "a".repeat(MAX_URL_LEN));
        assert!(validate_url(&url).is_err());
    }

    #[test]
    fn test_valid_url() {
        assert!(validate_url("https://example/test").is_ok());
    }

    // The only test touching these variables; every case runs in sequence
    // here because the environment is process-wide.
    #[test]
    fn test_from_env() {
        const VARS: [&str; 4] = [
            "TIMESTAMP_HTTP_AGENT",
            "TIMESTAMP_HTTP_CONNECT_TIMEOUT",
            "TIMESTAMP_HTTP_READ_TIMEOUT",
            "TIMESTAMP_HTTP_URL",
        ];

        std::env::set_var("TIMESTAMP_HTTP_AGENT", "env-signer/3.0");
        std::env::set_var("TIMESTAMP_HTTP_CONNECT_TIMEOUT", "4");
        std::env::set_var("TIMESTAMP_HTTP_READ_TIMEOUT", " 0 ");
        std::env::set_var("TIMESTAMP_HTTP_URL", "https://tsa.example.com/gt-signingservice");

        let config = ClientConfig::from_env();

        std::env::set_var("TIMESTAMP_HTTP_CONNECT_TIMEOUT", "soon");
        let invalid = ClientConfig::from_env();

        for var in VARS {
            std::env::remove_var(var);
        }
        let defaults = ClientConfig::from_env();

        let config = config.unwrap();
        assert_eq!(config.agent_name.as_deref(), Some("env-signer/3.0"));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(4)));
        assert_eq!(config.read_timeout(), None);
        assert_eq!(
            config.url_template.as_deref(),
            Some("https://tsa.example.com/gt-signingservice")
        );

        let err = invalid.unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::InvalidArgument);
        assert!(err
            .diagnostic()
            .is_some_and(|d| d.contains("TIMESTAMP_HTTP_CONNECT_TIMEOUT")));

        assert_eq!(defaults.unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("X", " 15 ").unwrap(), 15);
        assert!(parse_secs("X", "soon").is_err());
    }
}
