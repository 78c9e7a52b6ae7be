use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Link-local address of the instance metadata service.
pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";
/// Token lifetime requested when nothing else is configured (6 hours).
pub const DEFAULT_TOKEN_TTL_SECS: u32 = 21_600;
/// Largest token lifetime the metadata service accepts.
pub const MAX_TOKEN_TTL_SECS: u32 = 21_600;
/// Upper bound applied to every outbound metadata call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Selects whether attribute reads are preceded by a session token handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RetrievalPolicy {
    /// Acquire a session token first and refuse to read metadata without one.
    #[default]
    TokenRequired,
    /// Read attributes directly with no token header.
    Direct,
}

impl FromStr for RetrievalPolicy {
    type Err = MetadataConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("token")
            || value.eq_ignore_ascii_case("token-required")
            || value.eq_ignore_ascii_case("imdsv2")
        {
            return Ok(RetrievalPolicy::TokenRequired);
        }

        if value.eq_ignore_ascii_case("direct") || value.eq_ignore_ascii_case("imdsv1") {
            return Ok(RetrievalPolicy::Direct);
        }

        Err(MetadataConfigError::InvalidPolicy(value.to_owned()))
    }
}

impl fmt::Display for RetrievalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalPolicy::TokenRequired => f.write_str("token-required"),
            RetrievalPolicy::Direct => f.write_str("direct"),
        }
    }
}

/// Settings shared by every request a [`crate::MetadataClient`] issues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataConfig {
    /// Base URL of the metadata service, without a trailing slash.
    pub endpoint: String,
    pub policy: RetrievalPolicy,
    /// Requested token lifetime in seconds.
    pub token_ttl: u32,
    /// Timeout for each individual outbound call.
    pub timeout: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            policy: RetrievalPolicy::default(),
            token_ttl: DEFAULT_TOKEN_TTL_SECS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl MetadataConfig {
    /// Returns a builder for programmatic overrides.
    pub fn builder() -> MetadataConfigBuilder {
        MetadataConfigBuilder::default()
    }
}

/// Builder type for [`MetadataConfig`].
#[derive(Default, Clone, Debug)]
pub struct MetadataConfigBuilder {
    endpoint: Option<String>,
    policy: Option<RetrievalPolicy>,
    token_ttl: Option<u32>,
    timeout: Option<Duration>,
}

impl MetadataConfigBuilder {
    /// Points the client at a different metadata service (tests, local emulators).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the session token lifetime in seconds.
    pub fn token_ttl(mut self, seconds: u32) -> Self {
        self.token_ttl = Some(seconds);
        self
    }

    /// Sets the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates and builds the final configuration.
    pub fn build(self) -> Result<MetadataConfig, MetadataConfigError> {
        let endpoint = self
            .endpoint
            .map(|value| value.trim().trim_end_matches('/').to_owned())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        if endpoint.is_empty() {
            return Err(MetadataConfigError::EmptyEndpoint);
        }

        let token_ttl = self.token_ttl.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        validate_token_ttl(token_ttl)?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(MetadataConfigError::ZeroTimeout);
        }

        Ok(MetadataConfig {
            endpoint,
            policy: self.policy.unwrap_or_default(),
            token_ttl,
            timeout,
        })
    }
}

/// Errors that can occur while building [`MetadataConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataConfigError {
    #[error("invalid metadata retrieval policy: {0}")]
    InvalidPolicy(String),
    #[error("token ttl must be between 1 and 21600 seconds, got {0}")]
    InvalidTokenTtl(u32),
    #[error("metadata endpoint must not be empty")]
    EmptyEndpoint,
    #[error("metadata timeout must be greater than zero")]
    ZeroTimeout,
}

pub(crate) fn validate_token_ttl(seconds: u32) -> Result<(), MetadataConfigError> {
    if (1..=MAX_TOKEN_TTL_SECS).contains(&seconds) {
        Ok(())
    } else {
        Err(MetadataConfigError::InvalidTokenTtl(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_link_local_service() {
        let config = MetadataConfig::default();
        assert_eq!(config.endpoint, "http://169.254.169.254");
        assert_eq!(config.policy, RetrievalPolicy::TokenRequired);
        assert_eq!(config.token_ttl, 21_600);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(MetadataConfig::builder().build(), Ok(config));
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let config = MetadataConfig::builder()
            .endpoint("http://127.0.0.1:9000/")
            .policy(RetrievalPolicy::Direct)
            .timeout(Duration::from_millis(250))
            .build()
            .unwrap();

        assert_eq!(config.endpoint, "http://127.0.0.1:9000");
        assert_eq!(config.policy, RetrievalPolicy::Direct);
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn builder_rejects_out_of_range_ttl() {
        assert_eq!(
            MetadataConfig::builder().token_ttl(0).build(),
            Err(MetadataConfigError::InvalidTokenTtl(0))
        );
        assert_eq!(
            MetadataConfig::builder().token_ttl(21_601).build(),
            Err(MetadataConfigError::InvalidTokenTtl(21_601))
        );
        assert!(MetadataConfig::builder().token_ttl(1).build().is_ok());
    }

    #[test]
    fn builder_rejects_empty_endpoint_and_zero_timeout() {
        assert_eq!(
            MetadataConfig::builder().endpoint(" / ").build(),
            Err(MetadataConfigError::EmptyEndpoint)
        );
        assert_eq!(
            MetadataConfig::builder().timeout(Duration::ZERO).build(),
            Err(MetadataConfigError::ZeroTimeout)
        );
    }

    #[test]
    fn parses_policy_strings() {
        assert_eq!(
            "token".parse::<RetrievalPolicy>(),
            Ok(RetrievalPolicy::TokenRequired)
        );
        assert_eq!(
            " IMDSv2 ".parse::<RetrievalPolicy>(),
            Ok(RetrievalPolicy::TokenRequired)
        );
        assert_eq!("direct".parse::<RetrievalPolicy>(), Ok(RetrievalPolicy::Direct));
        assert_eq!(
            "sometimes".parse::<RetrievalPolicy>(),
            Err(MetadataConfigError::InvalidPolicy("sometimes".into()))
        );
    }
}
