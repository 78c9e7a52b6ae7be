use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use dotenvy::Error as DotenvError;
use hostecho_metadata::{MetadataConfig, MetadataConfigError, RetrievalPolicy};
use thiserror::Error;

use crate::deployment::Deployment;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SERVICE_TYPE: &str = "rust";
const PORT_ENV: &str = "PORT";
const SERVICE_PORT_ENV: &str = "HOSTECHO_PORT";
const ADDR_ENV: &str = "HOSTECHO_ADDR";
const SERVICE_TYPE_ENV: &str = "HOSTECHO_SERVICE_TYPE";
const METADATA_ENDPOINT_ENV: &str = "HOSTECHO_METADATA_ENDPOINT";
const METADATA_POLICY_ENV: &str = "HOSTECHO_METADATA_POLICY";
const METADATA_TTL_ENV: &str = "HOSTECHO_METADATA_TTL";
const METADATA_TIMEOUT_ENV: &str = "HOSTECHO_METADATA_TIMEOUT_MS";

/// Configuration consumed by the runtime before spinning up Axum.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Reported as the `type` field of echo bodies.
    pub service_type: String,
    pub deployment: Deployment,
    pub metadata: MetadataConfig,
}

impl ServiceConfig {
    /// Loads configuration from `HOSTECHO_*` environment variables.
    ///
    /// Values from a local `.env` file (parsed via [`dotenvy::dotenv_override`]) override
    /// whatever is already set in the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env_overrides()?;

        let addr = env_value(ADDR_ENV)
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let bind_addr = SocketAddr::new(addr, resolve_port());

        let service_type =
            env_value(SERVICE_TYPE_ENV).unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_owned());

        let mut metadata = MetadataConfig::builder();
        if let Some(endpoint) = env_value(METADATA_ENDPOINT_ENV) {
            metadata = metadata.endpoint(endpoint);
        }
        if let Some(policy) = env_value(METADATA_POLICY_ENV) {
            metadata = metadata.policy(policy.parse::<RetrievalPolicy>()?);
        }
        if let Some(ttl) = parse_env::<u32>(METADATA_TTL_ENV)? {
            metadata = metadata.token_ttl(ttl);
        }
        if let Some(millis) = parse_env::<u64>(METADATA_TIMEOUT_ENV)? {
            metadata = metadata.timeout(Duration::from_millis(millis));
        }

        Ok(Self {
            bind_addr,
            service_type,
            deployment: Deployment::detect(),
            metadata: metadata.build()?,
        })
    }

    /// Returns a builder for programmatic overrides.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

impl Default for ServiceConfig {
    /// Binds to `0.0.0.0:3000` and talks to the link-local metadata service with tokens.
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            service_type: DEFAULT_SERVICE_TYPE.to_owned(),
            deployment: Deployment::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

/// Builder type for [`ServiceConfig`].
#[derive(Default, Clone, Debug)]
pub struct ServiceConfigBuilder {
    bind_addr: Option<SocketAddr>,
    service_type: Option<String>,
    deployment: Option<Deployment>,
    metadata: Option<MetadataConfig>,
}

impl ServiceConfigBuilder {
    /// Sets the address for the embedded Axum listener.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Sets the `type` label reported by echo routes.
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn deployment(mut self, deployment: Deployment) -> Self {
        self.deployment = Some(deployment);
        self
    }

    /// Replaces the metadata client settings.
    pub fn metadata(mut self, metadata: MetadataConfig) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> ServiceConfig {
        ServiceConfig {
            bind_addr: self.bind_addr.unwrap_or_else(|| {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT)
            }),
            service_type: self
                .service_type
                .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_owned()),
            deployment: self.deployment.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
        }
    }
}

/// Errors that can occur while building [`ServiceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
    #[error(transparent)]
    Metadata(#[from] MetadataConfigError),
    #[error("failed to load .env overrides: {0}")]
    Dotenv(#[from] DotenvError),
}

fn load_env_overrides() -> Result<(), ConfigError> {
    match dotenvy::dotenv_override() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err)),
    }
}

fn env_value(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    env_value(var)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}

fn resolve_port() -> u16 {
    env_value(PORT_ENV)
        .and_then(|value| value.parse::<u16>().ok())
        .or_else(|| env_value(SERVICE_PORT_ENV).and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_PORT)
}
