//! Best-effort client for the link-local cloud instance metadata service.
//!
//! Lookups never fail loudly: a missing service (local development, non-cloud hosts), a
//! network partition, or a slow response all surface as `None` after a single, time-bounded
//! attempt, with the underlying cause logged through `tracing`.

mod client;
mod config;
mod error;
mod types;

pub use crate::client::{MetadataClient, PRIVATE_IPV4_ATTRIBUTE};
pub use crate::config::{
    DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, DEFAULT_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS, MetadataConfig,
    MetadataConfigBuilder, MetadataConfigError, RetrievalPolicy,
};
pub use crate::error::MetadataError;
pub use crate::types::{MetadataToken, MetadataValue};
