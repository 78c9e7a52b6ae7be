//! hostecho runtime crate.
//!
//! An Axum service that echoes request details together with the host's private IP, read
//! from the cloud instance metadata service, and exposes a small in-memory `/items` resource.
//! Metadata lookups are best-effort: when the service is unreachable the echo still succeeds
//! with a `null` machine id.

pub mod config;
pub mod context;
pub mod deployment;
pub mod error;
pub mod routes;
pub mod runtime;
pub mod store;

pub use crate::config::{ConfigError, ServiceConfig, ServiceConfigBuilder};
pub use crate::context::{EchoContext, RequestInfo, ServiceIdentity};
pub use crate::deployment::Deployment;
pub use crate::error::{HostechoError, Result};
pub use crate::routes::app;
pub use crate::runtime::{HostechoRuntime, install_extensions, run, serve};
pub use crate::store::{ItemStore, MemoryItemStore, SharedItemStore, StoreError};
pub use hostecho_metadata::{
    MetadataClient, MetadataConfig, MetadataToken, MetadataValue, RetrievalPolicy,
};
