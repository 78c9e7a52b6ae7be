use axum::Router;
use axum::extract::Extension;
use hostecho_metadata::{MetadataClient, RetrievalPolicy};
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::context::ServiceIdentity;
use crate::error::Result;

/// High-level runtime that wires an Axum router to the metadata client and serves it.
pub struct HostechoRuntime {
    config: ServiceConfig,
}

impl HostechoRuntime {
    /// Creates a runtime with the provided configuration.
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Consumes the runtime and starts serving the supplied router.
    pub async fn serve(self, router: Router) -> Result<()> {
        serve(router, self.config).await
    }
}

/// Adds the request extensions [`crate::EchoContext`] extracts.
pub fn install_extensions(
    router: Router,
    metadata_client: MetadataClient,
    identity: ServiceIdentity,
) -> Router {
    router
        .layer(Extension(metadata_client))
        .layer(Extension(identity))
}

/// Serves the router with the provided configuration.
pub async fn serve(router: Router, config: ServiceConfig) -> Result<()> {
    let metadata_client = MetadataClient::new(config.metadata.clone())?;
    let identity = ServiceIdentity::from_config(&config);

    let policy = metadata_client.config().policy;
    if !config.deployment.is_aws() && policy == RetrievalPolicy::TokenRequired {
        tracing::info!(
            deployment = %config.deployment,
            "not running on aws; machine ids will likely be unknown"
        );
    }

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        deployment = %config.deployment,
        metadata_endpoint = %metadata_client.config().endpoint,
        metadata_policy = %policy,
        "hostecho listening"
    );

    let router = install_extensions(router, metadata_client, identity);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("hostecho stopped");
    Ok(())
}

/// Loads [`ServiceConfig`] from the environment and starts serving the router.
pub async fn run(router: Router) -> Result<()> {
    let config = ServiceConfig::from_env()?;
    serve(router, config).await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::Deployment;
    use crate::routes::app;
    use crate::store::MemoryItemStore;
    use hostecho_metadata::MetadataConfig;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    #[tokio::test]
    async fn runtime_serves_until_aborted() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ServiceConfig::builder()
            .bind_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
            .deployment(Deployment::Custom("test".into()))
            .metadata(
                MetadataConfig::builder()
                    .endpoint(crate::test_support::unreachable_metadata())
                    .timeout(Duration::from_millis(200))
                    .build()
                    .unwrap(),
            )
            .build();
        let runtime = HostechoRuntime::new(config);
        assert_eq!(runtime.config().bind_addr.port(), port);

        let handle = tokio::spawn(runtime.serve(app(MemoryItemStore::shared())));

        let mut connected = false;
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                connected = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert!(connected, "runtime never accepted connections");
    }
}
