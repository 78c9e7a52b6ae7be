use hostecho::{MemoryItemStore, app, run};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> hostecho::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(app(MemoryItemStore::shared())).await
}
