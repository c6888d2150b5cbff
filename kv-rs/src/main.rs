use anyhow::Context;
use kv_rs::api::ApiServer;
use kv_rs::config::{Config, LoggingConfig};
use kv_rs::store::SqliteStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) {
    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(Some(&config_path)).context("Failed to load configuration")?;

    init_logging(&config.logging);

    info!("Starting kv-rs server");
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Database: {}", config.storage.database_url);
    info!("  Batch accounting: {:?}", config.limits.batch_accounting);

    let store = SqliteStore::connect(&config.storage, config.limits)
        .await
        .context("Failed to open store")?;

    let server = ApiServer::new(Arc::new(store.clone()), &config);
    server.run().await.context("API server failed")?;

    store.close().await;
    info!("kv-rs stopped");

    Ok(())
}
