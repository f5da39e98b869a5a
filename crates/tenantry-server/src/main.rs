//! Tenantry Server: application entry point.

use anyhow::Context;
use surrealdb::{Connection, Surreal};
use tenantry_core::repository::SharedCache;
use tenantry_db::DbManager;
use tenantry_server::{AppConfig, CacheBackend, Engine};
use tenantry_service::MemoryCache;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .json()
        .init();

    info!("Starting tenantry server...");

    let manager = DbManager::connect(&config.db)
        .await
        .context("connecting to SurrealDB")?;
    manager.migrate().await.context("running migrations")?;
    let db = manager.client().clone();

    match config.cache.backend {
        CacheBackend::Memory => {
            let cache = MemoryCache::new();
            let purger = {
                let cache = cache.clone();
                let period = config.cache.purge_interval();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    loop {
                        ticker.tick().await;
                        cache.purge_expired();
                    }
                })
            };
            serve(db, cache, &config).await?;
            purger.abort();
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let cache =
                tenantry_service::RedisCache::connect(&config.cache.url, &config.cache.key_prefix)
                    .await
                    .context("connecting to Redis")?;
            serve(db, cache, &config).await?;
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => {
            anyhow::bail!("cache backend \"redis\" requires building with the `redis` feature");
        }
    }

    info!("Tenantry server stopped.");
    Ok(())
}

async fn serve<D: Connection, C: SharedCache>(
    db: Surreal<D>,
    cache: C,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let _engine = Engine::new(db, cache, &config.service);
    info!(
        backend = ?config.cache.backend,
        max_attempts = config.service.max_attempts,
        "Tenantry engine ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");
    Ok(())
}
