//! ttl_cache demo
//!
//! Opens a cache from environment configuration, exercises it briefly, then
//! waits for a shutdown signal and closes it (saving a snapshot when
//! `CACHE_SAVE_ON_CLOSE=true`).

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::{Cache, CacheConfig, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env().context("failed to read cache configuration")?;
    info!("Configuration loaded: {:?}", config);

    let cache = Cache::new(config).context("failed to open cache")?;

    cache.set("greeting", "hello")?;
    cache.set_with_expire("session", 42, Some(Duration::from_secs(60)))?;

    if let Some(Value::Str(greeting)) = cache.get("greeting") {
        info!("greeting = {}", greeting);
    }
    if let Some((value, ttl)) = cache.get_with_expire("session") {
        info!("session = {:?}, expires in {:?}", value, ttl);
    }
    info!("{} keys in cache, stats: {:?}", cache.size(), cache.stats());

    shutdown_signal().await;

    cache.close().await.context("failed to close cache")?;
    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
