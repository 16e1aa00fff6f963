//! Keystash sweeper daemon
//!
//! Opens the cache described by the environment, keeps it locked, and purges
//! expired entries in the background until interrupted.

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keystash::{spawn_cleanup_task, Cache, Config};

/// Main entry point for the sweeper daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the configured cache (acquires the disk lock for disk caches)
/// 4. Start background TTL cleanup task
/// 5. Wait for SIGINT/SIGTERM, then stop the task and release the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keystash=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Keystash sweeper");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        "Configuration loaded: name={}, backend={:?}, dir={}, sweep_interval={}s",
        config.name,
        config.backend,
        config.directory.display(),
        config.sweep_interval
    );

    let cache = Cache::open(&config)
        .with_context(|| format!("failed to open cache '{}'", config.name))?;

    let stats = cache.stats().context("failed to read cache statistics")?;
    info!("Cache stats: {}", serde_json::to_string(&stats)?);

    let cleanup_handle = spawn_cleanup_task(cache.clone(), config.sweep_interval);
    info!("Background cleanup task started");

    shutdown_signal().await;

    cleanup_handle.abort();
    warn!("Cleanup task aborted");

    let stats = cache.stats().context("failed to read cache statistics")?;
    info!(
        "Final cache stats: {} (hit rate {:.1}%)",
        serde_json::to_string(&stats)?,
        stats.hit_rate() * 100.0
    );
    drop(cache);

    info!("Sweeper shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
