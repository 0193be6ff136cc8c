//! Resource Cache - standalone cache host
//!
//! Opens the cache namespaces, warms them, and keeps them swept and persisted
//! until asked to stop.

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resource_cache::{AppContext, Config, FileStorage, HttpFetcher, ProcessMemorySampler};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open file storage, the HTTP fetcher and the memory sampler
/// 4. Start the application context (opens caches, preloads critical
///    resources, starts the memory pressure task)
/// 5. Prefetch configured routes
/// 6. Wait for SIGINT/SIGTERM, then destroy every cache, flushing snapshots
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resource Cache");

    let config = Config::from_env();
    info!(
        storage_dir = %config.storage_dir.display(),
        component_max = config.component.max_size,
        data_max = config.data.max_size,
        image_max = config.image.max_size,
        "Configuration loaded"
    );

    let backend = Arc::new(FileStorage::new(config.storage_dir.clone()));
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_base_url.clone())?);
    let sampler = Arc::new(ProcessMemorySampler::new(config.memory_budget_bytes));

    let ctx = AppContext::start(&config, backend, fetcher, sampler).await;
    info!("Caches ready");

    let prefetches: Vec<_> = config
        .prefetch_routes
        .iter()
        .filter_map(|route| ctx.optimizer.prefetch_route(route))
        .collect();
    if !prefetches.is_empty() {
        info!(routes = prefetches.len(), "Prefetching routes");
    }

    shutdown_signal().await;

    for task in prefetches {
        task.abort();
    }
    ctx.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that fails to install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
