mod api;
mod cli;
mod config_feed;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gridcache_cache::{CacheStore, MemoryStore};
use gridcache_refresh::{HttpGridFetcher, RefreshPipeline};
use gridcache_scheduler::TokioTimer;
use gridcache_sync::SyncService;

use crate::state::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl_c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    gridcache_core::config::load_dotenv();
    let config = cli::Cli::parse().into_config();
    config.log_summary();

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let fetcher = HttpGridFetcher::from_config(&config.fetch)?;
    let pipeline = Arc::new(RefreshPipeline::new(Arc::new(fetcher), Arc::clone(&store)));
    let sync = Arc::new(SyncService::new(Arc::new(TokioTimer::new()), pipeline));

    let sources_file = &config.sources.file;
    if sources_file.exists() {
        let report = config_feed::apply_file(sources_file, &sync).await?;
        info!(sources = report.added.len(), "initial configuration applied");
    } else {
        warn!(path = %sources_file.display(), "sources file not found, starting with no sources");
    }

    let _watcher = if config.sources.watch {
        Some(config_feed::watch(sources_file, Arc::clone(&sync))?)
    } else {
        None
    };

    let state = Arc::new(AppState::new(Arc::clone(&sync), store));
    let app = router::build_router(state, &config.server.cors_origin);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sync.shutdown().await;
    Ok(())
}
