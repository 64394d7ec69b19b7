use clap::Parser;
use search_sync::blog::models::Post;
use search_sync::blog::router;
use search_sync::blog::types::BlogSettings;
use search_sync::config::Config;
use search_sync::indexing::registry::SearchRegistry;
use search_sync::indexing::service::SearchSync;
use search_sync::storage::memory::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    config.validate()?;

    // 1. Primary store:
    let db = Database::new();

    // 2. Searchable types:
    let registry = SearchRegistry::new();
    registry.register::<Post>();

    // 3. Sync layer (starts propagation workers in deferred mode):
    let sync = SearchSync::from_config(&config, db, registry)?;

    if config.reindex_on_start {
        for report in sync.rebuild_all().await {
            tracing::info!(
                "Startup reindex of '{}': {} upserted, {} failed",
                report.index,
                report.upserted,
                report.failed
            );
        }
    }

    // 4. HTTP Router:
    let app = router(
        sync.clone(),
        BlogSettings {
            posts_per_page: config.posts_per_page,
        },
    );

    // 5. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Drain deferred index writes before exiting:
    sync.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested, finishing in-flight requests"),
        Err(e) => tracing::error!("Failed to listen for Ctrl+C, shutting down: {}", e),
    }
}
