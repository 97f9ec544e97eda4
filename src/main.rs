//! Vector Tile Server - Mapbox Vector Tiles from tabular datasets.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vector_tile_server::{
    config::Config,
    server::create_router,
    source::JsonRowSource,
    tile::{MemoryTileStore, MvtTileEncoder, TileAssembler, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    run_serve(config).await
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: Config) -> ExitCode {
    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let policy = match config.cache_policy() {
        Ok(policy) => policy,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("vector-tile-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Data directory: {}", config.data_dir.display());
    info!(
        "  Layers: points='{}', polygons='{}'",
        config.points_layer, config.polygons_layer
    );
    info!(
        "  Encoding: extent={}, buffer={}, min polygon area={}",
        config.extent, config.buffer, config.min_polygonal_extent
    );
    info!(
        "  Cache: zooms 0-{}, default TTL {}h, bands '{}'",
        policy.max_cache_zoom, config.cache_default_ttl_hours, config.cache_ttl_bands
    );

    if !config.data_dir.is_dir() {
        error!(
            "Data directory {} does not exist or is not a directory",
            config.data_dir.display()
        );
        return ExitCode::FAILURE;
    }

    let assembler = match TileAssembler::new(config.tile_settings()) {
        Ok(assembler) => assembler,
        Err(e) => {
            error!("Failed to start feature workers: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("  Workers: {}", assembler.workers());

    // Cache store with a background sweep of expired entries
    let shutdown = CancellationToken::new();
    let store = Arc::new(MemoryTileStore::new());
    let purge_task = store
        .clone()
        .spawn_purge_task(config.purge_interval(), shutdown.clone());

    let tile_service = TileService::new(JsonRowSource::new(config.data_dir.clone()), assembler)
        .with_store(store)
        .with_policy(policy)
        .with_encoder(MvtTileEncoder::new(config.encoder_settings()));

    let router = create_router(tile_service, config.router_config());

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/tiles/0/0/0/<dataset> | gunzip", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    if let Err(e) = purge_task.await {
        warn!("Cache purge task failed: {}", e);
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Resolve on Ctrl+C, or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        }
        _ = shutdown.cancelled() => {}
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "vector_tile_server=debug,tower_http=debug"
    } else {
        "vector_tile_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
