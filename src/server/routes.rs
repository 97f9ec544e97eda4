//! Router configuration for the vector tile server.
//!
//! This module defines the HTTP routes and applies CORS and tracing middleware.
//!
//! # Route Structure
//!
//! ```text
//! /health                                    - Health check
//! /tiles/{zoom}/{x}/{y}/{uuid}               - Point tile
//! /tiles/{zoom}/{x}/{y}/{cluster}/{uuid}     - Point tile with cluster flag
//! /tiles/polygons/{zoom}/{x}/{y}/{uuid}      - Polygon tile
//! /tiles/polygons/bounds/{id}                - Polygon bounds (JSON)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vector_tile_server::server::{create_router, RouterConfig};
//! use vector_tile_server::tile::TileService;
//!
//! let tile_service = TileService::new(source, assembler);
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(tile_service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    cluster_tile_handler, health_handler, points_tile_handler, polygon_bounds_handler,
    polygons_tile_handler, AppState,
};
use crate::source::RowSource;
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `tile_service` - The tile service for handling tile requests
/// * `config` - Router configuration
pub fn create_router<R>(tile_service: TileService<R>, config: RouterConfig) -> Router
where
    R: RowSource + 'static,
{
    let app_state = AppState::with_cache_max_age(tile_service, config.cache_max_age);
    let cors = build_cors_layer(&config);

    // Static "polygons" segments take priority over the {zoom} capture
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/tiles/{zoom}/{x}/{y}/{uuid}", get(points_tile_handler::<R>))
        .route(
            "/tiles/{zoom}/{x}/{y}/{cluster}/{uuid}",
            get(cluster_tile_handler::<R>),
        )
        .route(
            "/tiles/polygons/{zoom}/{x}/{y}/{uuid}",
            get(polygons_tile_handler::<R>),
        )
        .route(
            "/tiles/polygons/bounds/{id}",
            get(polygon_bounds_handler::<R>),
        )
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
