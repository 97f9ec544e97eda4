//! HTTP server layer.
//!
//! This module provides the HTTP API for serving vector tiles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET /tiles/{zoom}/{x}/{y}/{uuid}                              │
//! │   GET /tiles/polygons/{zoom}/{x}/{y}/{uuid}                     │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error → JSON) │  │ (router, CORS, tracing)     │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    cluster_tile_handler, health_handler, points_tile_handler, polygon_bounds_handler,
    polygons_tile_handler, AppState, ClusterTilePathParams, ErrorResponse, HandlerError,
    HealthResponse, TilePathParams, CACHE_HIT_HEADER, MVT_CONTENT_TYPE,
};
pub use routes::{create_router, RouterConfig};
