//! # Vector Tile Server
//!
//! A Mapbox Vector Tile server for point and polygon datasets.
//!
//! Tiles are generated on demand from tabular rows: points carry a
//! longitude/latitude pair and an aggregate count, polygons carry WKT and
//! arbitrary attributes. Low zoom tiles are cached with zoom-dependent TTLs.
//!
//! ## Features
//!
//! - **On-demand tiles**: Rows are filtered to the tile bounds and evaluated in parallel
//! - **Antimeridian repair**: Polygons wrapping ±180° are made contiguous before clipping
//! - **Gzip MVT output**: Extent, buffer and minimum polygon area are configurable
//! - **Zoom-banded caching**: Only zooms up to a threshold are cached, each band with its own TTL
//! - **Cancellation**: Abandoned requests stop work and never write to the cache
//!
//! ## Architecture
//!
//! - [`geometry`] - Tile coordinates, bounds, geometries and antimeridian repair
//! - [`source`] - Row sources (datasets) and polygon bounds lookups
//! - [`tile`] - Feature building, assembly, encoding, caching and the tile service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use vector_tile_server::{
//!     create_router, JsonRowSource, RouterConfig, TileAssembler, TileService, TileSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = JsonRowSource::new("/var/lib/tiles");
//!     let assembler = TileAssembler::new(TileSettings::default())?;
//!     let service = TileService::new(source, assembler);
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod server;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{CacheError, GeometryError, SourceError, TileError};
pub use geometry::{BoundingBox, Geometry, TileCoordinate, MAX_ZOOM};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use source::{JsonRowSource, PolygonBounds, Row, RowSource, Value};
pub use tile::{
    CacheKey, CachePolicy, DatasetKind, EncoderSettings, Feature, Layer, MemoryTileStore,
    MvtTileEncoder, TileAssembler, TileRequest, TileResponse, TileService, TileSettings,
    TileStore, TtlBand, VectorTile,
};
