//! Tile generation layer.
//!
//! This module turns source rows into gzip-compressed Mapbox Vector Tiles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileStore   │  │  TileAssembler  │  │
//! │  │  (gzipped    │  │  (rows →        │  │
//! │  │   MVT bytes) │  │   features)     │  │
//! │  └──────────────┘  └────────┬────────┘  │
//! │                    ┌────────▼────────┐  │
//! │                    │ MvtTileEncoder  │  │
//! │                    └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               RowSource                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: Main entry point for tile requests, orchestrates the full pipeline
//! - [`build_feature`]: Row → feature conversion with tile-bounds filtering
//! - [`TileAssembler`]: Parallel evaluation of a row set into a layer
//! - [`MvtTileEncoder`]: MVT serialization and gzip compression
//! - [`TileStore`] / [`MemoryTileStore`]: Cache backends
//! - [`CachePolicy`]: Which zooms are cached and for how long

mod assembler;
mod cache;
mod encoder;
mod feature;
mod model;
mod service;

pub use assembler::{TileAssembler, TileSettings, DEFAULT_POINTS_LAYER, DEFAULT_POLYGONS_LAYER};
pub use cache::{
    CacheEntry, CacheKey, CachePolicy, MemoryTileStore, TileStore, TtlBand, DEFAULT_MAX_CACHE_ZOOM,
    DEFAULT_PURGE_INTERVAL, DEFAULT_TTL,
};
pub use encoder::{
    EncoderSettings, MvtTileEncoder, DEFAULT_BUFFER, DEFAULT_EXTENT, DEFAULT_MIN_POLYGONAL_EXTENT,
};
pub use feature::{
    build_feature, wrap_longitude, COUNT_COLUMN, GEOMETRY_COLUMN, LAT_COLUMN, LON_COLUMN,
};
pub use model::{DatasetKind, Feature, Layer, VectorTile};
pub use service::{TileRequest, TileResponse, TileService};
