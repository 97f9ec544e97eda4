use thiserror::Error;

/// Errors raised by a row source while fetching tile rows
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The backing store could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backing store answered with an error
    #[error("Query failed: {0}")]
    Query(String),

    /// The stored data could not be decoded into rows
    #[error("Malformed source data: {0}")]
    Malformed(String),

    /// Dataset identifier is not acceptable to this source
    #[error("Invalid dataset identifier: {0}")]
    InvalidDataset(String),
}

/// Errors raised by a tile cache backend
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Cache backend cannot serve reads or writes
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while turning text into a geometry
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    /// Text is not valid WKT
    #[error("Invalid WKT: {0}")]
    InvalidWkt(String),

    /// WKT parsed, but the geometry kind is not served in tiles
    #[error("Unsupported geometry type: {0}")]
    Unsupported(&'static str),
}

/// Errors that can occur while generating or serving a tile
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Tile coordinates outside the zoom's tile grid
    #[error("Invalid tile coordinate z={zoom} x={x} y={y}")]
    InvalidCoordinate { zoom: u32, x: u32, y: u32 },

    /// Request parameters rejected before generation
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Row source failure, propagated unchanged
    #[error("Row source error: {0}")]
    Source(#[from] SourceError),

    /// No stored bounds for the requested polygon
    #[error("Polygon bounds not found: {id}")]
    PolygonNotFound { id: i32 },

    /// Tile could not be serialized or compressed
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// Request was abandoned before the tile was finished
    #[error("Tile generation cancelled")]
    Cancelled,

    /// Background worker failed unexpectedly
    #[error("Internal error: {message}")]
    Internal { message: String },
}
