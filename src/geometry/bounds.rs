//! Slippy-map tile coordinates and their geographic bounds.
//!
//! Tiles follow the Web-Mercator scheme: at zoom `z` the world is split into
//! `2^z × 2^z` tiles, `x` growing east from the antimeridian and `y` growing
//! south from the northern Mercator limit.

use std::f64::consts::PI;
use std::fmt;

use geo::{coord, Rect};

use crate::error::TileError;

/// Highest zoom level accepted from clients.
pub const MAX_ZOOM: u8 = 24;

// =============================================================================
// Tile Coordinate
// =============================================================================

/// A tile address `(zoom, x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    /// Zoom level (0 = whole world in one tile)
    pub zoom: u8,

    /// Tile column, 0-indexed from the antimeridian
    pub x: u32,

    /// Tile row, 0-indexed from the north
    pub y: u32,
}

impl TileCoordinate {
    /// Create a validated tile coordinate.
    ///
    /// Rejects zooms above [`MAX_ZOOM`] and `x`/`y` outside `0..2^zoom`.
    pub fn new(zoom: u32, x: u32, y: u32) -> Result<Self, TileError> {
        let invalid = TileError::InvalidCoordinate { zoom, x, y };

        if zoom > MAX_ZOOM as u32 {
            return Err(invalid);
        }

        let tiles = 1u64 << zoom;
        if x as u64 >= tiles || y as u64 >= tiles {
            return Err(invalid);
        }

        Ok(Self {
            zoom: zoom as u8,
            x,
            y,
        })
    }

    /// Create a coordinate without range checks.
    ///
    /// Out-of-range values still produce well-defined (if meaningless) bounds.
    pub fn new_unchecked(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Number of tiles along one axis at this zoom.
    pub fn tiles_per_axis(&self) -> f64 {
        2f64.powi(self.zoom as i32)
    }

    /// Geographic bounding box covered by this tile.
    pub fn bounds(&self) -> BoundingBox {
        let n = self.tiles_per_axis();
        let x = self.x as f64;
        let y = self.y as f64;

        BoundingBox {
            min_lon: x / n * 360.0 - 180.0,
            max_lon: (x + 1.0) / n * 360.0 - 180.0,
            min_lat: row_to_latitude(y + 1.0, n),
            max_lat: row_to_latitude(y, n),
        }
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inverse Web-Mercator: latitude in degrees of the northern edge of row `y`.
fn row_to_latitude(y: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

// =============================================================================
// Bounding Box
// =============================================================================

/// Axis-aligned box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Inclusive containment test.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
            && other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
    }

    /// The box as a `geo` rectangle, x = longitude, y = latitude.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
