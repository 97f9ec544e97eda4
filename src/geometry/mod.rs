//! Geometry primitives for tile generation.
//!
//! - [`TileCoordinate`] / [`BoundingBox`]: tile addressing and tile bounds
//! - [`Geometry`]: the closed set of shapes a tile feature can carry
//! - [`antimeridian`]: repair of polygons that wrap across ±180°

pub mod antimeridian;
mod bounds;

use std::str::FromStr;

use geo::{BoundingRect, MultiPolygon, Point, Polygon, Rect};
use wkt::Wkt;

use crate::error::GeometryError;

pub use bounds::{BoundingBox, TileCoordinate, MAX_ZOOM};

/// A feature geometry in WGS84 degrees (x = longitude, y = latitude).
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Geometry {
    /// Parse a WKT string.
    ///
    /// Only `POINT`, `POLYGON` and `MULTIPOLYGON` are accepted.
    pub fn from_wkt(text: &str) -> Result<Self, GeometryError> {
        let parsed: Wkt<f64> =
            Wkt::from_str(text).map_err(|e| GeometryError::InvalidWkt(e.to_string()))?;
        let geometry = geo::Geometry::<f64>::try_from(parsed)
            .map_err(|e| GeometryError::InvalidWkt(e.to_string()))?;

        match geometry {
            geo::Geometry::Point(p) => Ok(Geometry::Point(p)),
            geo::Geometry::Polygon(p) => Ok(Geometry::Polygon(p)),
            geo::Geometry::MultiPolygon(mp) => Ok(Geometry::MultiPolygon(mp)),
            geo::Geometry::Line(_) => Err(GeometryError::Unsupported("Line")),
            geo::Geometry::LineString(_) => Err(GeometryError::Unsupported("LineString")),
            geo::Geometry::MultiPoint(_) => Err(GeometryError::Unsupported("MultiPoint")),
            geo::Geometry::MultiLineString(_) => {
                Err(GeometryError::Unsupported("MultiLineString"))
            }
            geo::Geometry::GeometryCollection(_) => {
                Err(GeometryError::Unsupported("GeometryCollection"))
            }
            geo::Geometry::Rect(_) => Err(GeometryError::Unsupported("Rect")),
            geo::Geometry::Triangle(_) => Err(GeometryError::Unsupported("Triangle")),
        }
    }

    /// Envelope of the geometry, `None` when it has no coordinates.
    pub fn envelope(&self) -> Option<Rect<f64>> {
        match self {
            Geometry::Point(p) => Some(p.bounding_rect()),
            Geometry::Polygon(p) => p.bounding_rect(),
            Geometry::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }
}
