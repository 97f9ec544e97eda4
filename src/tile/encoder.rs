//! Mapbox Vector Tile encoder.
//!
//! Turns a [`VectorTile`] into gzip-compressed MVT bytes.
//!
//! # Pipeline
//!
//! ```text
//!   WGS84 (lon, lat)
//!        │ Web-Mercator projection into tile pixel space (0..extent, y down)
//!        ▼
//!   ring clipping to [-buffer, extent + buffer]      (Sutherland–Hodgman)
//!        │ round → de-duplicate → orient → drop tiny rings
//!        ▼
//!   mvt::GeomEncoder  ──►  mvt::Tile::to_bytes  ──►  gzip
//! ```
//!
//! # Design Decisions
//!
//! - **Best effort geometry**: a feature whose geometry collapses after
//!   clipping or rounding is dropped; it never fails the tile.
//!
//! - **Winding**: shells get positive surveyor's-formula area in tile space,
//!   holes negative, regardless of the input orientation.
//!
//! - **Attributes**: text → string, integer → sint, float → double. Null
//!   attributes are omitted.

use std::f64::consts::PI;
use std::io::Write;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use geo::{LineString, Polygon};
use mvt::{GeomData, GeomEncoder, GeomType};

use crate::error::TileError;
use crate::geometry::{Geometry, TileCoordinate};
use crate::source::Value;

use super::model::{Feature, VectorTile};

/// Default tile extent in pixels.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Default clipping buffer around the tile, in pixels.
pub const DEFAULT_BUFFER: u32 = 64;

/// Default minimum ring area in square pixels.
pub const DEFAULT_MIN_POLYGONAL_EXTENT: f64 = 2.0;

/// Web-Mercator latitude limit.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

type Ring = Vec<(f64, f64)>;

// =============================================================================
// Settings
// =============================================================================

/// Geometry thresholds for encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSettings {
    /// Tile extent in pixels
    pub extent: u32,

    /// Pixels kept beyond each tile edge when clipping
    pub buffer: u32,

    /// Rings with a smaller absolute area (px²) are dropped
    pub min_polygonal_extent: f64,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            extent: DEFAULT_EXTENT,
            buffer: DEFAULT_BUFFER,
            min_polygonal_extent: DEFAULT_MIN_POLYGONAL_EXTENT,
        }
    }
}

// =============================================================================
// MVT Encoder
// =============================================================================

/// Encoder from [`VectorTile`] to gzip-compressed MVT bytes.
///
/// # Example
///
/// ```ignore
/// use vector_tile_server::tile::{EncoderSettings, MvtTileEncoder};
///
/// let encoder = MvtTileEncoder::new(EncoderSettings::default());
/// let gzipped = encoder.encode(&tile)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MvtTileEncoder {
    settings: EncoderSettings,
}

impl MvtTileEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    /// Encode and gzip a tile.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Encode`] if the MVT writer or the compressor fails.
    pub fn encode(&self, tile: &VectorTile) -> Result<Bytes, TileError> {
        let raw = self.encode_uncompressed(tile)?;
        gzip(&raw).map(Bytes::from)
    }

    /// Encode a tile to raw (uncompressed) MVT bytes.
    pub fn encode_uncompressed(&self, tile: &VectorTile) -> Result<Vec<u8>, TileError> {
        let mut mvt_tile = mvt::Tile::new(self.settings.extent);

        for layer in &tile.layers {
            let mut mvt_layer = mvt_tile.create_layer(&layer.name);

            for feature in &layer.features {
                let Some(geom) = self.encode_geometry(&feature.geometry, tile.coord)? else {
                    continue;
                };

                let mut mvt_feature = mvt_layer.into_feature(geom);
                add_tags(&mut mvt_feature, feature);
                mvt_layer = mvt_feature.into_layer();
            }

            mvt_tile.add_layer(mvt_layer).map_err(encode_error)?;
        }

        mvt_tile.to_bytes().map_err(encode_error)
    }

    /// Encode one geometry, `None` when nothing survives clipping.
    fn encode_geometry(
        &self,
        geometry: &Geometry,
        coord: TileCoordinate,
    ) -> Result<Option<GeomData>, TileError> {
        match geometry {
            Geometry::Point(p) => {
                let (x, y) = project(p.x(), p.y(), coord, self.extent());
                let (x, y) = (x.round(), y.round());
                if !self.within_buffer(x, y) {
                    return Ok(None);
                }

                let data = GeomEncoder::new(GeomType::Point)
                    .point(x, y)
                    .and_then(|e| e.encode())
                    .map_err(encode_error)?;
                Ok(Some(data))
            }
            Geometry::Polygon(polygon) => self.encode_polygons(std::slice::from_ref(polygon), coord),
            Geometry::MultiPolygon(multi) => self.encode_polygons(&multi.0, coord),
        }
    }

    fn encode_polygons(
        &self,
        polygons: &[Polygon<f64>],
        coord: TileCoordinate,
    ) -> Result<Option<GeomData>, TileError> {
        let mut encoder = GeomEncoder::new(GeomType::Polygon);
        let mut rings_written = 0usize;

        for polygon in polygons {
            let Some(shell) = self.prepare_ring(polygon.exterior(), coord, false) else {
                continue;
            };

            let holes: Vec<Ring> = polygon
                .interiors()
                .iter()
                .filter_map(|hole| self.prepare_ring(hole, coord, true))
                .collect();

            for ring in std::iter::once(&shell).chain(holes.iter()) {
                for &(x, y) in ring {
                    encoder = encoder.point(x, y).map_err(encode_error)?;
                }
                encoder = encoder.complete().map_err(encode_error)?;
                rings_written += 1;
            }
        }

        if rings_written == 0 {
            return Ok(None);
        }

        encoder.encode().map(Some).map_err(encode_error)
    }

    /// Project, clip, round and orient a ring; `None` when it degenerates.
    fn prepare_ring(
        &self,
        ring: &LineString<f64>,
        coord: TileCoordinate,
        is_hole: bool,
    ) -> Option<Ring> {
        let extent = self.extent();
        let projected: Ring = ring
            .coords()
            .filter(|c| c.x.is_finite() && c.y.is_finite())
            .map(|c| project(c.x, c.y, coord, extent))
            .collect();

        let clipped = clip_ring(&projected, extent, self.settings.buffer as f64);
        let rounded: Ring = clipped.into_iter().map(|(x, y)| (x.round(), y.round())).collect();
        let cleaned = clean_ring(rounded)?;

        let area = signed_area(&cleaned);
        if area.abs() < self.settings.min_polygonal_extent || area == 0.0 {
            return None;
        }

        let wants_positive = !is_hole;
        if (area > 0.0) == wants_positive {
            Some(cleaned)
        } else {
            Some(cleaned.into_iter().rev().collect())
        }
    }

    fn extent(&self) -> f64 {
        self.settings.extent as f64
    }

    fn within_buffer(&self, x: f64, y: f64) -> bool {
        let min = -(self.settings.buffer as f64);
        let max = self.extent() + self.settings.buffer as f64;
        x >= min && x <= max && y >= min && y <= max
    }
}

fn add_tags(target: &mut mvt::Feature, feature: &Feature) {
    for (key, value) in &feature.attributes {
        match value {
            Value::Null => {}
            Value::Integer(i) => target.add_tag_sint(key, *i),
            Value::Float(f) => target.add_tag_double(key, *f),
            Value::Text(s) => target.add_tag_string(key, s),
        }
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, TileError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(encode_error)?;
    encoder.finish().map_err(encode_error)
}

fn encode_error(e: impl std::fmt::Display) -> TileError {
    TileError::Encode {
        message: e.to_string(),
    }
}

// =============================================================================
// Geometry helpers
// =============================================================================

/// Project WGS84 degrees into pixel space of `coord` (y grows downwards).
fn project(lon: f64, lat: f64, coord: TileCoordinate, extent: f64) -> (f64, f64) {
    let n = coord.tiles_per_axis();
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();

    let world_x = (lon + 180.0) / 360.0 * n;
    let world_y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;

    (
        (world_x - coord.x as f64) * extent,
        (world_y - coord.y as f64) * extent,
    )
}

/// Sutherland–Hodgman clip of a ring against the buffered tile square.
fn clip_ring(ring: &[(f64, f64)], extent: f64, buffer: f64) -> Ring {
    let min = -buffer;
    let max = extent + buffer;

    let mut out = clip_edge(ring, |p| p.0 >= min, |a, b| {
        let t = (min - a.0) / (b.0 - a.0);
        (min, a.1 + t * (b.1 - a.1))
    });
    out = clip_edge(&out, |p| p.0 <= max, |a, b| {
        let t = (max - a.0) / (b.0 - a.0);
        (max, a.1 + t * (b.1 - a.1))
    });
    out = clip_edge(&out, |p| p.1 >= min, |a, b| {
        let t = (min - a.1) / (b.1 - a.1);
        (a.0 + t * (b.0 - a.0), min)
    });
    clip_edge(&out, |p| p.1 <= max, |a, b| {
        let t = (max - a.1) / (b.1 - a.1);
        (a.0 + t * (b.0 - a.0), max)
    })
}

fn clip_edge<F, I>(ring: &[(f64, f64)], inside: F, intersect: I) -> Ring
where
    F: Fn(&(f64, f64)) -> bool,
    I: Fn(&(f64, f64), &(f64, f64)) -> (f64, f64),
{
    let mut out = Vec::with_capacity(ring.len() + 4);

    for (i, current) in ring.iter().enumerate() {
        let next = &ring[(i + 1) % ring.len()];

        match (inside(current), inside(next)) {
            (true, true) => out.push(*next),
            (true, false) => out.push(intersect(current, next)),
            (false, true) => {
                out.push(intersect(current, next));
                out.push(*next);
            }
            (false, false) => {}
        }
    }

    out
}

/// Drop repeated points and the closing point; `None` below 3 distinct points.
fn clean_ring(ring: Ring) -> Option<Ring> {
    let mut cleaned: Ring = Vec::with_capacity(ring.len());
    for p in ring {
        if cleaned.last() != Some(&p) {
            cleaned.push(p);
        }
    }

    while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
        cleaned.pop();
    }

    (cleaned.len() >= 3).then_some(cleaned)
}

/// Surveyor's formula over an open ring.
fn signed_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = ring[i];
            let (x2, y2) = ring[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();
    twice / 2.0
}

// =============================================================================
// Tests
// =============================================================================
