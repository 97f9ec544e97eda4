//! Antimeridian repair for polygons.
//!
//! A polygon stored with raw WGS84 longitudes that crosses ±180° shows up as a
//! shape spanning most of the globe: `(179, 10), (-179, 10), ...`. Such a
//! polygon is repaired by moving the coordinates of the *minority* hemisphere
//! (the side with fewer coordinates) by ±360° so that all longitudes become
//! numerically contiguous:
//!
//! ```text
//!   raw:        179 ──── -179          span 358° → crossing
//!   shifted:    179 ────  181          span   2°
//! ```
//!
//! The minority rule is a heuristic. Polygons with very uneven point density
//! can be shifted the "wrong" way; that behaviour is kept deliberately so that
//! tiles stay identical to those produced by the existing service.
//!
//! Repair is best effort: if the shifted polygon cannot be rebuilt into a sane
//! shape, the input is returned untouched.

use geo::{Area, BoundingRect, Coord, CoordsIter, MapCoords, MultiPolygon, Polygon};
use tracing::debug;

use super::Geometry;

/// Longitude span above which a polygon is treated as wrapping the antimeridian.
pub const MAX_CONTIGUOUS_SPAN: f64 = 180.0;

/// Which coordinates get moved by 360°.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftSide {
    /// Longitudes < 0 move east by +360°
    Negative,
    /// Longitudes ≥ 0 move west by −360°
    NonNegative,
}

/// Repair a geometry that wraps across the antimeridian.
///
/// Points are returned as-is. Polygons and multipolygons whose longitude span
/// is at most 180° are returned unchanged.
pub fn normalize(geometry: Geometry) -> Geometry {
    match geometry {
        Geometry::Point(_) => geometry,
        Geometry::Polygon(polygon) => {
            let parts = std::slice::from_ref(&polygon);
            match shift_polygons(parts) {
                Some(mut shifted) => Geometry::Polygon(shifted.remove(0)),
                None => Geometry::Polygon(polygon),
            }
        }
        Geometry::MultiPolygon(multi) => match shift_polygons(&multi.0) {
            Some(shifted) => Geometry::MultiPolygon(MultiPolygon::new(shifted)),
            None => Geometry::MultiPolygon(multi),
        },
    }
}

/// Longitude span (max − min) over every ring coordinate.
///
/// Returns 0 for geometries without coordinates.
pub fn longitude_span(polygons: &[Polygon<f64>]) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for c in polygons.iter().flat_map(|p| p.coords_iter()) {
        min = min.min(c.x);
        max = max.max(c.x);
    }

    if min.is_finite() && max.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Shift the minority side of `polygons`, or `None` when no repair applies.
fn shift_polygons(polygons: &[Polygon<f64>]) -> Option<Vec<Polygon<f64>>> {
    if longitude_span(polygons) <= MAX_CONTIGUOUS_SPAN {
        return None;
    }

    let side = minority_side(polygons);

    let shifted: Vec<Polygon<f64>> = polygons
        .iter()
        .map(|p| p.map_coords(move |c| shift_coord(c, side)))
        .collect();

    if shifted.iter().all(is_constructible) {
        Some(shifted)
    } else {
        debug!(
            polygons = polygons.len(),
            side = ?side,
            "Antimeridian shift produced an invalid polygon, keeping original"
        );
        None
    }
}

/// The side with fewer coordinates; ties shift the negative side.
fn minority_side(polygons: &[Polygon<f64>]) -> ShiftSide {
    let (negative, non_negative) = polygons
        .iter()
        .flat_map(|p| p.coords_iter())
        .fold((0usize, 0usize), |(neg, pos), c| {
            if c.x < 0.0 {
                (neg + 1, pos)
            } else {
                (neg, pos + 1)
            }
        });

    if negative <= non_negative {
        ShiftSide::Negative
    } else {
        ShiftSide::NonNegative
    }
}

fn shift_coord(c: Coord<f64>, side: ShiftSide) -> Coord<f64> {
    match side {
        ShiftSide::Negative if c.x < 0.0 => Coord { x: c.x + 360.0, y: c.y },
        ShiftSide::NonNegative if c.x >= 0.0 => Coord { x: c.x - 360.0, y: c.y },
        _ => c,
    }
}

/// Minimal sanity check for a rebuilt polygon.
///
/// Rings need at least four (closed) finite coordinates, the shell must enclose
/// area, and every hole must sit inside the shell's envelope.
fn is_constructible(polygon: &Polygon<f64>) -> bool {
    if polygon
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return false;
    }

    let exterior = polygon.exterior();
    if exterior.0.len() < 4 || polygon.unsigned_area() <= 0.0 {
        return false;
    }

    let Some(shell_box) = exterior.bounding_rect() else {
        return false;
    };

    polygon.interiors().iter().all(|hole| {
        if hole.0.len() < 4 {
            return false;
        }
        match hole.bounding_rect() {
            Some(b) => {
                b.min().x >= shell_box.min().x
                    && b.max().x <= shell_box.max().x
                    && b.min().y >= shell_box.min().y
                    && b.max().y <= shell_box.max().y
            }
            None => false,
        }
    })
}

// =============================================================================
// Tests
// =============================================================================
