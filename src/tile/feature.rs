//! Row → feature conversion with spatial inclusion tests.
//!
//! Each row is judged on its own, so this module is pure and safe to call from
//! any worker thread.

use geo::Intersects;
use tracing::debug;

use crate::geometry::{antimeridian, BoundingBox, Geometry};
use crate::source::{Row, Value};

use super::model::{DatasetKind, Feature};

/// Longitude column of point rows.
pub const LON_COLUMN: &str = "geo_lon";

/// Latitude column of point rows.
pub const LAT_COLUMN: &str = "geo_lat";

/// Optional aggregate column of point rows.
pub const COUNT_COLUMN: &str = "count";

/// WKT geometry column of polygon rows.
pub const GEOMETRY_COLUMN: &str = "geometry_wkt";

/// Upper bound on ±360° steps when wrapping a point longitude.
const MAX_WRAP_STEPS: usize = 4;

/// Build the feature for one row, or `None` when the row is skipped.
///
/// Rows are skipped when required columns are missing, null or malformed, or
/// when the geometry falls outside `bounds`. Skips never fail the tile.
pub fn build_feature(kind: DatasetKind, row: &Row, bounds: &BoundingBox) -> Option<Feature> {
    match kind {
        DatasetKind::Points => build_point(row, bounds),
        DatasetKind::Polygons => build_polygon(row, bounds),
    }
}

fn build_point(row: &Row, bounds: &BoundingBox) -> Option<Feature> {
    let lon = row.get(LON_COLUMN).and_then(Value::as_f64)?;
    let lat = row.get(LAT_COLUMN).and_then(Value::as_f64)?;

    if !lat.is_finite() || lat < bounds.min_lat || lat > bounds.max_lat {
        return None;
    }

    let lon = wrap_longitude(lon, bounds)?;
    if lon > bounds.max_lon {
        return None;
    }

    let mut feature = Feature::new(Geometry::Point(geo::Point::new(lon, lat)));

    if let Some(count) = row.get(COUNT_COLUMN) {
        if count.as_f64().is_some() {
            feature.set_attribute(COUNT_COLUMN, count.clone());
        }
    }

    Some(feature)
}

/// Wrap `lon` into `[bounds.min_lon, bounds.min_lon + 360)`.
///
/// Gives up after a few steps, so absurd inputs are rejected rather than looped on.
pub fn wrap_longitude(lon: f64, bounds: &BoundingBox) -> Option<f64> {
    if !lon.is_finite() {
        return None;
    }

    let mut lon = lon;
    let upper = bounds.min_lon + 360.0;

    for _ in 0..MAX_WRAP_STEPS {
        if lon < bounds.min_lon {
            lon += 360.0;
        } else if lon >= upper {
            lon -= 360.0;
        } else {
            return Some(lon);
        }
    }

    (lon >= bounds.min_lon && lon < upper).then_some(lon)
}

fn build_polygon(row: &Row, bounds: &BoundingBox) -> Option<Feature> {
    let wkt = row.get(GEOMETRY_COLUMN).and_then(Value::as_str)?;

    let geometry = match Geometry::from_wkt(wkt) {
        Ok(Geometry::Point(_)) => {
            debug!("Skipping polygon row with point geometry");
            return None;
        }
        Ok(geometry) => geometry,
        Err(e) => {
            debug!(error = %e, "Skipping polygon row with unusable geometry");
            return None;
        }
    };

    let geometry = antimeridian::normalize(geometry);

    let envelope = geometry.envelope()?;
    if !envelope.intersects(&bounds.to_rect()) {
        return None;
    }

    let mut feature = Feature::new(geometry);
    for (name, value) in row.columns() {
        if name != GEOMETRY_COLUMN && !value.is_null() {
            feature.set_attribute(name, value.clone());
        }
    }

    Some(feature)
}
