//! In-memory tile model: features grouped into named layers.

use std::fmt;

use crate::geometry::{Geometry, TileCoordinate};
use crate::source::Value;

/// Which family of rows a tile is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// Point rows (`geo_lon`, `geo_lat`, optional `count`)
    Points,
    /// Polygon rows (`geometry_wkt` plus arbitrary attribute columns)
    Polygons,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Points => "points",
            DatasetKind::Polygons => "polygons",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geometry with its attributes.
///
/// Attribute keys are unique within a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub attributes: Vec<(String, Value)>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            attributes: Vec::new(),
        }
    }

    /// Set an attribute, replacing an existing value under the same key.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// A named collection of features.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }
}

/// A tile ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorTile {
    pub coord: TileCoordinate,
    pub layers: Vec<Layer>,
}

impl VectorTile {
    pub fn new(coord: TileCoordinate) -> Self {
        Self {
            coord,
            layers: Vec::new(),
        }
    }

    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }
}
