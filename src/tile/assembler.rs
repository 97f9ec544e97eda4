//! Parallel assembly of rows into a [`VectorTile`].
//!
//! Rows are fanned out over a dedicated rayon pool and the accepted features
//! are gathered by `collect`, so there is no shared mutable layer:
//!
//! ```text
//!   rows ──► par_iter ──► build_feature (per worker) ──► filter_map ──► Vec<Feature>
//!                                                                          │
//!                                                     Layer { name } ◄─────┘
//! ```
//!
//! Feature order in the resulting layer is unspecified.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio_util::sync::CancellationToken;

use crate::error::TileError;
use crate::geometry::{BoundingBox, TileCoordinate};
use crate::source::Row;

use super::feature::build_feature;
use super::model::{DatasetKind, Feature, Layer, VectorTile};

/// Default layer name for point tiles.
pub const DEFAULT_POINTS_LAYER: &str = "sites";

/// Default layer name for polygon tiles.
pub const DEFAULT_POLYGONS_LAYER: &str = "polygons";

// =============================================================================
// Settings
// =============================================================================

/// Tile generation settings.
#[derive(Debug, Clone)]
pub struct TileSettings {
    /// Layer name used for point tiles
    pub points_layer: String,

    /// Layer name used for polygon tiles
    pub polygons_layer: String,

    /// Worker threads for row evaluation (`None` = hardware parallelism)
    pub workers: Option<usize>,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            points_layer: DEFAULT_POINTS_LAYER.to_string(),
            polygons_layer: DEFAULT_POLYGONS_LAYER.to_string(),
            workers: None,
        }
    }
}

impl TileSettings {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_layer_names(
        mut self,
        points_layer: impl Into<String>,
        polygons_layer: impl Into<String>,
    ) -> Self {
        self.points_layer = points_layer.into();
        self.polygons_layer = polygons_layer.into();
        self
    }
}

// =============================================================================
// Tile Assembler
// =============================================================================

/// Turns a row set into a single-layer vector tile.
///
/// Owns its worker pool; create one per process and share it.
pub struct TileAssembler {
    pool: ThreadPool,
    settings: TileSettings,
}

impl TileAssembler {
    /// Create an assembler with its own worker pool.
    ///
    /// # Errors
    /// Returns [`TileError::Internal`] if the pool cannot be started.
    pub fn new(settings: TileSettings) -> Result<Self, TileError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("tile-worker-{}", i));
        if let Some(workers) = settings.workers {
            builder = builder.num_threads(workers.max(1));
        }

        let pool = builder.build().map_err(|e| TileError::Internal {
            message: format!("failed to start tile worker pool: {}", e),
        })?;

        Ok(Self { pool, settings })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn layer_name(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::Points => &self.settings.points_layer,
            DatasetKind::Polygons => &self.settings.polygons_layer,
        }
    }

    /// Build the tile for `coord` from `rows`.
    ///
    /// The layer is present even when no row survives filtering.
    ///
    /// # Errors
    /// Returns [`TileError::Cancelled`] if `cancel` fires while rows are
    /// being evaluated.
    pub fn assemble(
        &self,
        coord: TileCoordinate,
        kind: DatasetKind,
        rows: &[Row],
        bounds: &BoundingBox,
        cancel: &CancellationToken,
    ) -> Result<VectorTile, TileError> {
        let features = self.build_features(kind, rows, bounds, cancel)?;

        let mut tile = VectorTile::new(coord);
        tile.layers.push(Layer::new(self.layer_name(kind), features));
        Ok(tile)
    }

    /// Evaluate every row on the worker pool and keep the accepted features.
    pub fn build_features(
        &self,
        kind: DatasetKind,
        rows: &[Row],
        bounds: &BoundingBox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Feature>, TileError> {
        let features: Vec<Feature> = self.pool.install(|| {
            rows.par_iter()
                .filter_map(|row| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    build_feature(kind, row, bounds)
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(TileError::Cancelled);
        }

        Ok(features)
    }
}
