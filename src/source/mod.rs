//! Row source abstraction.
//!
//! The tile pipeline never talks to storage directly. It asks a [`RowSource`]
//! for the rows of one tile and turns them into features itself:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! └────────────────────┬────────────────────┘
//!                      │ query_rows(&TileRequest)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            RowSource Trait              │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  JsonRowSource  │    │  database adapter   │
//! │  (local files)  │    │  (out of tree)      │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! A source may return rows outside the requested tile; the feature builder
//! filters them against the tile bounds.

mod json;
mod row;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::tile::TileRequest;

pub use json::JsonRowSource;
pub use row::{PolygonBounds, Row, Value};

// =============================================================================
// RowSource Trait
// =============================================================================

/// Supplier of tile rows and polygon metadata.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch the rows for one tile.
    ///
    /// # Arguments
    /// * `request` - Dataset kind, tile coordinate, dataset id and cluster flag
    ///
    /// # Errors
    /// Returns a [`SourceError`] when the backing store fails. An empty result
    /// is not an error.
    async fn query_rows(&self, request: &TileRequest) -> Result<Vec<Row>, SourceError>;

    /// Look up the stored bounds of a polygon by id.
    async fn polygon_bounds(&self, id: i32) -> Result<Option<PolygonBounds>, SourceError>;
}

/// Reject dataset identifiers that cannot be used as a single path segment.
pub fn validate_dataset_id(dataset: &str) -> Result<(), SourceError> {
    let bad = dataset.is_empty()
        || dataset == "."
        || dataset.contains("..")
        || dataset.contains(['/', '\\', '\0']);

    if bad {
        Err(SourceError::InvalidDataset(dataset.to_string()))
    } else {
        Ok(())
    }
}
