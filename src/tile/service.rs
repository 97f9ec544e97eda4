//! Tile Service for orchestrating tile generation.
//!
//! The TileService is the main entry point for tile requests. It orchestrates:
//! - Cache lookups for cacheable zooms
//! - Row queries via the row source
//! - Parallel feature assembly and MVT encoding
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                              │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Compute bounds    4. Assemble features              │    │
//! │  │  2. Check cache       5. Encode + gzip                  │    │
//! │  │  3. Query rows        6. Cache & return                 │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │            │
//! │           ▼                    ▼                    ▼            │
//! │    ┌───────────┐      ┌──────────────┐    ┌──────────────────┐  │
//! │    │ TileStore │      │  RowSource   │    │ Assembler/Encoder│  │
//! │    └───────────┘      └──────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 4 and 5 run on the blocking thread pool. The cancellation token is
//! checked after the query, before encoding and before the cache write, so a
//! cancelled request never leaves a cache entry behind.
//!
//! Two concurrent requests for the same uncached tile both generate it.
//! Generation is idempotent, so the only cost is duplicated work.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TileError;
use crate::geometry::TileCoordinate;
use crate::source::{PolygonBounds, RowSource};

use super::assembler::TileAssembler;
use super::cache::{CacheKey, CachePolicy, MemoryTileStore, TileStore};
use super::encoder::MvtTileEncoder;
use super::model::DatasetKind;

// =============================================================================
// Tile Request
// =============================================================================

/// A request for one tile of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// Points or polygons
    pub kind: DatasetKind,

    /// Tile address
    pub coord: TileCoordinate,

    /// Dataset identifier (request uuid)
    pub dataset: String,

    /// Cluster flag forwarded to the row source (points only)
    pub cluster: Option<u32>,
}

impl TileRequest {
    pub fn new(kind: DatasetKind, coord: TileCoordinate, dataset: impl Into<String>) -> Self {
        Self {
            kind,
            coord,
            dataset: dataset.into(),
            cluster: None,
        }
    }

    pub fn points(coord: TileCoordinate, dataset: impl Into<String>) -> Self {
        Self::new(DatasetKind::Points, coord, dataset)
    }

    pub fn polygons(coord: TileCoordinate, dataset: impl Into<String>) -> Self {
        Self::new(DatasetKind::Polygons, coord, dataset)
    }

    pub fn with_cluster(mut self, cluster: u32) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            self.kind,
            self.coord.zoom,
            self.coord.x,
            self.coord.y,
            self.dataset.as_str(),
        )
        .with_cluster(self.cluster)
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// Gzip-compressed MVT bytes
    pub data: Bytes,

    /// Whether this tile was served from cache
    pub cache_hit: bool,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Service for generating and caching vector tiles.
///
/// # Type Parameters
///
/// * `R` - The row source (e.g. [`JsonRowSource`](crate::source::JsonRowSource))
///
/// # Example
///
/// ```ignore
/// use vector_tile_server::tile::{TileAssembler, TileRequest, TileService, TileSettings};
/// use vector_tile_server::source::JsonRowSource;
///
/// let assembler = TileAssembler::new(TileSettings::default())?;
/// let service = TileService::new(JsonRowSource::new("./data"), assembler);
///
/// let request = TileRequest::points(TileCoordinate::new(4, 8, 5)?, "my-dataset");
/// let response = service.get_tile(&request, &CancellationToken::new()).await?;
/// ```
pub struct TileService<R: RowSource> {
    source: Arc<R>,
    store: Arc<dyn TileStore>,
    policy: CachePolicy,
    assembler: Arc<TileAssembler>,
    encoder: MvtTileEncoder,
}

impl<R: RowSource> TileService<R> {
    /// Create a service with an in-memory store, default cache policy and
    /// default encoder settings.
    pub fn new(source: R, assembler: TileAssembler) -> Self {
        Self {
            source: Arc::new(source),
            store: Arc::new(MemoryTileStore::new()),
            policy: CachePolicy::default(),
            assembler: Arc::new(assembler),
            encoder: MvtTileEncoder::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TileStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_encoder(mut self, encoder: MvtTileEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    /// Get a tile, using the cache when the zoom allows it.
    ///
    /// # Errors
    ///
    /// - [`TileError::Source`] if the row source fails
    /// - [`TileError::Encode`] if the tile cannot be serialized
    /// - [`TileError::Cancelled`] if `cancel` fires before the tile is done
    ///
    /// Cache failures never surface as errors.
    pub async fn get_tile(
        &self,
        request: &TileRequest,
        cancel: &CancellationToken,
    ) -> Result<TileResponse, TileError> {
        let coord = request.coord;
        let bounds = coord.bounds();
        let cacheable = self.policy.is_cacheable(coord.zoom);
        let key = request.cache_key();

        if cacheable {
            match self.store.get(&key).await {
                Ok(Some(data)) => {
                    debug!(key = %key, "Tile cache hit");
                    return Ok(TileResponse {
                        data,
                        cache_hit: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Tile cache read failed, regenerating"),
            }
        }

        let started = Instant::now();
        let rows = self.source.query_rows(request).await?;
        let query_time = started.elapsed();
        checkpoint(cancel)?;

        let row_count = rows.len();
        let kind = request.kind;
        let assembler = Arc::clone(&self.assembler);
        let encoder = self.encoder.clone();
        let worker_cancel = cancel.clone();

        let generated = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let tile = assembler.assemble(coord, kind, &rows, &bounds, &worker_cancel)?;
            let assemble_time = started.elapsed();

            checkpoint(&worker_cancel)?;

            let started = Instant::now();
            let data = encoder.encode(&tile)?;

            Ok::<_, TileError>(Generated {
                data,
                features: tile.feature_count(),
                assemble_time,
                encode_time: started.elapsed(),
            })
        })
        .await
        .map_err(|e| TileError::Internal {
            message: format!("tile worker failed: {}", e),
        })??;

        debug!(
            tile = %coord,
            kind = %kind,
            dataset = %request.dataset,
            rows = row_count,
            features = generated.features,
            bytes = generated.data.len(),
            query_ms = query_time.as_millis() as u64,
            assemble_ms = generated.assemble_time.as_millis() as u64,
            encode_ms = generated.encode_time.as_millis() as u64,
            "Generated tile"
        );

        checkpoint(cancel)?;

        if cacheable {
            let ttl = self.policy.ttl_for(coord.zoom);
            if let Err(e) = self.store.set(&key, generated.data.clone(), ttl).await {
                warn!(key = %key, error = %e, "Failed to cache tile");
            }
        }

        Ok(TileResponse {
            data: generated.data,
            cache_hit: false,
        })
    }

    /// Look up stored polygon bounds.
    pub async fn polygon_bounds(&self, id: i32) -> Result<Option<PolygonBounds>, TileError> {
        Ok(self.source.polygon_bounds(id).await?)
    }
}

struct Generated {
    data: Bytes,
    features: usize,
    assemble_time: Duration,
    encode_time: Duration,
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), TileError> {
    if cancel.is_cancelled() {
        Err(TileError::Cancelled)
    } else {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
