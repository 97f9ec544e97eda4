//! Test utilities for integration tests.
//!
//! This module provides an in-memory row source, a cache store that records
//! every call, and helpers for decoding gzip-compressed MVT responses.

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use geozero::mvt::{tile, Message, Tile};
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vector_tile_server::error::{CacheError, SourceError};
use vector_tile_server::server::{create_router, RouterConfig};
use vector_tile_server::source::{PolygonBounds, Row, RowSource};
use vector_tile_server::tile::{
    CacheKey, DatasetKind, MemoryTileStore, TileAssembler, TileRequest, TileService, TileSettings,
    TileStore,
};

/// Dataset id whose queries always fail.
pub const BROKEN_DATASET: &str = "broken";

// =============================================================================
// Mock Row Source
// =============================================================================

/// An in-memory row source keyed by dataset kind and id.
///
/// Unknown datasets yield no rows. Every query is counted.
#[derive(Default)]
pub struct MockRowSource {
    rows: HashMap<(DatasetKind, String), Vec<Row>>,
    bounds: HashMap<i32, PolygonBounds>,
    query_count: Arc<AtomicUsize>,
    clusters: Arc<Mutex<Vec<Option<u32>>>>,
}

impl MockRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(mut self, dataset: &str, rows: Vec<Row>) -> Self {
        self.rows
            .insert((DatasetKind::Points, dataset.to_string()), rows);
        self
    }

    pub fn with_polygons(mut self, dataset: &str, rows: Vec<Row>) -> Self {
        self.rows
            .insert((DatasetKind::Polygons, dataset.to_string()), rows);
        self
    }

    pub fn with_bounds(mut self, bounds: PolygonBounds) -> Self {
        self.bounds.insert(bounds.id, bounds);
        self
    }

    /// Shared query counter, usable after the source moves into a service.
    pub fn query_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.query_count)
    }

    /// Shared log of the cluster flag seen by each query.
    pub fn cluster_log(&self) -> Arc<Mutex<Vec<Option<u32>>>> {
        Arc::clone(&self.clusters)
    }
}

#[async_trait]
impl RowSource for MockRowSource {
    async fn query_rows(&self, request: &TileRequest) -> Result<Vec<Row>, SourceError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.clusters.lock().unwrap().push(request.cluster);

        if request.dataset == BROKEN_DATASET {
            return Err(SourceError::Query("relation does not exist".to_string()));
        }

        Ok(self
            .rows
            .get(&(request.kind, request.dataset.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn polygon_bounds(&self, id: i32) -> Result<Option<PolygonBounds>, SourceError> {
        Ok(self.bounds.get(&id).cloned())
    }
}

// =============================================================================
// Recording Tile Store
// =============================================================================

/// A memory store that records every `get` and `set`.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryTileStore,
    gets: AtomicUsize,
    sets: Mutex<Vec<(String, Duration)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.lock().unwrap().len()
    }

    /// Keys and TTLs of every write, in call order.
    pub fn writes(&self) -> Vec<(String, Duration)> {
        self.sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl TileStore for RecordingStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, payload: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.sets.lock().unwrap().push((key.to_string(), ttl));
        self.inner.set(key, payload, ttl).await
    }
}

// =============================================================================
// Rows
// =============================================================================

/// A point row with the standard column names.
pub fn point_row(lon: f64, lat: f64, count: i64) -> Row {
    Row::new()
        .with("geo_lon", lon)
        .with("geo_lat", lat)
        .with("count", count)
}

/// A polygon row with WKT and a couple of attributes.
pub fn polygon_row(wkt: &str, id: i64, name: &str) -> Row {
    Row::new()
        .with("geometry_wkt", wkt)
        .with("id", id)
        .with("name", name)
}

// =============================================================================
// Service and Router Helpers
// =============================================================================

pub fn test_assembler() -> TileAssembler {
    TileAssembler::new(TileSettings::default().with_workers(2)).unwrap()
}

pub fn test_service(source: MockRowSource) -> TileService<MockRowSource> {
    TileService::new(source, test_assembler())
}

pub fn test_router(source: MockRowSource) -> axum::Router {
    create_router(test_service(source), RouterConfig::new().with_tracing(false))
}

// =============================================================================
// MVT Decoding
// =============================================================================

/// Gunzip and decode a tile body.
pub fn decode_tile(body: &[u8]) -> Tile {
    let mut raw = Vec::new();
    GzDecoder::new(body).read_to_end(&mut raw).unwrap();
    Tile::decode(raw.as_slice()).unwrap()
}

/// Tags of one feature as `(key, value)` pairs sorted by key.
pub fn feature_tags(layer: &tile::Layer, feature: &tile::Feature) -> Vec<(String, tile::Value)> {
    let mut tags: Vec<_> = feature
        .tags
        .chunks(2)
        .map(|pair| {
            (
                layer.keys[pair[0] as usize].clone(),
                layer.values[pair[1] as usize].clone(),
            )
        })
        .collect();
    tags.sort_by(|a, b| a.0.cmp(&b.0));
    tags
}

/// Value of a tag by key.
pub fn tag(layer: &tile::Layer, feature: &tile::Feature, key: &str) -> Option<tile::Value> {
    feature_tags(layer, feature)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}
