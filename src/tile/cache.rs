//! Zoom-tiered tile cache.
//!
//! Only tiles at or below [`CachePolicy::max_cache_zoom`] are cached. Each
//! entry lives for a TTL picked from an ordered list of zoom bands:
//!
//! ```text
//!   zoom:  0 ─ 3      4 ─ 6      7 ─ 10       11 ─ …
//!          168h       72h        24h (default) not cached
//! ```
//!
//! There is no explicit invalidation. Staleness is bounded by the
//! TTL alone; the dataset id is part of the key so distinct datasets never
//! share entries.
//!
//! # Cache Key
//!
//! [`CacheKey`] renders as `tile:{kind}:{z}:{x}:{y}:{cluster|-}:{dataset}`.
//! Every field before the dataset has a colon-free format, so the rendering
//! is injective even when the dataset id contains colons.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CacheError;

use super::model::DatasetKind;

/// Highest zoom whose tiles are cached by default.
pub const DEFAULT_MAX_CACHE_ZOOM: u8 = 10;

/// TTL for cacheable zooms not covered by any band.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Default interval between sweeps of expired entries.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(72 * 3600);

// =============================================================================
// Cache Key
// =============================================================================

/// Identity of a cached tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: DatasetKind,
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
    pub dataset: Arc<str>,
    pub cluster: Option<u32>,
}

impl CacheKey {
    pub fn new(kind: DatasetKind, zoom: u8, x: u32, y: u32, dataset: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            zoom,
            x,
            y,
            dataset: dataset.into(),
            cluster: None,
        }
    }

    pub fn with_cluster(mut self, cluster: Option<u32>) -> Self {
        self.cluster = cluster;
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile:{}:{}:{}:{}:", self.kind, self.zoom, self.x, self.y)?;
        match self.cluster {
            Some(c) => write!(f, "{}", c)?,
            None => f.write_str("-")?,
        }
        write!(f, ":{}", self.dataset)
    }
}

// =============================================================================
// Cache Policy
// =============================================================================

/// TTL applied to an inclusive zoom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlBand {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub ttl: Duration,
}

impl TtlBand {
    pub fn new(min_zoom: u8, max_zoom: u8, ttl: Duration) -> Self {
        Self {
            min_zoom,
            max_zoom,
            ttl,
        }
    }

    pub fn hours(min_zoom: u8, max_zoom: u8, hours: u64) -> Self {
        Self::new(min_zoom, max_zoom, Duration::from_secs(hours.saturating_mul(3600)))
    }

    pub fn contains(&self, zoom: u8) -> bool {
        self.min_zoom <= zoom && zoom <= self.max_zoom
    }

    /// Parse a comma separated band list such as `0-3:168,4-6:72`.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for TtlBand {
    type Err = String;

    /// `MIN-MAX:HOURS`, e.g. `0-3:168`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid TTL band '{}', expected MIN-MAX:HOURS", s);

        let (range, hours) = s.split_once(':').ok_or_else(invalid)?;
        let (min, max) = range.split_once('-').ok_or_else(invalid)?;

        let min_zoom: u8 = min.trim().parse().map_err(|_| invalid())?;
        let max_zoom: u8 = max.trim().parse().map_err(|_| invalid())?;
        let hours: u64 = hours.trim().parse().map_err(|_| invalid())?;
        let secs = hours.checked_mul(3600).ok_or_else(invalid)?;

        if min_zoom > max_zoom {
            return Err(format!(
                "invalid TTL band '{}': min zoom {} above max zoom {}",
                s, min_zoom, max_zoom
            ));
        }

        Ok(Self::new(min_zoom, max_zoom, Duration::from_secs(secs)))
    }
}

/// Decides whether a zoom is cached and for how long.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    pub max_cache_zoom: u8,
    pub default_ttl: Duration,
    /// Checked in order, first match wins
    pub bands: Vec<TtlBand>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_cache_zoom: DEFAULT_MAX_CACHE_ZOOM,
            default_ttl: DEFAULT_TTL,
            bands: vec![TtlBand::hours(0, 3, 168), TtlBand::hours(4, 6, 72)],
        }
    }
}

impl CachePolicy {
    pub fn is_cacheable(&self, zoom: u8) -> bool {
        zoom <= self.max_cache_zoom
    }

    pub fn ttl_for(&self, zoom: u8) -> Duration {
        self.bands
            .iter()
            .find(|band| band.contains(zoom))
            .map(|band| band.ttl)
            .unwrap_or(self.default_ttl)
    }
}

// =============================================================================
// Tile Store
// =============================================================================

/// Key/value store for encoded tiles.
///
/// Failures are reported, but the tile service treats them as soft: a failed
/// `get` is a miss and a failed `set` is logged and ignored.
#[async_trait]
pub trait TileStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &CacheKey, payload: Bytes, ttl: Duration) -> Result<(), CacheError>;
}

/// A cached payload and the TTL it was written with.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
///
/// Overwrites restart the clock with the new entry's TTL.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process [`TileStore`] backed by moka with per-entry TTLs.
///
/// Expired entries are never returned. Moka evicts them during its own
/// maintenance, which [`purge_expired`](Self::purge_expired) runs on demand.
pub struct MemoryTileStore {
    cache: MokaCache<String, CacheEntry>,
}

impl Default for MemoryTileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTileStore {
    pub fn new() -> Self {
        let cache = MokaCache::builder().expire_after(EntryExpiry).build();
        Self { cache }
    }

    /// Like [`new`](Self::new), bounded to `max_entries` tiles.
    pub fn with_max_entries(max_entries: u64) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();
        Self { cache }
    }

    /// Number of live entries, after pending evictions are applied.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evict expired entries now rather than on moka's schedule.
    pub async fn purge_expired(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until
    /// `shutdown` fires.
    pub fn spawn_purge_task(
        self: Arc<Self>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.purge_expired().await;
                        info!(entries = self.cache.entry_count(), "Purged expired tiles from cache");
                    }
                }
            }

            debug!("Cache purge task stopped");
        })
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        Ok(self
            .cache
            .get(&key.to_string())
            .await
            .map(|entry| entry.payload))
    }

    async fn set(&self, key: &CacheKey, payload: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), CacheEntry { payload, ttl })
            .await;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
