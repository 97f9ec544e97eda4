//! Configuration management for the vector tile server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `VTS_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use vector_tile_server::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! println!("Listening on {}", config.bind_address());
//! println!("Data directory: {}", config.data_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! - `VTS_HOST` - Server bind address (default: 0.0.0.0)
//! - `VTS_PORT` - Server port (default: 3000)
//! - `VTS_DATA_DIR` - Directory holding one sub-directory per dataset (required)
//! - `VTS_POINTS_LAYER` - Layer name for point tiles (default: sites)
//! - `VTS_POLYGONS_LAYER` - Layer name for polygon tiles (default: polygons)
//! - `VTS_EXTENT` - MVT extent (default: 4096)
//! - `VTS_BUFFER` - MVT buffer in tile units (default: 64)
//! - `VTS_MIN_POLYGONAL_EXTENT` - Minimum polygon ring area in tile units² (default: 2.0)
//! - `VTS_WORKERS` - Feature evaluation threads (default: available cores)
//! - `VTS_MAX_CACHE_ZOOM` - Highest zoom served from cache (default: 10)
//! - `VTS_CACHE_TTL_HOURS` - Fallback cache TTL in hours (default: 24)
//! - `VTS_CACHE_TTL_BANDS` - Per-zoom TTLs, e.g. `0-3:168,4-6:72`
//! - `VTS_CACHE_PURGE_INTERVAL_HOURS` - Expired entry sweep period (default: 72)
//! - `VTS_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `VTS_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::server::RouterConfig;
use crate::tile::{
    CachePolicy, EncoderSettings, TileSettings, TtlBand, DEFAULT_BUFFER, DEFAULT_EXTENT,
    DEFAULT_MAX_CACHE_ZOOM, DEFAULT_MIN_POLYGONAL_EXTENT, DEFAULT_POINTS_LAYER,
    DEFAULT_POLYGONS_LAYER,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default cache TTL in hours for zooms outside every band.
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 24;

/// Default per-zoom TTL bands.
pub const DEFAULT_CACHE_TTL_BANDS: &str = "0-3:168,4-6:72";

/// Default period between expired-entry sweeps, in hours.
pub const DEFAULT_PURGE_INTERVAL_HOURS: u64 = 72;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Vector Tile Server - Mapbox Vector Tiles from tabular datasets.
///
/// Builds point and polygon tiles on demand, caches low zooms in memory
/// and serves them gzip-compressed over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "vector-tile-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "VTS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "VTS_PORT")]
    pub port: u16,

    // =========================================================================
    // Data Configuration
    // =========================================================================
    /// Directory containing one sub-directory per dataset.
    #[arg(long, env = "VTS_DATA_DIR")]
    pub data_dir: PathBuf,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Layer name used for point tiles.
    #[arg(long, default_value = DEFAULT_POINTS_LAYER, env = "VTS_POINTS_LAYER")]
    pub points_layer: String,

    /// Layer name used for polygon tiles.
    #[arg(long, default_value = DEFAULT_POLYGONS_LAYER, env = "VTS_POLYGONS_LAYER")]
    pub polygons_layer: String,

    /// MVT extent (tile units per side).
    #[arg(long, default_value_t = DEFAULT_EXTENT, env = "VTS_EXTENT")]
    pub extent: u32,

    /// Clip buffer around the tile, in tile units.
    #[arg(long, default_value_t = DEFAULT_BUFFER, env = "VTS_BUFFER")]
    pub buffer: u32,

    /// Polygon rings with a smaller area (tile units²) are dropped.
    #[arg(long, default_value_t = DEFAULT_MIN_POLYGONAL_EXTENT, env = "VTS_MIN_POLYGONAL_EXTENT")]
    pub min_polygonal_extent: f64,

    /// Number of threads used to evaluate features.
    ///
    /// Defaults to the number of available cores.
    #[arg(long, env = "VTS_WORKERS")]
    pub workers: Option<usize>,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Tiles above this zoom are never cached.
    #[arg(long, default_value_t = DEFAULT_MAX_CACHE_ZOOM, env = "VTS_MAX_CACHE_ZOOM")]
    pub max_cache_zoom: u8,

    /// Cache TTL in hours for zooms not covered by a band.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_HOURS, env = "VTS_CACHE_TTL_HOURS")]
    pub cache_default_ttl_hours: u64,

    /// Per-zoom cache TTLs as `min-max:hours`, comma-separated.
    #[arg(long, default_value = DEFAULT_CACHE_TTL_BANDS, env = "VTS_CACHE_TTL_BANDS")]
    pub cache_ttl_bands: String,

    /// Period between sweeps of expired cache entries, in hours.
    #[arg(
        long,
        default_value_t = DEFAULT_PURGE_INTERVAL_HOURS,
        env = "VTS_CACHE_PURGE_INTERVAL_HOURS"
    )]
    pub cache_purge_interval_hours: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "VTS_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "VTS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("Data directory is required. Set --data-dir or VTS_DATA_DIR".to_string());
        }

        if self.points_layer.is_empty() || self.polygons_layer.is_empty() {
            return Err("Layer names must not be empty".to_string());
        }

        if self.extent == 0 {
            return Err("extent must be greater than 0".to_string());
        }

        if !self.min_polygonal_extent.is_finite() || self.min_polygonal_extent < 0.0 {
            return Err("min_polygonal_extent must be a non-negative number".to_string());
        }

        if self.workers == Some(0) {
            return Err("workers must be greater than 0".to_string());
        }

        if self.cache_purge_interval_hours == 0 {
            return Err("cache_purge_interval_hours must be greater than 0".to_string());
        }

        hours_to_duration(self.cache_default_ttl_hours, "cache_default_ttl_hours")?;
        hours_to_duration(self.cache_purge_interval_hours, "cache_purge_interval_hours")?;

        TtlBand::parse_list(&self.cache_ttl_bands)
            .map_err(|e| format!("Invalid cache_ttl_bands: {}", e))?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the feature assembler.
    pub fn tile_settings(&self) -> TileSettings {
        let settings = TileSettings::default()
            .with_layer_names(self.points_layer.clone(), self.polygons_layer.clone());

        match self.workers {
            Some(n) => settings.with_workers(n),
            None => settings,
        }
    }

    /// Cache policy built from the zoom limit and TTL bands.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `cache_ttl_bands` is malformed.
    pub fn cache_policy(&self) -> Result<CachePolicy, String> {
        Ok(CachePolicy {
            max_cache_zoom: self.max_cache_zoom,
            default_ttl: hours_to_duration(self.cache_default_ttl_hours, "cache_default_ttl_hours")?,
            bands: TtlBand::parse_list(&self.cache_ttl_bands)?,
        })
    }

    /// Settings for the MVT encoder.
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            extent: self.extent,
            buffer: self.buffer,
            min_polygonal_extent: self.min_polygonal_extent,
        }
    }

    /// Router configuration (CORS, max-age, tracing).
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new().with_cache_max_age(self.cache_max_age);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config.with_tracing(!self.no_tracing)
    }

    /// Period between expired-entry sweeps.
    ///
    /// Saturates for out-of-range values; `validate()` rejects those.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.cache_purge_interval_hours.saturating_mul(3600))
    }
}

fn hours_to_duration(hours: u64, name: &str) -> Result<Duration, String> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("{} is too large: {} hours", name, hours))
}

// =============================================================================
// Tests
// =============================================================================
