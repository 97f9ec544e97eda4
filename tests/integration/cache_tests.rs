//! Cache behavior tests.
//!
//! Tests verify:
//! - Zooms above the cache threshold never touch the store
//! - Cached zooms read before generating and write after
//! - TTLs follow the zoom bands
//! - Failed requests leave nothing behind

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use vector_tile_server::error::TileError;
use vector_tile_server::geometry::TileCoordinate;
use vector_tile_server::server::{create_router, RouterConfig};
use vector_tile_server::tile::{CachePolicy, TileRequest, TtlBand};

use super::test_utils::{point_row, test_service, MockRowSource, RecordingStore, BROKEN_DATASET};

const HOUR: u64 = 3600;

fn source() -> MockRowSource {
    MockRowSource::new().with_points("ds", vec![point_row(0.01, 0.01, 1)])
}

fn points(zoom: u32, x: u32, y: u32) -> TileRequest {
    TileRequest::points(TileCoordinate::new(zoom, x, y).unwrap(), "ds")
}

// =============================================================================
// Cache Bypass
// =============================================================================

#[tokio::test]
async fn test_zoom_above_threshold_bypasses_store() {
    let source = source();
    let queries = source.query_counter();
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source).with_store(store.clone());
    let cancel = CancellationToken::new();

    // Default threshold is zoom 10
    let request = points(11, 1024, 1023);

    let first = service.get_tile(&request, &cancel).await.unwrap();
    let second = service.get_tile(&request, &cancel).await.unwrap();

    assert!(!first.cache_hit);
    assert!(!second.cache_hit);
    assert_eq!(store.get_count(), 0);
    assert_eq!(store.set_count(), 0);
    assert_eq!(queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_threshold_zoom_is_cached() {
    let source = source();
    let queries = source.query_counter();
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source).with_store(store.clone());
    let cancel = CancellationToken::new();

    let request = points(10, 512, 511);

    let first = service.get_tile(&request, &cancel).await.unwrap();
    assert!(!first.cache_hit);
    assert_eq!(store.get_count(), 1);
    assert_eq!(store.set_count(), 1);

    let second = service.get_tile(&request, &cancel).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(store.get_count(), 2);
    assert_eq!(store.set_count(), 1);
    assert_eq!(first.data, second.data);

    assert_eq!(queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_custom_threshold() {
    let store = Arc::new(RecordingStore::new());
    let policy = CachePolicy {
        max_cache_zoom: 2,
        ..CachePolicy::default()
    };
    let service = test_service(source())
        .with_store(store.clone())
        .with_policy(policy);
    let cancel = CancellationToken::new();

    service.get_tile(&points(2, 0, 0), &cancel).await.unwrap();
    service.get_tile(&points(3, 0, 0), &cancel).await.unwrap();

    assert_eq!(store.get_count(), 1);
    assert_eq!(store.set_count(), 1);
}

// =============================================================================
// TTL Bands
// =============================================================================

#[tokio::test]
async fn test_ttl_follows_zoom_bands() {
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source()).with_store(store.clone());
    let cancel = CancellationToken::new();

    service.get_tile(&points(2, 1, 1), &cancel).await.unwrap();
    service.get_tile(&points(5, 3, 7), &cancel).await.unwrap();
    service.get_tile(&points(8, 100, 90), &cancel).await.unwrap();

    let writes = store.writes();
    assert_eq!(writes.len(), 3);

    let ttl_of = |key: &str| {
        writes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, ttl)| *ttl)
            .unwrap()
    };

    assert_eq!(
        ttl_of("tile:points:2:1:1:-:ds"),
        Duration::from_secs(168 * HOUR)
    );
    assert_eq!(
        ttl_of("tile:points:5:3:7:-:ds"),
        Duration::from_secs(72 * HOUR)
    );
    assert_eq!(
        ttl_of("tile:points:8:100:90:-:ds"),
        Duration::from_secs(24 * HOUR)
    );
}

#[tokio::test]
async fn test_custom_ttl_bands() {
    let store = Arc::new(RecordingStore::new());
    let policy = CachePolicy {
        max_cache_zoom: 10,
        default_ttl: Duration::from_secs(HOUR),
        bands: TtlBand::parse_list("0-1:2").unwrap(),
    };
    let service = test_service(source())
        .with_store(store.clone())
        .with_policy(policy);
    let cancel = CancellationToken::new();

    service.get_tile(&points(1, 0, 0), &cancel).await.unwrap();
    service.get_tile(&points(4, 0, 0), &cancel).await.unwrap();

    let mut ttls: Vec<Duration> = store.writes().into_iter().map(|(_, ttl)| ttl).collect();
    ttls.sort();
    assert_eq!(
        ttls,
        vec![Duration::from_secs(HOUR), Duration::from_secs(2 * HOUR)]
    );
}

// =============================================================================
// Cache Keys
// =============================================================================

#[tokio::test]
async fn test_kind_dataset_and_cluster_are_part_of_key() {
    let source = source()
        .with_points("other", vec![point_row(0.01, 0.01, 5)])
        .with_polygons("ds", vec![]);
    let queries = source.query_counter();
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source).with_store(store.clone());
    let cancel = CancellationToken::new();
    let coord = TileCoordinate::new(0, 0, 0).unwrap();

    let requests = [
        TileRequest::points(coord, "ds"),
        TileRequest::points(coord, "other"),
        TileRequest::polygons(coord, "ds"),
        TileRequest::points(coord, "ds").with_cluster(1),
    ];
    for request in &requests {
        let response = service.get_tile(request, &cancel).await.unwrap();
        assert!(!response.cache_hit);
    }

    assert_eq!(queries.load(Ordering::SeqCst), 4);

    let mut keys: Vec<String> = store.writes().into_iter().map(|(k, _)| k).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "tile:points:0:0:0:-:ds",
            "tile:points:0:0:0:-:other",
            "tile:points:0:0:0:1:ds",
            "tile:polygons:0:0:0:-:ds",
        ]
    );
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_source_error_not_cached() {
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source()).with_store(store.clone());
    let cancel = CancellationToken::new();
    let request = TileRequest::points(TileCoordinate::new(0, 0, 0).unwrap(), BROKEN_DATASET);

    let result = service.get_tile(&request, &cancel).await;
    assert!(matches!(result, Err(TileError::Source(_))));
    assert_eq!(store.get_count(), 1);
    assert_eq!(store.set_count(), 0);
}

#[tokio::test]
async fn test_cancelled_request_not_cached() {
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source()).with_store(store.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service.get_tile(&points(0, 0, 0), &cancel).await;
    assert!(matches!(result, Err(TileError::Cancelled)));
    assert_eq!(store.set_count(), 0);
}

// =============================================================================
// Over HTTP
// =============================================================================

#[tokio::test]
async fn test_http_bypass_header() {
    let store = Arc::new(RecordingStore::new());
    let service = test_service(source()).with_store(store.clone());
    let router = create_router(service, RouterConfig::new().with_tracing(false));

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/tiles/12/2048/2047/ds")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-tile-cache-hit").unwrap(), "false");
    }

    assert_eq!(store.get_count(), 0);
    assert_eq!(store.set_count(), 0);
}
