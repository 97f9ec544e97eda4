//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Point, cluster and polygon tile routes
//! - Polygon bounds lookups
//! - Error cases (invalid coordinates, bad dataset ids, failing sources)
//! - HTTP response codes and headers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vector_tile_server::source::PolygonBounds;

use super::test_utils::{
    decode_tile, point_row, polygon_row, tag, test_router, MockRowSource, BROKEN_DATASET,
};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn sample_source() -> MockRowSource {
    MockRowSource::new()
        .with_points(
            "sites-a",
            vec![point_row(10.0, 45.0, 3), point_row(-120.0, 30.0, 7)],
        )
        .with_polygons(
            "zones",
            vec![polygon_row(
                "POLYGON((5 40, 15 40, 15 50, 5 50, 5 40))",
                11,
                "alps",
            )],
        )
}

// =============================================================================
// Point Tiles
// =============================================================================

#[tokio::test]
async fn test_point_tile_success() {
    let router = test_router(sample_source());

    let response = router.oneshot(get("/tiles/0/0/0/sites-a")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers.get("content-type").unwrap(),
        "application/x-protobuf"
    );
    assert_eq!(headers.get("content-encoding").unwrap(), "gzip");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=3600");
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let tile = decode_tile(&body);

    assert_eq!(tile.layers.len(), 1);
    let layer = &tile.layers[0];
    assert_eq!(layer.name, "sites");
    assert_eq!(layer.features.len(), 2);

    let mut counts: Vec<i64> = layer
        .features
        .iter()
        .filter_map(|f| tag(layer, f, "count").and_then(|v| v.sint_value))
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![3, 7]);
}

#[tokio::test]
async fn test_point_tile_filters_to_tile_bounds() {
    let router = test_router(sample_source());

    // z1/1/0 covers the north-east quadrant only
    let response = router.oneshot(get("/tiles/1/1/0/sites-a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let tile = decode_tile(&body);
    let layer = &tile.layers[0];

    assert_eq!(layer.features.len(), 1);
    assert_eq!(
        tag(layer, &layer.features[0], "count").and_then(|v| v.sint_value),
        Some(3)
    );
}

#[tokio::test]
async fn test_point_tile_with_mvt_extension() {
    let router = test_router(sample_source());

    let response = router
        .oneshot(get("/tiles/0/0/0/sites-a.mvt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(decode_tile(&body).layers[0].features.len(), 2);
}

#[tokio::test]
async fn test_unknown_dataset_yields_empty_layer() {
    let router = test_router(sample_source());

    let response = router
        .oneshot(get("/tiles/3/4/2/no-such-dataset"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let tile = decode_tile(&body);
    assert_eq!(tile.layers.len(), 1);
    assert_eq!(tile.layers[0].name, "sites");
    assert!(tile.layers[0].features.is_empty());
}

#[tokio::test]
async fn test_cache_hit_header() {
    let router = test_router(sample_source());

    let first = router
        .clone()
        .oneshot(get("/tiles/2/2/1/sites-a"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-tile-cache-hit").unwrap(), "false");
    let first_body = first.into_body().collect().await.unwrap().to_bytes();

    let second = router.oneshot(get("/tiles/2/2/1/sites-a")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-tile-cache-hit").unwrap(), "true");
    let second_body = second.into_body().collect().await.unwrap().to_bytes();

    assert_eq!(first_body, second_body);
}

// =============================================================================
// Cluster Tiles
// =============================================================================

#[tokio::test]
async fn test_cluster_route_forwards_flag() {
    let source = sample_source();
    let clusters = source.cluster_log();
    let router = test_router(source);

    let response = router
        .oneshot(get("/tiles/0/0/0/1/sites-a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let tile = decode_tile(&body);
    assert_eq!(tile.layers[0].name, "sites");

    assert_eq!(*clusters.lock().unwrap(), vec![Some(1)]);
}

// =============================================================================
// Polygon Tiles
// =============================================================================

#[tokio::test]
async fn test_polygon_tile_success() {
    let router = test_router(sample_source());

    let response = router
        .oneshot(get("/tiles/polygons/0/0/0/zones"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-protobuf"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let tile = decode_tile(&body);

    assert_eq!(tile.layers.len(), 1);
    let layer = &tile.layers[0];
    assert_eq!(layer.name, "polygons");
    assert_eq!(layer.features.len(), 1);

    let feature = &layer.features[0];
    assert_eq!(tag(layer, feature, "id").and_then(|v| v.sint_value), Some(11));
    assert_eq!(
        tag(layer, feature, "name").and_then(|v| v.string_value),
        Some("alps".to_string())
    );
    assert!(tag(layer, feature, "geometry_wkt").is_none());
}

#[tokio::test]
async fn test_polygon_tile_outside_bounds_is_empty() {
    let router = test_router(sample_source());

    // z1/0/1 is the south-west quadrant
    let response = router
        .oneshot(get("/tiles/polygons/1/0/1/zones"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let tile = decode_tile(&body);
    assert_eq!(tile.layers[0].name, "polygons");
    assert!(tile.layers[0].features.is_empty());
}

// =============================================================================
// Polygon Bounds
// =============================================================================

#[tokio::test]
async fn test_polygon_bounds_found() {
    let source = sample_source().with_bounds(PolygonBounds {
        id: 42,
        name: "Lombardy".to_string(),
        level: 4,
        kind: "region".to_string(),
        center_lng: 9.8,
        center_lat: 45.6,
        bounds_west: 8.5,
        bounds_south: 44.7,
        bounds_east: 11.4,
        bounds_north: 46.6,
    });
    let router = test_router(source);

    let response = router
        .oneshot(get("/tiles/polygons/bounds/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], 42);
    assert_eq!(json["name"], "Lombardy");
    assert_eq!(json["type"], "region");
    assert_eq!(json["centerLng"], 9.8);
    assert_eq!(json["boundsNorth"], 46.6);
}

#[tokio::test]
async fn test_polygon_bounds_not_found() {
    let router = test_router(sample_source());

    let response = router
        .oneshot(get("/tiles/polygons/bounds/999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_invalid_coordinate() {
    let router = test_router(sample_source());

    // Only x in 0..2 exists at zoom 1
    let response = router.oneshot(get("/tiles/1/5/0/sites-a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_coordinate");
}

#[tokio::test]
async fn test_zoom_above_maximum() {
    let router = test_router(sample_source());

    let response = router.oneshot(get("/tiles/25/0/0/sites-a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_numeric_coordinate() {
    let router = test_router(sample_source());

    let response = router.oneshot(get("/tiles/abc/0/0/sites-a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_dataset_id() {
    let router = test_router(sample_source());

    let response = router.oneshot(get("/tiles/0/0/0/a..b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_source_failure() {
    let router = test_router(sample_source());

    let uri = format!("/tiles/0/0/0/{}", BROKEN_DATASET);
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "source_error");
    assert_eq!(json["status"], 500);
}

#[tokio::test]
async fn test_unknown_route() {
    let router = test_router(sample_source());

    let response = router.oneshot(get("/tiles/0/0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = test_router(MockRowSource::new());

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}
