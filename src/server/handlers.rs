//! HTTP request handlers for the vector tile API.
//!
//! This module contains the Axum handlers for serving tiles, polygon bounds
//! and health checks.
//!
//! # Endpoints
//!
//! - `GET /tiles/{zoom}/{x}/{y}/{uuid}` - Point tile (`uuid` may end in `.mvt`)
//! - `GET /tiles/{zoom}/{x}/{y}/{cluster}/{uuid}` - Point tile with cluster flag
//! - `GET /tiles/polygons/{zoom}/{x}/{y}/{uuid}` - Polygon tile
//! - `GET /tiles/polygons/bounds/{id}` - Stored bounds of one polygon
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{SourceError, TileError};
use crate::geometry::TileCoordinate;
use crate::source::{validate_dataset_id, PolygonBounds, RowSource};
use crate::tile::{DatasetKind, TileRequest, TileResponse, TileService};

/// Media type of Mapbox Vector Tiles.
pub const MVT_CONTENT_TYPE: &str = "application/x-protobuf";

/// Response header reporting whether the tile came from the cache.
pub const CACHE_HIT_HEADER: &str = "x-tile-cache-hit";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<R: RowSource> {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService<R>>,

    /// Cache-Control max-age in seconds for tile responses
    pub cache_max_age: u32,
}

impl<R: RowSource> AppState<R> {
    /// Create a new application state with a one hour max-age.
    pub fn new(tile_service: TileService<R>) -> Self {
        Self::with_cache_max_age(tile_service, 3600)
    }

    pub fn with_cache_max_age(tile_service: TileService<R>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

impl<R: RowSource> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for point and polygon tile requests.
///
/// Extracted from `/tiles/{zoom}/{x}/{y}/{uuid}` and
/// `/tiles/polygons/{zoom}/{x}/{y}/{uuid}`.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub zoom: u32,
    pub x: u32,
    pub y: u32,

    /// Dataset identifier with optional `.mvt` extension
    pub uuid: String,
}

impl TilePathParams {
    /// Dataset id with any `.mvt` extension removed.
    pub fn dataset(&self) -> &str {
        strip_extension(&self.uuid)
    }

    /// Validate the coordinate and dataset and build a service request.
    pub fn to_request(&self, kind: DatasetKind) -> Result<TileRequest, TileError> {
        build_request(kind, self.zoom, self.x, self.y, self.dataset())
    }
}

/// Path parameters for clustered point tiles.
///
/// Extracted from `/tiles/{zoom}/{x}/{y}/{cluster}/{uuid}`.
#[derive(Debug, Deserialize)]
pub struct ClusterTilePathParams {
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
    pub cluster: u32,
    pub uuid: String,
}

impl ClusterTilePathParams {
    pub fn to_request(&self) -> Result<TileRequest, TileError> {
        let request = build_request(
            DatasetKind::Points,
            self.zoom,
            self.x,
            self.y,
            strip_extension(&self.uuid),
        )?;
        Ok(request.with_cluster(self.cluster))
    }
}

fn strip_extension(uuid: &str) -> &str {
    uuid.strip_suffix(".mvt").unwrap_or(uuid)
}

fn build_request(
    kind: DatasetKind,
    zoom: u32,
    x: u32,
    y: u32,
    dataset: &str,
) -> Result<TileRequest, TileError> {
    let coord = TileCoordinate::new(zoom, x, y)?;
    validate_dataset_id(dataset).map_err(|e| TileError::InvalidRequest {
        message: e.to_string(),
    })?;
    Ok(TileRequest::new(kind, coord, dataset))
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_coordinate", "source_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404s at DEBUG and other 4xx at WARN.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::InvalidCoordinate { .. } => (StatusCode::BAD_REQUEST, "invalid_coordinate"),
            TileError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
            TileError::Source(SourceError::InvalidDataset(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_dataset")
            }
            TileError::PolygonNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TileError::Source(_) => (StatusCode::INTERNAL_SERVER_ERROR, "source_error"),
            TileError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            TileError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            TileError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Wrapper for handler errors to implement IntoResponse.
pub struct HandlerError(pub TileError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle point tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{zoom}/{x}/{y}/{uuid}`
///
/// # Response
///
/// - `200 OK`: gzip-compressed MVT
/// - `400 Bad Request`: Coordinate outside the zoom's grid or bad dataset id
/// - `500 Internal Server Error`: Row source or encoding failure
///
/// # Headers
///
/// - `Content-Type: application/x-protobuf`
/// - `Content-Encoding: gzip`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
pub async fn points_tile_handler<R: RowSource + 'static>(
    State(state): State<AppState<R>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, HandlerError> {
    let request = params.to_request(DatasetKind::Points)?;
    serve_tile(&state, request).await
}

/// Handle point tile requests carrying a cluster flag.
///
/// `GET /tiles/{zoom}/{x}/{y}/{cluster}/{uuid}`
pub async fn cluster_tile_handler<R: RowSource + 'static>(
    State(state): State<AppState<R>>,
    Path(params): Path<ClusterTilePathParams>,
) -> Result<Response, HandlerError> {
    let request = params.to_request()?;
    serve_tile(&state, request).await
}

/// Handle polygon tile requests.
///
/// `GET /tiles/polygons/{zoom}/{x}/{y}/{uuid}`
pub async fn polygons_tile_handler<R: RowSource + 'static>(
    State(state): State<AppState<R>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, HandlerError> {
    let request = params.to_request(DatasetKind::Polygons)?;
    serve_tile(&state, request).await
}

/// Handle polygon bounds lookups.
///
/// # Endpoint
///
/// `GET /tiles/polygons/bounds/{id}`
///
/// # Response
///
/// `200 OK` with the stored bounds as JSON, `404 Not Found` for unknown ids.
pub async fn polygon_bounds_handler<R: RowSource + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<i32>,
) -> Result<Json<PolygonBounds>, HandlerError> {
    match state.tile_service.polygon_bounds(id).await? {
        Some(bounds) => Ok(Json(bounds)),
        None => Err(TileError::PolygonNotFound { id }.into()),
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the pipeline for one request.
///
/// The token is cancelled when this future is dropped, which is what happens
/// when the client goes away mid-request.
async fn serve_tile<R: RowSource>(
    state: &AppState<R>,
    request: TileRequest,
) -> Result<Response, HandlerError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state.tile_service.get_tile(&request, &cancel).await?;
    Ok(tile_response(response, state.cache_max_age))
}

fn tile_response(response: TileResponse, cache_max_age: u32) -> Response {
    (
        [
            (header::CONTENT_TYPE, MVT_CONTENT_TYPE.to_string()),
            (header::CONTENT_ENCODING, "gzip".to_string()),
            (header::VARY, "Accept-Encoding".to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", cache_max_age),
            ),
            (
                HeaderName::from_static(CACHE_HIT_HEADER),
                response.cache_hit.to_string(),
            ),
        ],
        response.data,
    )
        .into_response()
}
