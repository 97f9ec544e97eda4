//! File-backed row source.
//!
//! Layout under the data directory:
//!
//! ```text
//! {data_dir}/
//! ├── polygon_bounds.json          [{ "id": 1, "name": ..., "centerLng": ... }]
//! └── {dataset}/
//!     ├── points.json              [{ "geo_lon": 10.5, "geo_lat": 45.1, "count": 3 }]
//!     └── polygons.json            [{ "geometry_wkt": "POLYGON(...)", "name": ... }]
//! ```
//!
//! Every file holds a JSON array of objects. Object keys become row columns in
//! document order. A missing file means "no rows".

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::tile::{DatasetKind, TileRequest};

use super::{validate_dataset_id, PolygonBounds, Row, RowSource, Value};

/// File name of the polygon bounds table inside the data directory.
pub const POLYGON_BOUNDS_FILE: &str = "polygon_bounds.json";

/// Row source reading JSON files from a local directory.
///
/// Files are re-read on every query, so edits show up without a restart
/// (subject to the tile cache). The cluster flag is ignored.
#[derive(Debug, Clone)]
pub struct JsonRowSource {
    data_dir: PathBuf,
}

impl JsonRowSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn dataset_file(&self, dataset: &str, kind: DatasetKind) -> PathBuf {
        let file = match kind {
            DatasetKind::Points => "points.json",
            DatasetKind::Polygons => "polygons.json",
        };
        self.data_dir.join(dataset).join(file)
    }
}

#[async_trait]
impl RowSource for JsonRowSource {
    async fn query_rows(&self, request: &TileRequest) -> Result<Vec<Row>, SourceError> {
        validate_dataset_id(&request.dataset)?;

        let path = self.dataset_file(&request.dataset, request.kind);
        let Some(bytes) = read_optional(&path).await? else {
            debug!(path = %path.display(), "Dataset file not found, returning no rows");
            return Ok(Vec::new());
        };

        let document: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Malformed(format!("{}: {}", path.display(), e)))?;

        rows_from_json(document)
            .map_err(|message| SourceError::Malformed(format!("{}: {}", path.display(), message)))
    }

    async fn polygon_bounds(&self, id: i32) -> Result<Option<PolygonBounds>, SourceError> {
        let path = self.data_dir.join(POLYGON_BOUNDS_FILE);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };

        let all: Vec<PolygonBounds> = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Malformed(format!("{}: {}", path.display(), e)))?;

        Ok(all.into_iter().find(|b| b.id == id))
    }
}

/// Read a file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SourceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SourceError::Connection(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn rows_from_json(document: serde_json::Value) -> Result<Vec<Row>, String> {
    let serde_json::Value::Array(items) = document else {
        return Err("expected a JSON array of objects".to_string());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_json::Value::Object(map) => Ok(Row::from(
                map.into_iter()
                    .map(|(name, value)| (name, value_from_json(value)))
                    .collect::<Vec<_>>(),
            )),
            _ => Err(format!("element {} is not an object", index)),
        })
        .collect()
}

fn value_from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(b as i64),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Text(s),
        other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            Value::Text(other.to_string())
        }
    }
}
