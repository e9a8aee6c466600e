//! HTTP routes
//!
//! Thin adapters between axum requests and [`StorageGateway`]. Both the
//! header-based routes (`filename` header, as sent by the sync client) and
//! the path-based `/files/*path` routes end up in the same gateway calls.

use std::io;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{PathError, StorageError};
use crate::middleware::log_request;
use crate::storage::{IngestOptions, StorageGateway};

/// Header carrying the path hint on `/uploadfile/` and `/deletefile/`
pub const FILENAME_HEADER: &str = "filename";

const GZIP_CONTENT_TYPES: &[&str] = &["application/gzip", "application/x-gzip"];

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub decompress: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub stored_path: String,
    pub size: u64,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub filename: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub names: Vec<String>,
}

// ==================
// Routes
// ==================

/// Build the application router
pub fn router(gateway: Arc<StorageGateway>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/uploadfile/", post(upload_file_handler))
        .route("/deletefile/", delete(delete_file_handler))
        .route("/files", get(list_files_handler))
        .route(
            "/files/*path",
            get(download_file_handler)
                .put(put_file_handler)
                .delete(delete_path_handler),
        )
        // Bodies are streamed to disk and bounded by the gateway's own limit
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(log_request))
        .with_state(gateway)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload_file_handler(
    State(gateway): State<Arc<StorageGateway>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, StorageError> {
    let hint = header_hint(&headers)?;
    ingest_body(&gateway, hint.as_deref(), &query, &headers, body).await
}

async fn put_file_handler(
    State(gateway): State<Arc<StorageGateway>>,
    Path(path): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, StorageError> {
    ingest_body(&gateway, Some(path.as_str()), &query, &headers, body).await
}

async fn delete_file_handler(
    State(gateway): State<Arc<StorageGateway>>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, StorageError> {
    let hint = header_hint(&headers)?;
    delete_hint(&gateway, hint.as_deref()).await
}

async fn delete_path_handler(
    State(gateway): State<Arc<StorageGateway>>,
    Path(path): Path<String>,
) -> Result<Json<DeleteResponse>, StorageError> {
    delete_hint(&gateway, Some(path.as_str())).await
}

async fn list_files_handler(
    State(gateway): State<Arc<StorageGateway>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, StorageError> {
    let names = gateway.list(query.dir.as_deref()).await?;
    Ok(Json(ListResponse { names }))
}

async fn download_file_handler(
    State(gateway): State<Arc<StorageGateway>>,
    Path(path): Path<String>,
) -> Result<Response, StorageError> {
    let fetched = gateway.fetch(Some(path.as_str())).await?;
    let body = Body::from_stream(ReaderStream::with_capacity(
        fetched.file,
        gateway.limits().buffer_size.max(1),
    ));

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, fetched.size.to_string()),
        ],
        body,
    )
        .into_response())
}

// ==================
// Helpers
// ==================

async fn ingest_body(
    gateway: &StorageGateway,
    hint: Option<&str>,
    query: &UploadQuery,
    headers: &HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, StorageError> {
    let options = IngestOptions {
        decompress: wants_decompress(query, headers),
        expected_len: content_length(headers),
    };

    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    tokio::pin!(reader);

    let stored = gateway.ingest(hint, reader, options).await?;

    Ok(Json(UploadResponse {
        filename: hint.unwrap_or_default().to_string(),
        stored_path: stored.relative_path,
        size: stored.size,
        status: "File uploaded and stored successfully",
    }))
}

async fn delete_hint(
    gateway: &StorageGateway,
    hint: Option<&str>,
) -> Result<Json<DeleteResponse>, StorageError> {
    gateway.delete(hint).await?;
    Ok(Json(DeleteResponse {
        filename: hint.unwrap_or_default().to_string(),
        status: "File deleted successfully",
    }))
}

/// Reads the `filename` header. Names are UTF-8, so non-ASCII names sent
/// as raw bytes are accepted; bytes that are not UTF-8 are an invalid name.
fn header_hint(headers: &HeaderMap) -> Result<Option<String>, StorageError> {
    let Some(value) = headers.get(FILENAME_HEADER) else {
        return Ok(None);
    };
    match std::str::from_utf8(value.as_bytes()) {
        Ok(name) => Ok(Some(name.to_string())),
        Err(_) => Err(PathError::InvalidName(
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
        .into()),
    }
}

/// An explicit `?decompress=` wins; otherwise a gzip content type means the
/// body must be unwrapped.
fn wants_decompress(query: &UploadQuery, headers: &HeaderMap) -> bool {
    query.decompress.unwrap_or_else(|| {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| ct.split(';').next())
            .map(|ct| {
                let ct = ct.trim();
                GZIP_CONTENT_TYPES
                    .iter()
                    .any(|gz| ct.eq_ignore_ascii_case(gz))
            })
            .unwrap_or(false)
    })
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
