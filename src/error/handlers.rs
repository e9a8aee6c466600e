//! Error handlers
//!
//! Maps storage errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};
use serde::Serialize;

use crate::error::types::{ErrorKind, StorageError};

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Convert an error kind to its HTTP status code
pub fn error_to_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MissingIdentifier => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidName => StatusCode::BAD_REQUEST,
        ErrorKind::OutsideRoot => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::IoFailure => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::EmptyResult => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::CorruptStream => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a storage error at a level matching who caused it
pub fn handle_error(err: &StorageError) {
    if err.kind().is_client_error() {
        warn!("Request rejected: {err}");
    } else {
        error!("Storage failure: {err}");
    }
}

/// Message safe to show the client.
///
/// Client errors only ever carry the name the client sent. Server faults
/// carry absolute and temp-file paths, so they are summarised by kind and
/// the details stay in the log.
pub fn client_message(err: &StorageError) -> String {
    let kind = err.kind();
    if kind.is_client_error() {
        return err.to_string();
    }
    match kind {
        ErrorKind::EmptyResult => "Upload produced no data".to_string(),
        ErrorKind::CorruptStream => "Compressed upload is corrupt".to_string(),
        _ => "Storage operation failed".to_string(),
    }
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        handle_error(&self);
        let kind = self.kind();
        let body = ErrorBody {
            error: kind.as_str(),
            message: client_message(&self),
        };
        (error_to_status(kind), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            error_to_status(ErrorKind::MissingIdentifier),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(error_to_status(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            error_to_status(ErrorKind::InvalidName),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_to_status(ErrorKind::CorruptStream),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_faults_hide_paths() {
        let err = StorageError::from(crate::error::DecompressError::CorruptStream {
            path: std::path::PathBuf::from("/srv/upload/x.txt/.rax-ab12cd.tmp"),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "bad header"),
        });
        let message = client_message(&err);
        assert!(!message.contains("/srv/upload"));
        assert!(!message.contains(".rax-"));

        let err = StorageError::io(
            "rename onto",
            "/srv/upload/x.txt",
            std::io::Error::other("disk gone"),
        );
        assert_eq!(client_message(&err), "Storage operation failed");

        let err = StorageError::NotFound("docs/a.txt".into());
        assert_eq!(client_message(&err), "File not found: docs/a.txt");
    }

    #[test]
    fn test_response_status() {
        let response = StorageError::NotFound("a.txt".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
