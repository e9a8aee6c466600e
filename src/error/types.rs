//! Error types
//!
//! Defines one error type per ingestion stage plus the gateway error that
//! wraps them. Every error can be reduced to an [`ErrorKind`] so the transport
//! layer can tell client mistakes from server faults.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Stable classification of every failure the storage core can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingIdentifier,
    InvalidName,
    OutsideRoot,
    IoFailure,
    EmptyResult,
    CorruptStream,
    NotFound,
    TooLarge,
}

impl ErrorKind {
    /// Machine-readable name used in JSON error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingIdentifier => "missing_identifier",
            ErrorKind::InvalidName => "invalid_name",
            ErrorKind::OutsideRoot => "outside_root",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::CorruptStream => "corrupt_stream",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TooLarge => "too_large",
        }
    }

    /// True for failures caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::MissingIdentifier
                | ErrorKind::InvalidName
                | ErrorKind::OutsideRoot
                | ErrorKind::NotFound
                | ErrorKind::TooLarge
        )
    }
}

/// Path resolution errors
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Empty path")]
    Empty,

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Path escapes storage root: {0}")]
    OutsideRoot(String),

    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PathError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PathError::Empty => ErrorKind::MissingIdentifier,
            PathError::InvalidName(_) => ErrorKind::InvalidName,
            PathError::OutsideRoot(_) => ErrorKind::OutsideRoot,
            PathError::Io { .. } => ErrorKind::IoFailure,
        }
    }
}

/// Temp-file write and promotion errors
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Upload source failed after {received} bytes: {source}")]
    Source {
        received: u64,
        #[source]
        source: io::Error,
    },

    #[error("Upload truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("Upload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Empty result for {0}")]
    EmptyResult(PathBuf),
}

impl WriteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WriteError::Io { .. } | WriteError::Source { .. } | WriteError::Truncated { .. } => {
                ErrorKind::IoFailure
            }
            WriteError::TooLarge { .. } => ErrorKind::TooLarge,
            WriteError::EmptyResult(_) => ErrorKind::EmptyResult,
        }
    }
}

/// Decompression stage errors
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("Corrupt compressed stream in {path}: {source}")]
    CorruptStream {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Decompressed output exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Empty result for {0}")]
    EmptyResult(PathBuf),
}

impl DecompressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecompressError::CorruptStream { .. } => ErrorKind::CorruptStream,
            DecompressError::Io { .. } => ErrorKind::IoFailure,
            DecompressError::TooLarge { .. } => ErrorKind::TooLarge,
            DecompressError::EmptyResult(_) => ErrorKind::EmptyResult,
        }
    }
}

/// Storage gateway errors, surfaced to the transport layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No file name supplied")]
    MissingIdentifier,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Decompress(#[from] DecompressError),

    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::MissingIdentifier => ErrorKind::MissingIdentifier,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Path(e) => e.kind(),
            StorageError::Write(e) => e.kind(),
            StorageError::Decompress(e) => e.kind(),
            StorageError::Io { .. } => ErrorKind::IoFailure,
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Server startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Folder-sync client errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected {path} with status {status}: {body}")]
    Rejected {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_survive_wrapping() {
        let err = StorageError::from(PathError::OutsideRoot("../etc".into()));
        assert_eq!(err.kind(), ErrorKind::OutsideRoot);

        let err = StorageError::from(WriteError::EmptyResult(PathBuf::from("a.tmp")));
        assert_eq!(err.kind(), ErrorKind::EmptyResult);

        let err = StorageError::from(DecompressError::CorruptStream {
            path: PathBuf::from("a.tmp"),
            source: io::Error::new(io::ErrorKind::InvalidData, "bad header"),
        });
        assert_eq!(err.kind(), ErrorKind::CorruptStream);

        assert_eq!(PathError::Empty.kind(), ErrorKind::MissingIdentifier);
        assert_eq!(
            PathError::InvalidName(".rax-x".into()).kind(),
            ErrorKind::InvalidName
        );
    }

    #[test]
    fn test_client_server_split() {
        assert!(ErrorKind::OutsideRoot.is_client_error());
        assert!(ErrorKind::InvalidName.is_client_error());
        assert!(ErrorKind::NotFound.is_client_error());
        assert!(!ErrorKind::IoFailure.is_client_error());
        assert!(!ErrorKind::CorruptStream.is_client_error());
    }
}
