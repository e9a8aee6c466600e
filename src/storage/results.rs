//! Storage result types
//!
//! Defines request options and result structures of gateway operations.

use std::fmt;
use std::path::PathBuf;

/// Caller-supplied switches for one ingest
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Payload is a gzip stream to unwrap before storing.
    pub decompress: bool,
    /// Length announced by the transport, if any.
    pub expected_len: Option<u64>,
}

/// Result of a completed ingest
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
}

/// Result of a file fetch, ready to be streamed
#[derive(Debug)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub file: tokio::fs::File,
    pub size: u64,
}

/// Progress of a single ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Resolving,
    Writing,
    Promoting,
    Decompressing,
    Committed,
    Aborting,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Resolving => "resolving",
            IngestStage::Writing => "writing",
            IngestStage::Promoting => "promoting",
            IngestStage::Decompressing => "decompressing",
            IngestStage::Committed => "committed",
            IngestStage::Aborting => "aborting",
            IngestStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
