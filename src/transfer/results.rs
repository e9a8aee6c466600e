//! Transfer result types
//!
//! Defines the artifacts handed between transfer stages.

use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// A fully written upload waiting to be promoted or decompressed.
///
/// Owns its temp file exclusively; dropping it removes the file.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
    target: PathBuf,
    size: u64,
}

impl TempArtifact {
    pub(crate) fn new(path: TempPath, target: PathBuf, size: u64) -> Self {
        Self { path, target, size }
    }

    /// Location of the temp file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final location the artifact will be promoted to
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Number of bytes received
    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn into_parts(self) -> (TempPath, PathBuf, u64) {
        (self.path, self.target, self.size)
    }
}
