//! File system helpers
//!
//! Naming rules for in-flight artifacts and small async metadata checks.

use std::path::Path;

/// Prefix of every in-flight artifact. Client names may not start with it.
pub const ARTIFACT_PREFIX: &str = ".rax-";

/// Suffix of the temp file an upload streams into.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Suffix of the shadow file decompressed output streams into.
pub const SHADOW_SUFFIX: &str = ".part";

/// Length of the random token between the prefix and the suffix.
pub const RANDOM_LEN: usize = 6;

/// Longest single path segment most filesystems accept.
pub const MAX_NAME_LEN: usize = 255;

/// Check whether a directory entry name is an in-flight upload artifact
/// (`.rax-<token>.tmp` or `.rax-<token>.part`).
pub fn is_transient_artifact(name: &str) -> bool {
    is_reserved_name(name) && (name.ends_with(TEMP_SUFFIX) || name.ends_with(SHADOW_SUFFIX))
}

/// Check whether a client-supplied segment collides with artifact naming.
pub fn is_reserved_name(segment: &str) -> bool {
    segment.starts_with(ARTIFACT_PREFIX)
}

/// Check if a regular file exists
pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Check if directory exists
pub async fn directory_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
