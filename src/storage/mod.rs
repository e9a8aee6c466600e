//! File system storage management
//!
//! Handles path validation and the storage gateway operations.

pub mod filesystem;
pub mod operations;
pub mod results;
pub mod validation;

// Re-export commonly used types
pub use operations::{DEFAULT_COMPRESSION_SUFFIX, StorageGateway};
pub use results::{FetchedFile, IngestOptions, IngestStage, StoredFile};
pub use validation::{resolve, resolve_for_write};
