//! Transfer module for the upload server
//!
//! Moves bytes from an upload source onto disk: atomic temp-file landing,
//! promotion by rename, and streaming gzip decompression.

pub mod decompress;
pub mod file_ops;
pub mod results;

// Re-export key types and functions
pub use decompress::decompress_into;
pub use file_ops::{TransferLimits, promote, write_atomic};
pub use results::TempArtifact;
