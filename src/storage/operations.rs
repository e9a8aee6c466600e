//! Storage operations
//!
//! [`StorageGateway`] is the single entry point the transport layer uses to
//! ingest, delete, list and fetch files under the storage root.

use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use crate::error::StorageError;
use crate::storage::filesystem::is_transient_artifact;
use crate::storage::results::{FetchedFile, IngestOptions, IngestStage, StoredFile};
use crate::storage::validation::{
    ensure_real_containment, relative_to_root, resolve, resolve_for_write,
};
use crate::transfer::{TransferLimits, decompress_into, promote, write_atomic};

/// Suffix marking a compressed upload unless configured otherwise.
pub const DEFAULT_COMPRESSION_SUFFIX: &str = ".gz";

/// Facade over path resolution, atomic writes and decompression.
#[derive(Debug, Clone)]
pub struct StorageGateway {
    root: PathBuf,
    limits: TransferLimits,
    compression_suffix: String,
}

impl StorageGateway {
    /// Opens (creating if needed) the storage root.
    pub async fn new(root: impl AsRef<Path>, limits: TransferLimits) -> Result<Self, StorageError> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(StorageError::io(
                "open storage root",
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "storage root cannot be empty"),
            ));
        }

        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| StorageError::io("create storage root", root, e))?;
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| StorageError::io("canonicalize storage root", root, e))?;

        info!("Storage root: {}", root.display());

        Ok(Self {
            root,
            limits,
            compression_suffix: DEFAULT_COMPRESSION_SUFFIX.to_string(),
        })
    }

    /// Sets the suffix stripped from compressed upload names.
    pub fn with_compression_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.compression_suffix = suffix.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }

    /// Stores `source` under `path_hint`.
    ///
    /// With `options.decompress` the compression suffix is dropped from the
    /// name and the payload is unwrapped before it becomes visible.
    pub async fn ingest<R>(
        &self,
        path_hint: Option<&str>,
        source: R,
        options: IngestOptions,
    ) -> Result<StoredFile, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let raw = require_hint(path_hint)?;

        enter(raw, IngestStage::Resolving);
        let suffix = options
            .decompress
            .then_some(self.compression_suffix.as_str());
        let target = resolve_for_write(&self.root, raw, suffix)
            .await
            .map_err(|e| abort(raw, IngestStage::Resolving, e.into()))?;

        enter(raw, IngestStage::Writing);
        let artifact = write_atomic(&target, source, options.expected_len, &self.limits)
            .await
            .map_err(|e| abort(raw, IngestStage::Writing, e.into()))?;
        let received = artifact.size();

        let stored = if options.decompress {
            enter(raw, IngestStage::Decompressing);
            decompress_into(artifact, self.limits)
                .await
                .map_err(|e| abort(raw, IngestStage::Decompressing, e.into()))?
        } else {
            enter(raw, IngestStage::Promoting);
            promote(artifact)
                .await
                .map_err(|e| abort(raw, IngestStage::Promoting, e.into()))?
        };

        let size = match tokio::fs::metadata(&stored).await {
            Ok(meta) => meta.len(),
            Err(_) => received,
        };
        enter(raw, IngestStage::Committed);

        let relative_path = relative_to_root(&self.root, &stored);
        info!(
            "Stored {} ({} bytes received, {} bytes stored)",
            relative_path, received, size
        );

        Ok(StoredFile {
            path: stored,
            relative_path,
            size,
        })
    }

    /// Deletes the stored file named by `path_hint`.
    pub async fn delete(&self, path_hint: Option<&str>) -> Result<(), StorageError> {
        let raw = require_hint(path_hint)?;
        let file_path = self.locate(raw).await?;

        match tokio::fs::metadata(&file_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::NotFound(raw.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(raw.to_string()));
            }
            Err(e) => return Err(StorageError::io("inspect", file_path, e)),
        }

        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => {
                info!(
                    "Deleted file {} (real: {})",
                    raw,
                    file_path.display()
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(raw.to_string()))
            }
            Err(e) => Err(StorageError::io("delete", file_path, e)),
        }
    }

    /// Lists the immediate entries of the root, or of `dir` beneath it.
    ///
    /// Names are sorted; directories carry a trailing `/`. In-flight upload
    /// artifacts are never listed. An empty directory yields an empty list,
    /// a missing one yields [`StorageError::NotFound`].
    pub async fn list(&self, dir: Option<&str>) -> Result<Vec<String>, StorageError> {
        let (real_path, display) = match dir.map(str::trim).filter(|d| !d.is_empty() && *d != "/") {
            Some(raw) => (self.locate(raw).await?, raw.to_string()),
            None => (self.root.clone(), "/".to_string()),
        };

        let mut entries = match tokio::fs::read_dir(&real_path).await {
            Ok(entries) => entries,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Err(StorageError::NotFound(display));
            }
            Err(e) => return Err(StorageError::io("list", real_path, e)),
        };

        let mut names = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(StorageError::io("list", real_path, e)),
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if is_transient_artifact(&name) {
                continue;
            }

            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            names.push(if is_dir { format!("{name}/") } else { name });
        }
        names.sort();

        debug!(
            "Listed directory {} (real: {}) - {} entries",
            display,
            real_path.display(),
            names.len()
        );
        Ok(names)
    }

    /// Opens the stored file named by `path_hint` for streaming.
    pub async fn fetch(&self, path_hint: Option<&str>) -> Result<FetchedFile, StorageError> {
        let raw = require_hint(path_hint)?;
        let file_path = self.locate(raw).await?;

        let file = match tokio::fs::File::open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(raw.to_string()));
            }
            Err(e) => return Err(StorageError::io("open", file_path, e)),
        };

        let meta = file
            .metadata()
            .await
            .map_err(|e| StorageError::io("inspect", &file_path, e))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(raw.to_string()));
        }

        info!(
            "Prepared file retrieval for {} (real: {}, {} bytes)",
            raw,
            file_path.display(),
            meta.len()
        );

        Ok(FetchedFile {
            path: file_path,
            file,
            size: meta.len(),
        })
    }

    /// Resolves an existing-file hint: no suffix stripping and no directory
    /// creation. Artifact names never get past [`resolve`].
    async fn locate(&self, raw: &str) -> Result<PathBuf, StorageError> {
        let path = resolve(&self.root, raw, None)?;
        ensure_real_containment(&self.root, &path, raw).await?;
        Ok(path)
    }
}

fn require_hint(path_hint: Option<&str>) -> Result<&str, StorageError> {
    match path_hint {
        Some(hint) if !hint.trim().is_empty() => Ok(hint),
        _ => {
            warn!("Request without file name rejected");
            Err(StorageError::MissingIdentifier)
        }
    }
}

fn enter(raw: &str, stage: IngestStage) {
    debug!("Ingest {raw}: {stage}");
}

fn abort(raw: &str, stage: IngestStage, err: StorageError) -> StorageError {
    enter(raw, IngestStage::Aborting);
    warn!("Ingest of {raw} failed while {stage}: {err}");
    enter(raw, IngestStage::Failed);
    err
}
