//! Module `file_ops`
//!
//! Atomic landing of uploaded bytes. Data is streamed into a private temp
//! file next to the final target, then promoted by rename. The temp file is
//! removed on every failure path; because it is held as a [`TempPath`], a
//! dropped (cancelled) upload removes it as well.

use log::{debug, error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::WriteError;
use crate::storage::filesystem::{ARTIFACT_PREFIX, RANDOM_LEN, TEMP_SUFFIX};
use crate::transfer::results::TempArtifact;

const DEFAULT_BUFFER_SIZE: usize = 8192;
const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Limits applied while streaming an upload or its decompressed form.
#[derive(Debug, Clone, Copy)]
pub struct TransferLimits {
    pub buffer_size: usize,
    pub max_file_size: u64,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Creates a uniquely named artifact in the directory of `target`.
///
/// The name is fixed-length and independent of the target name, so any
/// target name the filesystem accepts also has room for its artifacts.
pub(crate) fn sibling_temp(target: &Path, suffix: &str) -> io::Result<NamedTempFile> {
    let parent = target.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory")
    })?;

    tempfile::Builder::new()
        .prefix(ARTIFACT_PREFIX)
        .suffix(suffix)
        .rand_bytes(RANDOM_LEN)
        .tempfile_in(parent)
}

/// Best-effort removal of a temp artifact.
pub(crate) fn discard(path: TempPath) {
    let display = path.to_path_buf();
    match path.close() {
        Ok(()) => debug!("Removed temp file {}", display.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {e}", display.display()),
    }
}

/// Streams `source` into a fresh temp file next to `target`.
///
/// The source is drained completely and the file is synced before this
/// returns. When `expected_len` is known, a shorter stream is treated as a
/// truncated upload.
pub async fn write_atomic<R>(
    target: &Path,
    mut source: R,
    expected_len: Option<u64>,
    limits: &TransferLimits,
) -> Result<TempArtifact, WriteError>
where
    R: AsyncRead + Unpin,
{
    let temp = sibling_temp(target, TEMP_SUFFIX).map_err(|source| WriteError::Io {
        op: "create temp file for",
        path: target.to_path_buf(),
        source,
    })?;
    let (std_file, temp_path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    info!(
        "Starting upload: {} -> {}",
        temp_path.display(),
        target.display()
    );

    let written = stream_to_file(&mut source, &mut file, &temp_path, limits).await;
    let written = match written {
        Ok(n) => n,
        Err(e) => {
            error!("Upload into {} aborted: {e}", temp_path.display());
            drop(file);
            discard(temp_path);
            return Err(e);
        }
    };

    if let Some(expected) = expected_len {
        if written < expected {
            error!(
                "Upload into {} truncated: {written} of {expected} bytes",
                temp_path.display()
            );
            drop(file);
            discard(temp_path);
            return Err(WriteError::Truncated {
                expected,
                received: written,
            });
        }
    }

    // Ensure all data is on disk before anyone can promote it
    let synced = match file.flush().await {
        Ok(()) => file.sync_all().await,
        Err(e) => Err(e),
    };
    drop(file);
    if let Err(source) = synced {
        error!("Failed to sync temp file {}: {source}", temp_path.display());
        let path = temp_path.to_path_buf();
        discard(temp_path);
        return Err(WriteError::Io {
            op: "sync",
            path,
            source,
        });
    }

    debug!("Landed {written} bytes in {}", temp_path.display());
    Ok(TempArtifact::new(temp_path, target.to_path_buf(), written))
}

async fn stream_to_file<R>(
    source: &mut R,
    file: &mut tokio::fs::File,
    temp_path: &Path,
    limits: &TransferLimits,
) -> Result<u64, WriteError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; limits.buffer_size.max(1)];
    let mut total_bytes_received = 0u64;

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(source) => {
                return Err(WriteError::Source {
                    received: total_bytes_received,
                    source,
                });
            }
        };

        // Check file size limit BEFORE writing (fail fast)
        total_bytes_received += n as u64;
        if total_bytes_received > limits.max_file_size {
            return Err(WriteError::TooLarge {
                limit: limits.max_file_size,
            });
        }

        file.write_all(&buffer[..n])
            .await
            .map_err(|source| WriteError::Io {
                op: "write",
                path: temp_path.to_path_buf(),
                source,
            })?;
    }

    Ok(total_bytes_received)
}

/// Renames a landed temp file onto its target.
///
/// A missing or zero-byte temp file is reported as [`WriteError::EmptyResult`].
/// Rename failures (e.g. cross-device) are final.
pub async fn promote(temp: TempArtifact) -> Result<PathBuf, WriteError> {
    let (temp_path, target, _) = temp.into_parts();

    match tokio::fs::metadata(&temp_path).await {
        Ok(meta) if meta.len() > 0 => {}
        Ok(_) => {
            warn!("Temp file {} is empty", temp_path.display());
            discard(temp_path);
            return Err(WriteError::EmptyResult(target));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Temp file {} vanished before promotion", temp_path.display());
            discard(temp_path);
            return Err(WriteError::EmptyResult(target));
        }
        Err(source) => {
            let path = temp_path.to_path_buf();
            discard(temp_path);
            return Err(WriteError::Io {
                op: "inspect",
                path,
                source,
            });
        }
    }

    match temp_path.persist(&target) {
        Ok(()) => {
            info!("Promoted upload to {}", target.display());
            Ok(target)
        }
        Err(e) => {
            error!("Failed to rename {} to {}: {}", e.path.display(), target.display(), e.error);
            let source = e.error;
            discard(e.path);
            Err(WriteError::Io {
                op: "rename onto",
                path: target,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;
    use tokio::io::ReadBuf;

    /// Yields `data`, then fails like a dropped connection.
    struct FailAfter {
        data: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for FailAfter {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.pos < self.data.len() {
                let n = buf.remaining().min(self.data.len() - self.pos);
                let start = self.pos;
                buf.put_slice(&self.data[start..start + n]);
                self.pos += n;
                Poll::Ready(Ok(()))
            } else {
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "peer went away",
                )))
            }
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_write_then_promote() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("report.txt");

        let artifact = write_atomic(&target, &b"hello world"[..], None, &TransferLimits::default())
            .await
            .unwrap();
        assert_eq!(artifact.size(), 11);
        assert!(artifact.path().exists());
        assert!(artifact.path().to_string_lossy().ends_with(".tmp"));
        assert!(!target.exists());

        let stored = promote(artifact).await.unwrap();
        assert_eq!(stored, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
        assert_eq!(entries(temp.path()), vec!["report.txt"]);
    }

    #[tokio::test]
    async fn test_longest_name_has_room_for_temp() {
        let temp = TempDir::new().unwrap();
        let name = "n".repeat(crate::storage::filesystem::MAX_NAME_LEN);
        let target = temp.path().join(&name);

        let artifact = write_atomic(&target, &b"long"[..], None, &TransferLimits::default())
            .await
            .unwrap();
        let temp_name = artifact.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(temp_name.starts_with(ARTIFACT_PREFIX));
        assert_eq!(temp_name.len(), ARTIFACT_PREFIX.len() + RANDOM_LEN + TEMP_SUFFIX.len());

        promote(artifact).await.unwrap();
        assert_eq!(entries(temp.path()), vec![name]);
    }

    #[tokio::test]
    async fn test_promote_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("data.bin");
        std::fs::write(&target, b"old").unwrap();

        let artifact = write_atomic(&target, &b"new contents"[..], None, &TransferLimits::default())
            .await
            .unwrap();
        promote(artifact).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new contents");
    }

    #[tokio::test]
    async fn test_failing_source_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("cut.bin");
        let source = FailAfter {
            data: vec![7u8; 20_000],
            pos: 0,
        };

        let err = write_atomic(&target, source, None, &TransferLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Source { received: 20_000, .. }));
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_short_stream_is_truncated() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("short.bin");

        let err = write_atomic(&target, &b"abc"[..], Some(10), &TransferLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::Truncated {
                expected: 10,
                received: 3
            }
        ));
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_size_limit() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("big.bin");
        let limits = TransferLimits {
            buffer_size: 4,
            max_file_size: 8,
        };

        let err = write_atomic(&target, &[1u8; 9][..], None, &limits)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::TooLarge { limit: 8 }));
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("empty.txt");

        let artifact = write_atomic(&target, &b""[..], None, &TransferLimits::default())
            .await
            .unwrap();
        let err = promote(artifact).await.unwrap_err();
        assert!(matches!(err, WriteError::EmptyResult(_)));
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_dropped_artifact_is_removed() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("abandoned.txt");

        let artifact = write_atomic(&target, &b"data"[..], None, &TransferLimits::default())
            .await
            .unwrap();
        let temp_file = artifact.path().to_path_buf();
        assert!(temp_file.exists());
        drop(artifact);
        assert!(!temp_file.exists());
    }
}
