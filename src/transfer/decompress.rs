//! Decompression stage
//!
//! Unwraps a single gzip member from a landed temp file into its final
//! location. Output goes to a shadow `.part` file first and is renamed onto
//! the target only once the whole stream decoded cleanly, so a corrupt or
//! truncated payload never leaves a partial file behind.

use flate2::bufread::GzDecoder;
use log::{error, info};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::DecompressError;
use crate::storage::filesystem::SHADOW_SUFFIX;
use crate::transfer::file_ops::{TransferLimits, discard, sibling_temp};
use crate::transfer::results::TempArtifact;

/// Decompresses `temp` onto its target and removes the compressed file.
///
/// Runs on the blocking pool since the decoder is synchronous.
pub async fn decompress_into(
    temp: TempArtifact,
    limits: TransferLimits,
) -> Result<PathBuf, DecompressError> {
    let target = temp.target().to_path_buf();

    tokio::task::spawn_blocking(move || decompress_blocking(temp, &limits))
        .await
        .map_err(|e| DecompressError::Io {
            op: "decompress",
            path: target,
            source: io::Error::other(e),
        })?
}

fn decompress_blocking(
    temp: TempArtifact,
    limits: &TransferLimits,
) -> Result<PathBuf, DecompressError> {
    let (temp_path, target, size) = temp.into_parts();

    if size == 0 {
        discard(temp_path);
        return Err(DecompressError::EmptyResult(target));
    }

    let input = match File::open(&temp_path) {
        Ok(file) => file,
        Err(source) => {
            let path = temp_path.to_path_buf();
            discard(temp_path);
            return Err(DecompressError::Io {
                op: "open",
                path,
                source,
            });
        }
    };

    let shadow = match sibling_temp(&target, SHADOW_SUFFIX) {
        Ok(shadow) => shadow,
        Err(source) => {
            discard(temp_path);
            return Err(DecompressError::Io {
                op: "create shadow file for",
                path: target,
                source,
            });
        }
    };
    let (mut output, shadow_path) = shadow.into_parts();

    let mut decoder = GzDecoder::new(BufReader::with_capacity(limits.buffer_size.max(1), input));
    let copied = copy_decoded(&mut decoder, &mut output, &temp_path, &shadow_path, limits)
        .and_then(|written| {
            ensure_exhausted(decoder.get_mut(), &temp_path)?;
            output.sync_all().map_err(|source| DecompressError::Io {
                op: "sync",
                path: shadow_path.to_path_buf(),
                source,
            })?;
            Ok(written)
        });
    drop(output);

    let written = match copied {
        Ok(n) => n,
        Err(e) => {
            error!("Decompression of {} failed: {e}", temp_path.display());
            discard(shadow_path);
            discard(temp_path);
            return Err(e);
        }
    };

    if let Err(e) = shadow_path.persist(&target) {
        error!(
            "Failed to rename {} to {}: {}",
            e.path.display(),
            target.display(),
            e.error
        );
        let source = e.error;
        discard(e.path);
        discard(temp_path);
        return Err(DecompressError::Io {
            op: "rename onto",
            path: target,
            source,
        });
    }

    // The compressed intermediate must not outlive its decompressed form
    discard(temp_path);
    info!(
        "Decompressed {size} bytes into {} ({written} bytes)",
        target.display()
    );
    Ok(target)
}

/// The decoder stops after one gzip member; anything left over means the
/// decoded output is not the whole upload.
fn ensure_exhausted<R: BufRead>(rest: &mut R, compressed: &Path) -> Result<(), DecompressError> {
    let remaining = rest.fill_buf().map_err(|source| DecompressError::Io {
        op: "read",
        path: compressed.to_path_buf(),
        source,
    })?;
    if remaining.is_empty() {
        return Ok(());
    }
    Err(DecompressError::CorruptStream {
        path: compressed.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::InvalidData,
            "trailing data after end of gzip stream",
        ),
    })
}

fn copy_decoded<R: Read, W: Write>(
    mut decoder: R,
    output: &mut W,
    compressed: &Path,
    shadow: &Path,
    limits: &TransferLimits,
) -> Result<u64, DecompressError> {
    let mut buffer = vec![0u8; limits.buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(DecompressError::CorruptStream {
                    path: compressed.to_path_buf(),
                    source,
                });
            }
        };

        total += n as u64;
        if total > limits.max_file_size {
            return Err(DecompressError::TooLarge {
                limit: limits.max_file_size,
            });
        }

        output
            .write_all(&buffer[..n])
            .map_err(|source| DecompressError::Io {
                op: "write",
                path: shadow.to_path_buf(),
                source,
            })?;
    }

    output.flush().map_err(|source| DecompressError::Io {
        op: "flush",
        path: shadow.to_path_buf(),
        source,
    })?;

    Ok(total)
}
