//! HTTP side of the sync client
//!
//! Uploads are gzip-compressed into a scratch file first so the request body
//! can be streamed with a known length.

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, info};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

use crate::error::SyncError;
use crate::server::routes::FILENAME_HEADER;
use crate::storage::DEFAULT_COMPRESSION_SUFFIX;

pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    pub fn new(server_url: &str) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    /// Compresses `path` and stores it on the server as `relative`.
    pub async fn upload(&self, path: &Path, relative: &str) -> Result<(), SyncError> {
        let source = path.to_path_buf();
        let compressed = tokio::task::spawn_blocking(move || gzip_to_scratch(&source))
            .await
            .map_err(|e| SyncError::Io {
                op: "compress",
                path: path.to_path_buf(),
                source: io::Error::other(e),
            })??;

        let len = compressed
            .as_file()
            .metadata()
            .map_err(|source| sync_io("inspect", compressed.path(), source))?
            .len();
        let file = tokio::fs::File::open(compressed.path())
            .await
            .map_err(|source| sync_io("open", compressed.path(), source))?;

        let url = format!("{}/uploadfile/", self.base_url);
        let hint = format!("{relative}{DEFAULT_COMPRESSION_SUFFIX}");
        debug!("Uploading {} as {} ({} bytes compressed)", path.display(), hint, len);

        let response = self
            .http
            .post(&url)
            .header(FILENAME_HEADER, &hint)
            .header(CONTENT_TYPE, "application/gzip")
            .header(CONTENT_LENGTH, len)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                path: relative.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        info!("Uploaded {relative}");
        Ok(())
    }

    /// Removes `relative` from the server. A file the server no longer has
    /// counts as deleted.
    pub async fn delete(&self, relative: &str) -> Result<(), SyncError> {
        let url = format!("{}/deletefile/", self.base_url);
        let response = self
            .http
            .delete(&url)
            .header(FILENAME_HEADER, relative)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            info!("Deleted {relative} on server");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Rejected {
            path: relative.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn gzip_to_scratch(source: &Path) -> Result<tempfile::NamedTempFile, SyncError> {
    let input = File::open(source).map_err(|e| sync_io("open", source, e))?;
    let scratch = tempfile::Builder::new()
        .prefix("rax-sync-")
        .suffix(".gz")
        .tempfile()
        .map_err(|e| sync_io("create scratch file for", source, e))?;

    let mut encoder = GzEncoder::new(BufWriter::new(scratch.as_file()), Compression::default());
    io::copy(&mut BufReader::new(input), &mut encoder).map_err(|e| sync_io("compress", source, e))?;
    let mut writer = encoder.finish().map_err(|e| sync_io("compress", source, e))?;
    writer.flush().map_err(|e| sync_io("compress", source, e))?;
    drop(writer);

    Ok(scratch)
}

fn sync_io(op: &'static str, path: &Path, source: io::Error) -> SyncError {
    SyncError::Io {
        op,
        path: PathBuf::from(path),
        source,
    }
}
