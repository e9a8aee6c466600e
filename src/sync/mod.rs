//! Folder-sync client
//!
//! Mirrors a local folder onto an upload server: new or modified files are
//! gzip-uploaded, files removed locally are deleted remotely. A file is only
//! recorded as synced after the server accepted it, so failures are retried
//! on the next pass.

pub mod config;
pub mod scanner;
pub mod uploader;

use log::{error, info, warn};
use std::path::PathBuf;

use crate::error::SyncError;

pub use self::config::SyncConfig;
pub use self::scanner::{Change, SyncState, scan_tree};
pub use self::uploader::SyncClient;

/// Outcome of one sync pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Scans `folder` once and pushes every pending change to the server.
pub async fn sync_once(
    client: &SyncClient,
    state: &mut SyncState,
    folder: PathBuf,
) -> Result<SyncReport, SyncError> {
    let scan_root = folder.clone();
    let snapshot = tokio::task::spawn_blocking(move || scan_tree(&scan_root))
        .await
        .map_err(|e| SyncError::Io {
            op: "scan",
            path: folder.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| SyncError::Io {
            op: "scan",
            path: folder.clone(),
            source,
        })?;

    let mut report = SyncReport::default();
    for change in state.diff(&snapshot) {
        match change {
            Change::Upload { relative, file } => match client.upload(&file.path, &relative).await {
                Ok(()) => {
                    state.mark_uploaded(&relative, file.modified);
                    report.uploaded += 1;
                }
                Err(e) => {
                    error!("Failed to upload file {relative}: {e}");
                    report.failed += 1;
                }
            },
            Change::Delete { relative } => match client.delete(&relative).await {
                Ok(()) => {
                    state.mark_deleted(&relative);
                    report.deleted += 1;
                }
                Err(e) => {
                    error!("Failed to delete file {relative} on server: {e}");
                    report.failed += 1;
                }
            },
        }
    }

    if report != SyncReport::default() {
        info!(
            "Sync pass: {} uploaded, {} deleted, {} failed",
            report.uploaded, report.deleted, report.failed
        );
    }
    Ok(report)
}

/// Runs sync passes forever at the configured interval.
pub async fn run(config: SyncConfig) -> Result<(), SyncError> {
    let client = SyncClient::new(&config.server_url)?;
    let mut state = SyncState::new();
    let mut ticker = tokio::time::interval(config.interval());

    info!(
        "Watching {} -> {} every {}s",
        config.folder_to_watch, config.server_url, config.interval_secs
    );

    loop {
        ticker.tick().await;
        if let Err(e) = sync_once(&client, &mut state, config.folder_path()).await {
            warn!("Sync pass failed: {e}");
        }
    }
}
