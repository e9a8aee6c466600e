//! Folder scanning
//!
//! Walks the watched folder and works out which files changed since the last
//! successful sync.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A regular file seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Snapshot of the watched folder keyed by `/`-separated relative path
pub type Snapshot = BTreeMap<String, ScannedFile>;

/// Work the client has to do to catch the server up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Upload { relative: String, file: ScannedFile },
    Delete { relative: String },
}

/// Recursively collects every regular file under `root`.
pub fn scan_tree(root: &Path) -> io::Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let modified = entry.metadata()?.modified()?;
                if let Some(relative) = relative_name(root, &path) {
                    snapshot.insert(relative, ScannedFile { path, modified });
                }
            }
        }
    }

    Ok(snapshot)
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Remembers the modification time of every file the server already has.
#[derive(Debug, Default)]
pub struct SyncState {
    synced: HashMap<String, SystemTime>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes needed to bring the server in line with `snapshot`.
    pub fn diff(&self, snapshot: &Snapshot) -> Vec<Change> {
        let mut changes: Vec<Change> = snapshot
            .iter()
            .filter(|(relative, file)| match self.synced.get(*relative) {
                Some(seen) => *seen < file.modified,
                None => true,
            })
            .map(|(relative, file)| Change::Upload {
                relative: relative.clone(),
                file: file.clone(),
            })
            .collect();

        let mut removed: Vec<&String> = self
            .synced
            .keys()
            .filter(|relative| !snapshot.contains_key(*relative))
            .collect();
        removed.sort();
        changes.extend(removed.into_iter().map(|relative| Change::Delete {
            relative: relative.clone(),
        }));

        changes
    }

    pub fn mark_uploaded(&mut self, relative: &str, modified: SystemTime) {
        self.synced.insert(relative.to_string(), modified);
    }

    pub fn mark_deleted(&mut self, relative: &str) {
        self.synced.remove(relative);
    }

    pub fn len(&self) -> usize {
        self.synced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synced.is_empty()
    }
}
