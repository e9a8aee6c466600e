//! Path validation
//!
//! Turns a client-supplied relative path into an absolute path that is
//! guaranteed to live strictly underneath the storage root. Every path that
//! reaches the filesystem goes through [`resolve`] first.

use log::warn;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PathError;
use crate::storage::filesystem::{MAX_NAME_LEN, is_reserved_name};

/// Resolves `raw` against `root` without touching the filesystem.
///
/// Backslashes are treated as separators and leading separators are dropped,
/// so the input is always root-relative. When `strip_suffix` is given and the
/// name ends with it, the suffix is removed: the stored artifact is the
/// decompressed form. `.` segments vanish and `..` pops one segment; popping
/// past the root is rejected. Segments using the in-flight artifact prefix
/// or longer than a filesystem name allows are rejected as invalid.
///
/// `root` is expected to be absolute and already normalized.
pub fn resolve(root: &Path, raw: &str, strip_suffix: Option<&str>) -> Result<PathBuf, PathError> {
    if raw.trim().is_empty() {
        return Err(PathError::Empty);
    }
    if raw.contains('\0') {
        return Err(PathError::InvalidName(raw.escape_debug().to_string()));
    }

    let normalized = raw.replace('\\', "/");
    let mut logical = normalized.trim_start_matches('/');
    if let Some(suffix) = strip_suffix {
        if let Some(stripped) = logical.strip_suffix(suffix) {
            logical = stripped;
        }
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    let mut climbed = false;

    for segment in logical.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return Err(PathError::OutsideRoot(raw.to_string()));
                }
                resolved.pop();
                depth -= 1;
                climbed = true;
            }
            name if is_reserved_name(name) || name.len() > MAX_NAME_LEN => {
                return Err(PathError::InvalidName(raw.to_string()));
            }
            name => {
                resolved.push(name);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        // Nothing left names a file; "a/.." lands on the root itself.
        return Err(if climbed {
            PathError::OutsideRoot(raw.to_string())
        } else {
            PathError::Empty
        });
    }

    // Component-wise: "/upload" never contains "/uploadx/evil".
    if !resolved.starts_with(root) || resolved == root {
        return Err(PathError::OutsideRoot(raw.to_string()));
    }

    Ok(resolved)
}

/// Resolves `raw` and creates any missing parent directories for it.
///
/// Directories are created one level at a time, and each level is checked
/// against the root before anything is created inside it. A symlink planted
/// inside the tree can therefore never cause a mutation outside the root.
pub async fn resolve_for_write(
    root: &Path,
    raw: &str,
    strip_suffix: Option<&str>,
) -> Result<PathBuf, PathError> {
    let resolved = resolve(root, raw, strip_suffix)?;
    let parent = resolved
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .ok_or_else(|| PathError::OutsideRoot(raw.to_string()))?;

    let mut current = root.to_path_buf();
    for component in parent.components() {
        let next = current.join(component);
        match tokio::fs::create_dir(&next).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(PathError::Io { path: next, source }),
        }
        current = real_dir_within(root, &next, raw).await?;
    }

    Ok(resolved)
}

/// Canonicalizes `dir` and rejects it unless it is still under `root`.
async fn real_dir_within(root: &Path, dir: &Path, raw: &str) -> Result<PathBuf, PathError> {
    let real = tokio::fs::canonicalize(dir)
        .await
        .map_err(|source| PathError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    if !real.starts_with(root) {
        warn!(
            "Rejected {} ({} resolves to {} outside {})",
            raw,
            dir.display(),
            real.display(),
            root.display()
        );
        return Err(PathError::OutsideRoot(raw.to_string()));
    }
    Ok(real)
}

/// Verifies that the existing parent of `path` really sits under `root`.
///
/// A missing parent is fine: there is nothing to escape through, and the
/// caller will report the file as absent.
pub async fn ensure_real_containment(
    root: &Path,
    path: &Path,
    raw: &str,
) -> Result<(), PathError> {
    let Some(parent) = path.parent() else {
        return Err(PathError::OutsideRoot(raw.to_string()));
    };

    match tokio::fs::canonicalize(parent).await {
        Ok(real_parent) if real_parent.starts_with(root) => Ok(()),
        Ok(real_parent) => {
            warn!(
                "Rejected {} (real parent {} outside {})",
                raw,
                real_parent.display(),
                root.display()
            );
            Err(PathError::OutsideRoot(raw.to_string()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PathError::Io {
            path: parent.to_path_buf(),
            source,
        }),
    }
}

/// Root-relative, `/`-separated form of a resolved path.
pub fn relative_to_root(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/upload")
    }

    #[test]
    fn test_plain_relative_path() {
        let path = resolve(&root(), "a/b/report.txt", None).unwrap();
        assert_eq!(path, PathBuf::from("/upload/a/b/report.txt"));
    }

    #[test]
    fn test_strips_leading_separators_and_suffix() {
        let path = resolve(&root(), "///a/b/report.txt.gz", Some(".gz")).unwrap();
        assert_eq!(path, PathBuf::from("/upload/a/b/report.txt"));
    }

    #[test]
    fn test_suffix_kept_without_strip() {
        let path = resolve(&root(), "archive.tar.gz", None).unwrap();
        assert_eq!(path, PathBuf::from("/upload/archive.tar.gz"));
    }

    #[test]
    fn test_collapses_dot_segments() {
        let path = resolve(&root(), "a//./b/../c.txt", None).unwrap();
        assert_eq!(path, PathBuf::from("/upload/a/c.txt"));
    }

    #[test]
    fn test_backslashes_are_separators() {
        let path = resolve(&root(), "\\dir\\file.txt", None).unwrap();
        assert_eq!(path, PathBuf::from("/upload/dir/file.txt"));
    }

    #[test]
    fn test_rejects_traversal() {
        for raw in [
            "../../etc/passwd",
            "..",
            "a/../../evil",
            "/../uploadx/evil",
            "..\\..\\etc\\passwd",
            "a/..",
        ] {
            let err = resolve(&root(), raw, None).unwrap_err();
            assert!(matches!(err, PathError::OutsideRoot(_)), "{raw}: {err:?}");
        }
    }

    #[test]
    fn test_absolute_input_stays_inside() {
        let path = resolve(&root(), "/etc/passwd", None).unwrap();
        assert_eq!(path, PathBuf::from("/upload/etc/passwd"));
    }

    #[test]
    fn test_empty_inputs() {
        for raw in ["", "   ", "/", "./", ".gz"] {
            let err = resolve(&root(), raw, Some(".gz")).unwrap_err();
            assert!(matches!(err, PathError::Empty), "{raw}: {err:?}");
        }
    }

    #[test]
    fn test_rejects_nul() {
        let err = resolve(&root(), "a\0b", None).unwrap_err();
        assert!(matches!(err, PathError::InvalidName(_)));
    }

    #[test]
    fn test_rejects_artifact_prefix() {
        for raw in [".rax-a1b2c3.tmp", "dir/.rax-x.part", ".rax-dir/file.txt"] {
            let err = resolve(&root(), raw, None).unwrap_err();
            assert!(matches!(err, PathError::InvalidName(_)), "{raw}: {err:?}");
        }
        // Names that merely look like old-style temp files are ordinary
        assert!(resolve(&root(), "backup.2024ab.tmp", None).is_ok());
    }

    #[test]
    fn test_segment_length_limit() {
        let longest = "a".repeat(MAX_NAME_LEN);
        assert!(resolve(&root(), &longest, None).is_ok());

        let too_long = format!("dir/{}", "a".repeat(MAX_NAME_LEN + 1));
        let err = resolve(&root(), &too_long, None).unwrap_err();
        assert!(matches!(err, PathError::InvalidName(_)));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let first = resolve(&root(), "x/y/z.bin.gz", Some(".gz")).unwrap();
        let second = resolve(&root(), "x/y/z.bin.gz", Some(".gz")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_relative_to_root() {
        let path = PathBuf::from("/upload/a/b/c.txt");
        assert_eq!(relative_to_root(&root(), &path), "a/b/c.txt");
    }

    #[tokio::test]
    async fn test_resolve_for_write_creates_parents() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();

        let path = resolve_for_write(&root, "a/b/report.txt", None)
            .await
            .unwrap();
        assert!(root.join("a/b").is_dir());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_for_write_rejects_symlink_escape() {
        let outside = tempfile::TempDir::new().unwrap();
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let err = resolve_for_write(&root, "link/evil.txt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PathError::OutsideRoot(_)));

        let err = resolve_for_write(&root, "link/new/deep/x.txt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PathError::OutsideRoot(_)));
        assert_eq!(std::fs::read_dir(outside.path()).unwrap().count(), 0);
    }
}
