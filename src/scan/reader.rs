//! Bounded directory listing
//!
//! Every directory enumeration in the process funnels through one counting
//! semaphore, so fan-out never holds more than [`MAX_CONCURRENT_LISTINGS`]
//! open directory handles regardless of how wide the tree is. The blocking
//! `read_dir` call runs on the tokio blocking pool; the permit is released
//! as soon as it returns.

use crate::error::{ScanError, ScanResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task;

/// Upper bound on concurrently open directory handles
pub const MAX_CONCURRENT_LISTINGS: usize = 20;

/// One immediate child of a listed directory
#[derive(Debug, Clone)]
pub struct ChildEntry {
    /// Basename only
    pub name: String,

    /// Directory flag. Symlinks are classified by their own metadata and
    /// are never directories here.
    pub is_dir: bool,

    /// Exact byte length for non-directories, 0 for directories
    pub size: u64,
}

/// Semaphore-gated directory reader
pub struct DirReader {
    permits: Arc<Semaphore>,
}

impl DirReader {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CONCURRENT_LISTINGS)
    }

    pub fn with_capacity(max_listings: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_listings)),
        }
    }

    /// List the immediate entries of `path` in unspecified order.
    ///
    /// Entries whose metadata cannot be read are skipped; only a failure of
    /// the listing itself is an error.
    pub async fn list(&self, path: &Path) -> ScanResult<Vec<ChildEntry>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("listing semaphore closed unexpectedly");

        let path = path.to_path_buf();
        task::spawn_blocking(move || list_blocking(&path))
            .await
            .map_err(|e| ScanError::Join(e.to_string()))?
    }
}

impl Default for DirReader {
    fn default() -> Self {
        Self::new()
    }
}

fn list_blocking(path: &Path) -> ScanResult<Vec<ChildEntry>> {
    let read_dir = std::fs::read_dir(path).map_err(|e| ScanError::from_io(path, e))?;

    let mut children = Vec::new();
    for entry in read_dir {
        let Ok(entry) = entry else { continue };
        // symlink_metadata: a symlink counts as a plain entry sized at the
        // link's own length and is never recursed into
        let Ok(meta) = std::fs::symlink_metadata(entry.path()) else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if meta.is_dir() {
            children.push(ChildEntry {
                name,
                is_dir: true,
                size: 0,
            });
        } else {
            children.push(ChildEntry {
                name,
                is_dir: false,
                size: meta.len(),
            });
        }
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_list_mixed_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), vec![0u8; 100]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let reader = DirReader::new();
        let mut children = reader.list(dir.path()).await.unwrap();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "a.txt");
        assert!(!children[0].is_dir);
        assert_eq!(children[0].size, 100);
        assert_eq!(children[1].name, "sub");
        assert!(children[1].is_dir);
        assert_eq!(children[1].size, 0);
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let reader = DirReader::new();
        assert!(reader.list(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let reader = DirReader::new();
        let err = reader.list(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let reader = DirReader::new();
        let err = reader.list(&file).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::NotADirectory { .. } | ScanError::ReadDir { .. }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directory_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target/big"), vec![0u8; 4096]).unwrap();
        std::os::unix::fs::symlink(dir.path().join("target"), dir.path().join("link")).unwrap();

        let reader = DirReader::new();
        let children = reader.list(dir.path()).await.unwrap();
        let link = children.iter().find(|c| c.name == "link").unwrap();
        assert!(!link.is_dir);
    }
}
