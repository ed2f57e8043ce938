//! Storage backends
//!
//! A storage backend enumerates a tree of files and directories and yields
//! [`Entry`] metadata for each. The scan pipeline only ever talks to the
//! [`Storage`] trait; concrete backends are selected from the scan URI:
//!
//! - `s3://bucket/prefix` (case-insensitive prefix) - S3 object storage
//! - `server:/export` (host-colon-path) - NFS
//! - anything else - a local filesystem path, which must exist and be a
//!   directory
//!
//! The S3 and NFS backends are stubs today; every operation on them returns
//! [`StorageError::Unsupported`].

mod local;
mod nfs;
mod s3;

pub use local::LocalStorage;
pub use nfs::NfsStorage;
pub use s3::S3Storage;

use crate::error::{ConfigError, Result, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Host-colon-path URIs (e.g. `filer01:/vol/data`) dispatch to NFS
static NFS_URI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.-]+:\S+$").expect("Invalid NFS URI regex"));

/// One file or directory surfaced by a storage backend.
///
/// `key` is the path relative to the scan root, always non-empty and
/// separator-prefixed (`/a/f1`). Directories carry size 0. On platforms
/// that do not expose change or access times, `ctime` and `atime` fall
/// back to `mtime`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub size: i64,
    pub mtime: DateTime<Utc>,
    pub atime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    pub perm: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub is_regular: bool,
    pub is_sticky: bool,
}

impl Entry {
    /// Final path component of the key
    pub fn basename(&self) -> &str {
        self.key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.key)
    }

    /// Extension after the final `.` of the basename, without the dot.
    /// Empty for directories, extension-less files, and dotfiles.
    pub fn ext(&self) -> &str {
        if self.is_dir {
            return "";
        }
        Path::new(self.basename())
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// Capability interface for tree-structured storage.
///
/// `list` yields the direct children of a directory; the other operations
/// exist for the migration path and single-key inspection.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// List the direct children of `dir` (a key-style path, `/` for root)
    fn list(&self, dir: &str) -> StorageResult<Vec<Entry>>;

    /// Stat a single key
    fn head(&self, key: &str) -> StorageResult<Entry>;

    /// Write the contents of `reader` to `key`, creating parents as needed
    fn put(&self, key: &str, reader: &mut dyn Read) -> StorageResult<()>;

    /// Delete a key; deleting a missing key is not an error
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Release any resources held by the backend
    fn close(&self) -> StorageResult<()>;
}

/// Create a storage backend from a scan URI.
///
/// Local paths are validated (must exist, must be a directory) and
/// resolved to an absolute path so that keys stay stable no matter the
/// working directory.
pub fn create_storage(uri: &str) -> Result<Box<dyn Storage>> {
    if uri.len() >= 5 && uri[..5].eq_ignore_ascii_case("s3://") {
        return Ok(Box::new(S3Storage::new(uri)));
    }

    if NFS_URI_REGEX.is_match(uri) {
        return Ok(Box::new(NfsStorage::new(uri)));
    }

    let meta = std::fs::metadata(uri).map_err(|e| ConfigError::InvalidScanPath {
        path: uri.to_string(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(ConfigError::UnsupportedUri {
            uri: uri.to_string(),
        }
        .into());
    }

    let abs = std::fs::canonicalize(uri).map_err(|e| ConfigError::InvalidScanPath {
        path: uri.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Box::new(LocalStorage::new(abs)))
}

/// Join a key-style child name onto a key-style directory path
pub(crate) fn join_key(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

pub(crate) fn unsupported(backend: &'static str, op: &'static str) -> StorageError {
    StorageError::Unsupported { backend, op }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;

    fn entry(key: &str, is_dir: bool) -> Entry {
        let now = Utc::now();
        Entry {
            key: key.to_string(),
            size: 0,
            mtime: now,
            atime: now,
            ctime: now,
            perm: 0o644,
            is_dir,
            is_symlink: false,
            is_regular: !is_dir,
            is_sticky: false,
        }
    }

    #[test]
    fn test_basename() {
        assert_eq!(entry("/a/f1.txt", false).basename(), "f1.txt");
        assert_eq!(entry("/f1", false).basename(), "f1");
        assert_eq!(entry("/a/b", true).basename(), "b");
    }

    #[test]
    fn test_ext() {
        assert_eq!(entry("/a/f1.txt", false).ext(), "txt");
        assert_eq!(entry("/a/archive.tar.gz", false).ext(), "gz");
        assert_eq!(entry("/a/README", false).ext(), "");
        assert_eq!(entry("/a/.bashrc", false).ext(), "");
        // Directories never report an extension, even with a dot in the name
        assert_eq!(entry("/a/dir.d", true).ext(), "");
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("/", "a"), "/a");
        assert_eq!(join_key("/a", "f1"), "/a/f1");
    }

    #[test]
    fn test_uri_dispatch_s3() {
        let storage = create_storage("s3://bucket/prefix").unwrap();
        assert!(matches!(
            storage.list("/"),
            Err(StorageError::Unsupported { backend: "s3", .. })
        ));

        // Prefix match is case-insensitive
        let storage = create_storage("S3://bucket").unwrap();
        assert!(storage.list("/").is_err());
    }

    #[test]
    fn test_uri_dispatch_nfs() {
        let storage = create_storage("filer01:/vol/data").unwrap();
        assert!(matches!(
            storage.list("/"),
            Err(StorageError::Unsupported { backend: "nfs", .. })
        ));
    }

    #[test]
    fn test_uri_dispatch_local_missing() {
        let err = create_storage("/definitely/not/a/real/path").unwrap_err();
        assert!(matches!(
            err,
            ScanError::Config(ConfigError::InvalidScanPath { .. })
        ));
    }

    #[test]
    fn test_uri_dispatch_local_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        let err = create_storage(file.to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Config(ConfigError::UnsupportedUri { .. })
        ));
    }
}
