//! Local POSIX filesystem backend
//!
//! Listing uses lstat semantics: symlinks are reported as symlinks and
//! never followed, so a symlink cycle cannot trap the walker.

use super::{join_key, Entry, Storage};
use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::warn;

/// Sticky bit in the POSIX mode word
#[cfg(unix)]
const STICKY_BIT: u32 = 0o1000;

/// Storage backend rooted at an absolute local directory
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }

    fn entry_from_metadata(&self, key: String, meta: &fs::Metadata) -> Entry {
        let is_dir = meta.is_dir();
        let file_type = meta.file_type();

        // ctime and atime fall back to mtime; the platforms we scan do not
        // expose creation time uniformly and the incremental join only
        // needs a value that is stable between unchanged scans.
        let mtime = meta
            .modified()
            .map(system_time_to_utc)
            .unwrap_or_else(|_| Utc::now());

        Entry {
            key,
            size: if is_dir { 0 } else { meta.len() as i64 },
            mtime,
            atime: mtime,
            ctime: mtime,
            perm: permission_bits(meta),
            is_dir,
            is_symlink: file_type.is_symlink(),
            is_regular: file_type.is_file(),
            is_sticky: sticky_bit(meta),
        }
    }
}

impl Storage for LocalStorage {
    fn list(&self, dir: &str) -> StorageResult<Vec<Entry>> {
        let full = self.full_path(dir);
        let read_dir = fs::read_dir(&full).map_err(|e| StorageError::ListFailed {
            path: full.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => {
                    warn!(path = %full.display(), error = %e, "failed to read directory entry");
                    continue;
                }
            };
            let name = dirent.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %full.display(), "skipping entry with non-UTF-8 name");
                continue;
            };
            // DirEntry::metadata does not traverse symlinks
            let meta = match dirent.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %full.display(), name = %name, error = %e, "failed to stat entry");
                    continue;
                }
            };
            entries.push(self.entry_from_metadata(join_key(dir, name), &meta));
        }
        Ok(entries)
    }

    fn head(&self, key: &str) -> StorageResult<Entry> {
        let full = self.full_path(key);
        let meta = fs::symlink_metadata(&full).map_err(|e| StorageError::StatFailed {
            path: full.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.entry_from_metadata(key.to_string(), &meta))
    }

    fn put(&self, key: &str, reader: &mut dyn Read) -> StorageResult<()> {
        let full = self.full_path(key);
        if key.ends_with('/') {
            return fs::create_dir_all(&full).map_err(|e| StorageError::WriteFailed {
                path: full.display().to_string(),
                reason: e.to_string(),
            });
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed {
                path: full.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let mut file = fs::File::create(&full).map_err(|e| StorageError::WriteFailed {
            path: full.display().to_string(),
            reason: e.to_string(),
        })?;
        std::io::copy(reader, &mut file).map_err(|e| StorageError::WriteFailed {
            path: full.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let full = self.full_path(key);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                path: full.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn system_time_to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(_meta: &fs::Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn sticky_bit(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & STICKY_BIT != 0
}

#[cfg(not(unix))]
fn sticky_bit(_meta: &fs::Metadata) -> bool {
    false
}
