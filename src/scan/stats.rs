//! Live scan statistics
//!
//! One update per entry on the single consumer thread today, but every
//! accumulator is atomic (maxima via `fetch_max`) so additional taps can
//! be added without a rewrite.

use crate::storage::Entry;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    file_count: AtomicI64,
    dir_count: AtomicI64,
    total_size: AtomicI64,
    symlink_count: AtomicI64,
    regular_count: AtomicI64,
    total_name_len: AtomicI64,
    max_name_len: AtomicI64,
    total_dir_depth: AtomicI64,
    max_dir_depth: AtomicI64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, entry: &Entry) {
        let name_len = entry.basename().len() as i64;
        let depth = dir_depth(&entry.key) as i64;

        if entry.is_dir {
            self.dir_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.file_count.fetch_add(1, Ordering::Relaxed);
            if entry.is_regular {
                self.regular_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        // The symlink flag is orthogonal to the file/dir split
        if entry.is_symlink {
            self.symlink_count.fetch_add(1, Ordering::Relaxed);
        }

        self.total_size.fetch_add(entry.size, Ordering::Relaxed);
        self.total_name_len.fetch_add(name_len, Ordering::Relaxed);
        self.max_name_len.fetch_max(name_len, Ordering::Relaxed);
        self.total_dir_depth.fetch_add(depth, Ordering::Relaxed);
        self.max_dir_depth.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn file_count(&self) -> i64 {
        self.file_count.load(Ordering::Relaxed)
    }

    pub fn dir_count(&self) -> i64 {
        self.dir_count.load(Ordering::Relaxed)
    }

    pub fn total_size(&self) -> i64 {
        self.total_size.load(Ordering::Relaxed)
    }

    pub fn symlink_count(&self) -> i64 {
        self.symlink_count.load(Ordering::Relaxed)
    }

    pub fn regular_count(&self) -> i64 {
        self.regular_count.load(Ordering::Relaxed)
    }

    pub fn max_name_len(&self) -> i64 {
        self.max_name_len.load(Ordering::Relaxed)
    }

    pub fn max_dir_depth(&self) -> i64 {
        self.max_dir_depth.load(Ordering::Relaxed)
    }

    pub fn avg_name_len(&self) -> i64 {
        let files = self.file_count();
        if files == 0 {
            0
        } else {
            self.total_name_len.load(Ordering::Relaxed) / files
        }
    }

    pub fn avg_dir_depth(&self) -> i64 {
        let files = self.file_count();
        if files == 0 {
            0
        } else {
            self.total_dir_depth.load(Ordering::Relaxed) / files
        }
    }
}

/// Depth of an entry: the number of path separators in its parent
/// directory, where a root-equivalent parent (`/` or `.`) counts as zero.
pub fn dir_depth(key: &str) -> usize {
    let parent = match key.trim_end_matches('/').rfind('/') {
        Some(0) => "/",
        Some(idx) => &key[..idx],
        None => ".",
    };
    if parent == "/" || parent == "." {
        0
    } else {
        parent.matches('/').count()
    }
}
