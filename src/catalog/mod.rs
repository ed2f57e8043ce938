//! Catalog - the durable relational index of scanned entries
//!
//! A full scan persists every entry into the canonical `file_entries`
//! table. An incremental scan writes candidates into a uniquely named
//! temporary table and classifies them against `file_entries` with
//! anti/semi-joins.
//!
//! Backends implement the object-safe [`Catalog`] trait and register a
//! constructor in the process-wide factory, keyed by database type string.
//! SQLite is registered out of the box.

mod sqlite;

pub use sqlite::SqliteCatalog;

use crate::error::{CatalogResult, ConfigError, Result};
use crate::storage::Entry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{LazyLock, RwLock};

/// Name of the canonical table written by full scans
pub const CANONICAL_TABLE: &str = "file_entries";

/// The persisted projection of an [`Entry`], also the row type returned
/// by the incremental diff queries.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub path: String,
    pub size: i64,
    pub ext: String,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub atime: DateTime<Utc>,
    pub perm: u32,
    pub is_symlink: bool,
    pub is_dir: bool,
    pub is_regular: bool,
}

impl From<&Entry> for CatalogRow {
    fn from(entry: &Entry) -> Self {
        Self {
            path: entry.key.clone(),
            size: entry.size,
            ext: entry.ext().to_string(),
            ctime: entry.ctime,
            mtime: entry.mtime,
            atime: entry.atime,
            perm: entry.perm,
            is_symlink: entry.is_symlink,
            is_dir: entry.is_dir,
            is_regular: entry.is_regular,
        }
    }
}

/// Capability interface for the relational index.
///
/// All writes go through one owner (the catalog writer thread or the diff
/// engine); reads during the diff reuse the same handle and rely on the
/// database's own concurrency.
pub trait Catalog: Send + std::fmt::Debug {
    /// Create a table with the canonical schema if it does not exist
    fn create_table(&self, name: &str) -> CatalogResult<()>;

    /// Bulk-insert rows; an empty table name targets `file_entries`
    fn save_entries(&self, rows: &[CatalogRow], table: &str) -> CatalogResult<()>;

    /// Rows present in the temp table but absent from `file_entries`
    /// (recovers bloom false positives)
    fn query_exact_new_files(&self, temp_table: &str) -> CatalogResult<Vec<CatalogRow>>;

    /// Rows present in both tables whose ctime or mtime differ
    fn query_changed_files(&self, temp_table: &str) -> CatalogResult<Vec<CatalogRow>>;

    /// Count of distinct extensions in `file_entries`
    fn unique_ext_count(&self) -> CatalogResult<i64>;

    /// Stream every `path` value of `file_entries` through the callback
    fn for_each_path(&self, f: &mut dyn FnMut(&str)) -> CatalogResult<()>;

    /// Drop a table if it exists
    fn drop_table(&self, name: &str) -> CatalogResult<()>;

    /// Flush and release the underlying handle
    fn close(&self) -> CatalogResult<()>;
}

/// Constructor signature held in the factory registry
pub type CatalogFactory = fn(&Path) -> CatalogResult<Box<dyn Catalog>>;

static REGISTRY: LazyLock<RwLock<HashMap<String, CatalogFactory>>> = LazyLock::new(|| {
    let mut factories: HashMap<String, CatalogFactory> = HashMap::new();
    factories.insert("sqlite".to_string(), |path| {
        Ok(Box::new(SqliteCatalog::open(path)?))
    });
    RwLock::new(factories)
});

/// Register a catalog backend under a database type name
pub fn register_catalog(db_type: &str, factory: CatalogFactory) {
    REGISTRY
        .write()
        .expect("catalog registry poisoned")
        .insert(db_type.to_string(), factory);
}

/// Open a catalog through the registry
pub fn open_catalog(db_type: &str, path: &Path) -> Result<Box<dyn Catalog>> {
    let factory = {
        let registry = REGISTRY.read().expect("catalog registry poisoned");
        registry.get(db_type).copied()
    };
    match factory {
        Some(factory) => Ok(factory(path)?),
        None => Err(ConfigError::UnsupportedDbType {
            db_type: db_type.to_string(),
        }
        .into()),
    }
}
