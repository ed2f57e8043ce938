//! SQLite catalog backend
//!
//! A single connection in WAL mode. Inserts are wrapped in a transaction
//! with a cached prepared statement; one batch is one transaction.
//! Temp-table names arrive from the diff engine as UUIDs with hyphens
//! replaced by underscores, but every name is still validated before
//! being spliced into SQL.

use super::{CatalogRow, Catalog, CANONICAL_TABLE};
use crate::error::{CatalogError, CatalogResult};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

/// Pragmas applied once at open; WAL lets the diff queries read while the
/// writer holds the connection.
const OPEN_PRAGMAS: &str = "PRAGMA journal_mode = WAL;\nPRAGMA synchronous = NORMAL;";

#[derive(Debug)]
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database and ensure the canonical
    /// table exists.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let conn = Connection::open(path).map_err(|e| CatalogError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        conn.execute_batch(OPEN_PRAGMAS)?;

        let catalog = Self { conn };
        catalog.create_table(CANONICAL_TABLE)?;
        Ok(catalog)
    }

    /// In-memory catalog for tests
    #[cfg(test)]
    pub fn open_in_memory() -> CatalogResult<Self> {
        let catalog = Self {
            conn: Connection::open_in_memory()?,
        };
        catalog.create_table(CANONICAL_TABLE)?;
        Ok(catalog)
    }

    fn query_rows(&self, sql: &str) -> CatalogResult<Vec<CatalogRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(CatalogRow {
                path: row.get(0)?,
                size: row.get(1)?,
                ext: row.get(2)?,
                ctime: row.get(3)?,
                mtime: row.get(4)?,
                atime: row.get(5)?,
                perm: row.get(6)?,
                is_symlink: row.get(7)?,
                is_dir: row.get(8)?,
                is_regular: row.get(9)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

/// Table names are spliced into SQL, so only identifier characters pass
fn validate_table_name(name: &str) -> CatalogResult<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CatalogError::InvalidTableName {
            name: name.to_string(),
        })
    }
}

fn effective_table(table: &str) -> &str {
    if table.is_empty() {
        CANONICAL_TABLE
    } else {
        table
    }
}

impl Catalog for SqliteCatalog {
    fn create_table(&self, name: &str) -> CatalogResult<()> {
        validate_table_name(name)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                size INTEGER,
                ext TEXT,
                ctime DATETIME,
                mtime DATETIME,
                atime DATETIME,
                perm INTEGER,
                is_symlink INTEGER,
                is_dir INTEGER,
                is_regular_file INTEGER
            )",
            name
        );
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn save_entries(&self, rows: &[CatalogRow], table: &str) -> CatalogResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let table = effective_table(table);
        validate_table_name(table)?;

        let tx = self.conn.unchecked_transaction()?;
        {
            let sql = format!(
                "INSERT INTO {} (
                    path, size, ext, ctime, mtime, atime, perm,
                    is_symlink, is_dir, is_regular_file
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                table
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                stmt.execute(params![
                    row.path,
                    row.size,
                    row.ext,
                    row.ctime,
                    row.mtime,
                    row.atime,
                    row.perm,
                    row.is_symlink,
                    row.is_dir,
                    row.is_regular,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = rows.len(), table = %table, "batch committed");
        Ok(())
    }

    fn query_exact_new_files(&self, temp_table: &str) -> CatalogResult<Vec<CatalogRow>> {
        validate_table_name(temp_table)?;
        let sql = format!(
            "SELECT t.path, t.size, t.ext, t.ctime, t.mtime, t.atime, t.perm,
                    t.is_symlink, t.is_dir, t.is_regular_file
             FROM {} t
             LEFT JOIN {} f ON t.path = f.path
             WHERE f.path IS NULL",
            temp_table, CANONICAL_TABLE
        );
        self.query_rows(&sql)
    }

    fn query_changed_files(&self, temp_table: &str) -> CatalogResult<Vec<CatalogRow>> {
        validate_table_name(temp_table)?;
        let sql = format!(
            "SELECT t.path, t.size, t.ext, t.ctime, t.mtime, t.atime, t.perm,
                    t.is_symlink, t.is_dir, t.is_regular_file
             FROM {} t
             JOIN {} f ON t.path = f.path
             WHERE t.ctime != f.ctime
                OR t.mtime != f.mtime",
            temp_table, CANONICAL_TABLE
        );
        self.query_rows(&sql)
    }

    fn unique_ext_count(&self) -> CatalogResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(DISTINCT ext) FROM {}", CANONICAL_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn for_each_path(&self, f: &mut dyn FnMut(&str)) -> CatalogResult<()> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT path FROM {}", CANONICAL_TABLE))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            f(&path);
        }
        Ok(())
    }

    fn drop_table(&self, name: &str) -> CatalogResult<()> {
        validate_table_name(name)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", name), [])?;
        Ok(())
    }

    fn close(&self) -> CatalogResult<()> {
        // The connection is released on drop; WAL content is durable by then
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn row(path: &str, mtime_offset_hours: i64) -> CatalogRow {
        let t = Utc::now() - Duration::hours(mtime_offset_hours);
        CatalogRow {
            path: path.to_string(),
            size: 100,
            ext: "txt".into(),
            ctime: t,
            mtime: t,
            atime: t,
            perm: 0o644,
            is_symlink: false,
            is_dir: false,
            is_regular: true,
        }
    }

    #[test]
    fn test_save_and_count() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .save_entries(&[row("/a", 0), row("/b", 0)], "")
            .unwrap();

        let count: i64 = catalog
            .conn
            .query_row("SELECT COUNT(*) FROM file_entries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_save_empty_batch_is_noop() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.save_entries(&[], "").unwrap();
    }

    #[test]
    fn test_unique_ext_count() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let mut rows = vec![row("/a.txt", 0), row("/b.txt", 0)];
        rows[1].ext = "txt".into();
        let mut csv = row("/c.csv", 0);
        csv.ext = "csv".into();
        rows.push(csv);
        let mut none = row("/d", 0);
        none.ext = "".into();
        rows.push(none);

        catalog.save_entries(&rows, "").unwrap();
        assert_eq!(catalog.unique_ext_count().unwrap(), 3);
    }

    #[test]
    fn test_exact_new_files_join() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.save_entries(&[row("/known", 5)], "").unwrap();

        catalog.create_table("temp_files_t1").unwrap();
        catalog
            .save_entries(&[row("/known", 5), row("/fresh", 0)], "temp_files_t1")
            .unwrap();

        let new_files = catalog.query_exact_new_files("temp_files_t1").unwrap();
        assert_eq!(new_files.len(), 1);
        assert_eq!(new_files[0].path, "/fresh");
    }

    #[test]
    fn test_changed_files_join() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let original = row("/doc", 10);
        catalog.save_entries(&[original.clone()], "").unwrap();

        catalog.create_table("temp_files_t2").unwrap();
        let mut touched = original.clone();
        touched.mtime = Utc::now();
        catalog
            .save_entries(&[touched, row("/same", 3)], "temp_files_t2")
            .unwrap();
        // /same is absent from file_entries, so it cannot appear as changed
        let changed = catalog.query_changed_files("temp_files_t2").unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].path, "/doc");
    }

    #[test]
    fn test_unchanged_file_not_reported() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let original = row("/stable", 10);
        catalog.save_entries(&[original.clone()], "").unwrap();

        catalog.create_table("temp_files_t3").unwrap();
        catalog.save_entries(&[original], "temp_files_t3").unwrap();

        assert!(catalog.query_changed_files("temp_files_t3").unwrap().is_empty());
        assert!(catalog
            .query_exact_new_files("temp_files_t3")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_for_each_path() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .save_entries(&[row("/x", 0), row("/y", 0)], "")
            .unwrap();

        let mut seen = Vec::new();
        catalog.for_each_path(&mut |p| seen.push(p.to_string())).unwrap();
        seen.sort();
        assert_eq!(seen, vec!["/x", "/y"]);
    }

    #[test]
    fn test_drop_table() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.create_table("temp_files_gone").unwrap();
        catalog.drop_table("temp_files_gone").unwrap();
        // Dropping an absent table is fine
        catalog.drop_table("temp_files_gone").unwrap();
    }

    #[test]
    fn test_table_name_validation() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        assert!(matches!(
            catalog.create_table("bad; DROP TABLE file_entries"),
            Err(CatalogError::InvalidTableName { .. })
        ));
        assert!(catalog.create_table("temp_files_ab_12").is_ok());
    }

    #[test]
    fn test_roundtrip_row_fields() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let mut dir = row("/adir", 2);
        dir.is_dir = true;
        dir.is_regular = false;
        dir.ext = "".into();
        dir.size = 0;
        catalog.save_entries(&[dir.clone()], "").unwrap();

        catalog.create_table("temp_files_rt").unwrap();
        let mut moved = dir.clone();
        moved.mtime = Utc::now();
        catalog.save_entries(&[moved.clone()], "temp_files_rt").unwrap();

        let changed = catalog.query_changed_files("temp_files_rt").unwrap();
        assert_eq!(changed.len(), 1);
        let got = &changed[0];
        assert_eq!(got.path, dir.path);
        assert!(got.is_dir);
        assert!(!got.is_regular);
        assert_eq!(got.size, 0);
        assert_eq!(got.perm, 0o644);
    }
}
