//! Storage backend abstraction for the catalog.
//!
//! Local SQLite is the only implementation wired up today, with cloud
//! variants left as placeholders for a future object-storage-backed
//! catalog. `ASSET_STORE`/`ASSET_STORE_BUCKET` configure where data
//! assets live, not the catalog itself — the catalog always stays in a
//! single local `datasets` table.

use ddf_catalog_core::{init_sqlite_schema, CatalogError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Backend abstraction for catalog storage.
pub trait CatalogBackend: Send + Sync {
    /// Open a connection to the catalog database, ensuring the schema
    /// exists. Table creation is idempotent so it can run on every
    /// process start rather than as a separate migration step.
    fn get_connection(&self) -> Result<Connection>;

    fn exists(&self) -> Result<bool>;

    fn initialize(&self) -> Result<()>;
}

/// Local filesystem SQLite backend: the primary (and currently only)
/// backend for the catalog.
#[derive(Clone, Debug)]
pub struct LocalSqliteBackend {
    path: PathBuf,
}

impl LocalSqliteBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogBackend for LocalSqliteBackend {
    fn get_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        // Idempotent: ignore "already exists" implicitly via IF NOT EXISTS DDL.
        init_sqlite_schema(&conn)?;
        Ok(conn)
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.path.exists())
    }

    fn initialize(&self) -> Result<()> {
        if self.exists()? {
            return Err(CatalogError::Other(format!(
                "catalog already exists at {:?}",
                self.path
            )));
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_sqlite_schema(&conn)?;
        Ok(())
    }
}

/// GCS-backed catalog (future work): download, operate locally, upload
/// back with a generation-number check for optimistic concurrency.
#[allow(dead_code)]
pub struct GcsBackend {
    bucket: String,
    path: String,
}

/// S3-backed catalog (future work): same pattern as [`GcsBackend`].
#[allow(dead_code)]
pub struct S3Backend {
    bucket: String,
    path: String,
    region: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn initialize_then_connect() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::remove_file(temp.path()).unwrap();

        let backend = LocalSqliteBackend::new(temp.path());
        assert!(!backend.exists().unwrap());
        backend.initialize().unwrap();
        assert!(backend.exists().unwrap());

        let conn = backend.get_connection().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='datasets'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn double_initialize_fails() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::remove_file(temp.path()).unwrap();
        let backend = LocalSqliteBackend::new(temp.path());
        backend.initialize().unwrap();
        assert!(backend.initialize().is_err());
    }
}
