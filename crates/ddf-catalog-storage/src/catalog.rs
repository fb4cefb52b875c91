//! The Catalog component itself: the persistent list of
//! `(name, version)` tuples and the operations the rest of the service
//! builds on.

use crate::backend::CatalogBackend;
use chrono::{DateTime, Utc};
use ddf_catalog_core::{
    hash_password, validate_dataset_name, validate_stored_version, CatalogError, Result,
    RESERVED_ALL, RESERVED_LATEST,
};
use ddf_schema::SchemaModel;
use rusqlite::{params, Connection, OptionalExtension};

/// One `(name, version)` entry as returned by [`Catalog::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogListEntry {
    pub name: String,
    pub version: String,
    pub is_default: bool,
    pub imported: DateTime<Utc>,
}

/// A fully hydrated catalog row, including its deserialized schema.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub name: String,
    pub version: String,
    pub is_default: bool,
    pub imported: DateTime<Utc>,
    pub password_hash: Option<String>,
    pub schema: SchemaModel,
}

impl CatalogRecord {
    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// What to remove in a [`Catalog::remove`] call.
#[derive(Debug, Clone)]
pub enum RemoveTarget {
    Version(String),
    Versions(Vec<String>),
    /// The reserved `latest` token: resolves to the most recently
    /// imported version before removal.
    Latest,
    /// The reserved `_ALL_` token: removes every version, bypassing the
    /// "can't drop the default most-recent version" guard.
    All,
}

/// The Catalog: a thin, transactionally-consistent wrapper around a
/// [`CatalogBackend`].
pub struct Catalog<B: CatalogBackend> {
    backend: B,
}

struct Row {
    version: String,
    is_default: bool,
    imported: DateTime<Utc>,
    password_hash: Option<String>,
    definition: String,
}

fn row_from_sqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok(Row {
        version: row.get("version")?,
        is_default: row.get::<_, i64>("is__default")? != 0,
        imported: row.get("imported")?,
        password_hash: row.get("password")?,
        definition: row.get("definition")?,
    })
}

fn deserialize_schema(definition: &str) -> Result<SchemaModel> {
    serde_json::from_str(definition).map_err(|e| CatalogError::Serialization(e.to_string()))
}

impl<B: CatalogBackend> Catalog<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `list(name?) → [{name, version, default?, imported}]`, ordered by
    /// `imported` descending per name.
    pub fn list(&self, name: Option<&str>) -> Result<Vec<CatalogListEntry>> {
        let conn = self.backend.get_connection()?;
        let rows = match name {
            Some(name) => {
                let mut stmt = conn.prepare(
                    "SELECT name, version, is__default, imported FROM datasets WHERE name = ?1 ORDER BY imported DESC",
                )?;
                stmt.query_map(params![name], Self::list_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT name, version, is__default, imported FROM datasets ORDER BY name, imported DESC",
                )?;
                stmt.query_map([], Self::list_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    fn list_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogListEntry> {
        Ok(CatalogListEntry {
            name: row.get(0)?,
            version: row.get(1)?,
            is_default: row.get::<_, i64>(2)? != 0,
            imported: row.get(3)?,
        })
    }

    /// `lookup(name, version?) → record?`.
    pub fn lookup(&self, name: &str, version: Option<&str>) -> Result<Option<CatalogRecord>> {
        let conn = self.backend.get_connection()?;
        let row = match version {
            None => Self::lookup_default_or_latest(&conn, name)?,
            Some(v) if v == RESERVED_LATEST => Self::lookup_latest(&conn, name)?,
            Some(v) => Self::lookup_literal(&conn, name, v)?,
        };
        Ok(row.map(|r| CatalogRecord {
            name: name.to_string(),
            version: r.version,
            is_default: r.is_default,
            imported: r.imported,
            password_hash: r.password_hash,
            schema: deserialize_schema(&r.definition).unwrap_or_default(),
        }))
    }

    fn lookup_default_or_latest(conn: &Connection, name: &str) -> Result<Option<Row>> {
        if let Some(row) = conn
            .query_row(
                "SELECT name, version, is__default, imported, password, definition FROM datasets WHERE name = ?1 AND is__default = TRUE",
                params![name],
                row_from_sqlite,
            )
            .optional()?
        {
            return Ok(Some(row));
        }
        Self::lookup_latest(conn, name)
    }

    fn lookup_latest(conn: &Connection, name: &str) -> Result<Option<Row>> {
        Ok(conn
            .query_row(
                "SELECT name, version, is__default, imported, password, definition FROM datasets WHERE name = ?1 ORDER BY imported DESC LIMIT 1",
                params![name],
                row_from_sqlite,
            )
            .optional()?)
    }

    fn lookup_literal(conn: &Connection, name: &str, version: &str) -> Result<Option<Row>> {
        Ok(conn
            .query_row(
                "SELECT name, version, is__default, imported, password, definition FROM datasets WHERE name = ?1 AND version = ?2",
                params![name, version],
                row_from_sqlite,
            )
            .optional()?)
    }

    /// `insertNew(name, version, schema, passwordHash?)`.
    pub fn insert_new(
        &self,
        name: &str,
        version: &str,
        schema: &SchemaModel,
        password: Option<&str>,
    ) -> Result<()> {
        validate_dataset_name(name)?;
        validate_stored_version(version)?;

        let conn = self.backend.get_connection()?;
        let exists: i64 = conn.query_row(
            "SELECT count(*) FROM datasets WHERE name = ?1 AND version = ?2",
            params![name, version],
            |r| r.get(0),
        )?;
        if exists > 0 {
            return Err(CatalogError::AlreadyExists(format!("{name}/{version}")));
        }

        let definition = serde_json::to_string(schema)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let password_hash = password.map(hash_password);

        conn.execute(
            "INSERT INTO datasets (name, version, is__default, definition, imported, password) VALUES (?1, ?2, FALSE, ?3, ?4, ?5)",
            params![name, version, definition, Utc::now(), password_hash],
        )?;
        Ok(())
    }

    /// `markDefault(name, version|"latest")`.
    pub fn mark_default(&self, name: &str, version_or_latest: &str) -> Result<()> {
        let mut conn = self.backend.get_connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE datasets SET is__default = FALSE WHERE name = ?1",
            params![name],
        )?;

        if version_or_latest != RESERVED_LATEST {
            let updated = tx.execute(
                "UPDATE datasets SET is__default = TRUE WHERE name = ?1 AND version = ?2",
                params![name, version_or_latest],
            )?;
            if updated == 0 {
                return Err(CatalogError::NotFound(format!(
                    "{name}/{version_or_latest}"
                )));
            }
        }
        // version_or_latest == "latest": leave no explicit default; readers
        // fall back to "most recently imported".

        tx.commit()?;
        Ok(())
    }

    /// `ensureDefault(name)`.
    pub fn ensure_default(&self, name: &str) -> Result<()> {
        let mut conn = self.backend.get_connection()?;
        let tx = conn.transaction()?;

        let has_default: i64 = tx.query_row(
            "SELECT count(*) FROM datasets WHERE name = ?1 AND is__default = TRUE",
            params![name],
            |r| r.get(0),
        )?;
        if has_default > 0 {
            return Ok(());
        }

        let most_recent: Option<String> = tx
            .query_row(
                "SELECT version FROM datasets WHERE name = ?1 ORDER BY imported DESC LIMIT 1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(version) = most_recent {
            tx.execute(
                "UPDATE datasets SET is__default = TRUE WHERE name = ?1 AND version = ?2",
                params![name, version],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// `remove(name, version|list|"_ALL_"|"latest")`.
    ///
    /// Returns the backing physical table names and the version strings
    /// of every removed version, so the caller can drop both the
    /// relational-engine tables and the on-disk version directories.
    pub fn remove(&self, name: &str, target: RemoveTarget) -> Result<RemovalOutcome> {
        let mut conn = self.backend.get_connection()?;
        let tx = conn.transaction()?;

        let mut rows: Vec<Row> = {
            let mut stmt = tx.prepare(
                "SELECT name, version, is__default, imported, password, definition FROM datasets WHERE name = ?1 ORDER BY imported DESC",
            )?;
            stmt.query_map(params![name], row_from_sqlite)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        if rows.is_empty() {
            return Err(CatalogError::NotFound(name.to_string()));
        }

        let most_recent_version = rows[0].version.clone();
        let most_recent_is_default = rows[0].is_default;

        let target_versions: Vec<String> = match &target {
            RemoveTarget::Version(v) => vec![v.clone()],
            RemoveTarget::Versions(vs) => vs.clone(),
            RemoveTarget::Latest => vec![most_recent_version.clone()],
            RemoveTarget::All => rows.iter().map(|r| r.version.clone()).collect(),
        };

        if !matches!(target, RemoveTarget::All)
            && most_recent_is_default
            && target_versions.iter().any(|v| v == &most_recent_version)
        {
            return Err(CatalogError::Other(format!(
                "refusing to remove '{most_recent_version}': it is the default and most recent version of '{name}'; use {RESERVED_ALL} to remove it explicitly"
            )));
        }

        rows.retain(|r| target_versions.contains(&r.version));
        if rows.is_empty() {
            return Err(CatalogError::NotFound(format!(
                "{name}/{}",
                target_versions.join(",")
            )));
        }

        let mut dropped_tables = Vec::new();
        let mut removed_versions = Vec::new();
        for row in &rows {
            if let Ok(schema) = deserialize_schema(&row.definition) {
                dropped_tables.extend(schema.all_physical_table_names());
            }
            tx.execute(
                "DELETE FROM datasets WHERE name = ?1 AND version = ?2",
                params![name, row.version],
            )?;
            removed_versions.push(row.version.clone());
        }

        tx.commit()?;
        Ok(RemovalOutcome { dropped_tables, removed_versions })
    }

    /// `purge(name)`: keep the default (or, if none, the two most recent)
    /// and the version preceding it; delete all older.
    pub fn purge(&self, name: &str) -> Result<RemovalOutcome> {
        let mut conn = self.backend.get_connection()?;
        let tx = conn.transaction()?;

        let rows: Vec<Row> = {
            let mut stmt = tx.prepare(
                "SELECT name, version, is__default, imported, password, definition FROM datasets WHERE name = ?1 ORDER BY imported DESC",
            )?;
            stmt.query_map(params![name], row_from_sqlite)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        if rows.is_empty() {
            return Ok(RemovalOutcome::default());
        }

        let mut keep_indices: Vec<usize> = Vec::new();
        if let Some(default_idx) = rows.iter().position(|r| r.is_default) {
            keep_indices.push(default_idx);
            if default_idx + 1 < rows.len() {
                keep_indices.push(default_idx + 1);
            }
        } else {
            keep_indices.push(0);
            if rows.len() > 1 {
                keep_indices.push(1);
            }
            if rows.len() > 2 {
                keep_indices.push(2);
            }
        }

        let mut dropped_tables = Vec::new();
        let mut removed_versions = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if keep_indices.contains(&idx) {
                continue;
            }
            if let Ok(schema) = deserialize_schema(&row.definition) {
                dropped_tables.extend(schema.all_physical_table_names());
            }
            tx.execute(
                "DELETE FROM datasets WHERE name = ?1 AND version = ?2",
                params![name, row.version],
            )?;
            removed_versions.push(row.version.clone());
        }

        tx.commit()?;
        Ok(RemovalOutcome { dropped_tables, removed_versions })
    }
}

/// Result of a `remove`/`purge` call: the physical table names to drop
/// from the relational engine, and the version strings whose on-disk
/// data directories the caller should delete.
#[derive(Debug, Clone, Default)]
pub struct RemovalOutcome {
    pub dropped_tables: Vec<String>,
    pub removed_versions: Vec<String>,
}
