//! SQLite schema for the persisted catalog.

use crate::error::Result;

/// Initialize the `datasets` table if it does not already exist.
///
/// One row per `(name, version)` tuple. `definition` holds the serialized
/// Schema model (including physical table names) as a JSON document;
/// `ddf-catalog-storage` owns reading/writing that column's contents.
pub fn init_sqlite_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
          name         TEXT NOT NULL,
          version      TEXT(40) NOT NULL,
          is__default  BOOLEAN NOT NULL DEFAULT FALSE,
          definition   TEXT NOT NULL,
          imported     DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
          password     TEXT(80),
          PRIMARY KEY (name, version)
        );

        CREATE INDEX IF NOT EXISTS idx_datasets_name_imported
          ON datasets(name, imported DESC);

        -- At most one default row per name; enforced additionally in
        -- application code since SQLite partial-unique-index semantics
        -- on a boolean column require the WHERE clause below.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_datasets_one_default
          ON datasets(name) WHERE is__default = TRUE;
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_datasets_table() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_sqlite_schema(&conn).unwrap();

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
    fn only_one_default_per_name_enforced_by_index() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_sqlite_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO datasets (name, version, is__default, definition) VALUES ('pop', 'v1', TRUE, '{}')",
            [],
        )
        .unwrap();

        let err = conn.execute(
            "INSERT INTO datasets (name, version, is__default, definition) VALUES ('pop', 'v2', TRUE, '{}')",
            [],
        );
        assert!(err.is_err());
    }
}
