//! SQLite schema for the dataset store
//!
//! The fixed tables hold metadata, features and subspaces. The `objects`
//! table starts with only its id column; one REAL column per feature is
//! added at import time, named by the feature id.

use rusqlite::{Connection, Result};

/// Current schema version, stamped into `metadata` on creation
pub const SCHEMA_VERSION: i32 = 2;

/// Name of the row-oriented object table
pub const OBJECT_TABLE: &str = "objects";

/// Initialize the fixed part of the schema and stamp the version
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per feature, natural and synthetic
        CREATE TABLE IF NOT EXISTS features (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            is_outlier INTEGER NOT NULL DEFAULT 0,
            is_virtual INTEGER NOT NULL DEFAULT 0,
            min_value REAL,
            max_value REAL
        );

        -- Denormalized: one row per (subspace, feature reference)
        CREATE TABLE IF NOT EXISTS subspaces (
            id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            feature_ref INTEGER NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (id, position)
        );

        -- Feature columns are added dynamically
        CREATE TABLE IF NOT EXISTS objects (
            id INTEGER PRIMARY KEY AUTOINCREMENT
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Check whether the metadata table exists at all
pub fn metadata_table_exists(conn: &Connection) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='metadata'")?
        .exists([])
}

/// Read the stamped schema version
///
/// Returns `None` when the metadata table or its version row is absent.
/// Any other failure is returned as-is.
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    if !metadata_table_exists(conn)? {
        return Ok(None);
    }

    let result: Result<String> = conn.query_row(
        "SELECT value FROM metadata WHERE key = 'version'",
        [],
        |row| row.get(0),
    );

    match result {
        // An unparsable stamp is treated as version 0 so it never matches
        Ok(version_str) => Ok(Some(version_str.trim().parse().unwrap_or(0))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Quote a dynamic column identifier
///
/// Feature columns are named by their integer id, which SQLite would
/// otherwise parse as a literal.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column identifier for the feature with the given id
pub fn feature_column(feature_id: i64) -> String {
    quote_ident(&feature_id.to_string())
}

/// List the feature columns currently present on the object table
pub fn object_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", OBJECT_TABLE))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<String>>>()?;
    Ok(columns.into_iter().filter(|c| c != "id").collect())
}

/// Drop all data tables, including every dynamic object column
pub fn drop_data_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS objects;
        DROP TABLE IF EXISTS subspaces;
        DROP TABLE IF EXISTS features;
        "#,
    )
}
